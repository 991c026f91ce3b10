//! Per-run resource injection.
//!
//! A resource is produced by a factory keyed by its type. Factories run at
//! most once per run; the product is cached for the run's lifetime. A
//! factory receives a [`Resources`] handle and may fetch other resources
//! (the dependency graph must be acyclic — a cycle deadlocks by
//! construction, which is a programmer error, not a runtime condition).

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use delver_core::error::WorkflowError;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, OnceCell};

type Product = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(Resources) -> BoxFuture<'static, Result<Product, WorkflowError>> + Send + Sync>;

/// Registered factories, shared by every run of a workflow.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    factories: HashMap<TypeId, (&'static str, Factory)>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `T`. Replaces any previous factory for `T`.
    pub fn provide<T, F, Fut>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(Resources) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static,
    {
        let factory = Arc::new(factory);
        let erased: Factory = Arc::new(move |resources| {
            let factory = Arc::clone(&factory);
            Box::pin(async move {
                let value = factory(resources).await?;
                Ok(Arc::new(value) as Product)
            })
        });
        self.factories.insert(TypeId::of::<T>(), (type_name::<T>(), erased));
    }

    /// Register an already-built value for `T`.
    pub fn provide_value<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.provide::<T, _, _>(move |_| {
            let value = value.clone();
            async move { Ok(value) }
        });
    }

    pub(crate) fn into_resources(self) -> Resources {
        Resources {
            factories: Arc::new(self.factories),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Per-run resource access with once-per-run factory caching.
#[derive(Clone)]
pub struct Resources {
    factories: Arc<HashMap<TypeId, (&'static str, Factory)>>,
    cache: Arc<Mutex<HashMap<TypeId, Arc<OnceCell<Product>>>>>,
}

impl Resources {
    /// Fetch the resource of type `T`, running its factory on first use.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, WorkflowError> {
        let key = TypeId::of::<T>();
        let (name, factory) = self
            .factories
            .get(&key)
            .cloned()
            .ok_or_else(|| WorkflowError::ResourceMissing(type_name::<T>().to_string()))?;

        // The cache lock is held only to obtain the slot, never across the
        // factory call, so factories may fetch their own dependencies.
        let slot = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(key).or_default())
        };

        let resources = self.clone();
        let product = slot
            .get_or_try_init(|| factory(resources))
            .await?
            .clone();

        product.downcast::<T>().map_err(|_| {
            WorkflowError::Invariant(format!("resource factory for {name} produced a foreign type"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, Clone)]
    struct Endpoint(String);

    #[derive(Debug)]
    struct Client {
        endpoint: String,
    }

    #[tokio::test]
    async fn missing_resource_is_an_error() {
        let resources = ResourceRegistry::new().into_resources();
        let result = resources.get::<Endpoint>().await;
        assert!(matches!(result, Err(WorkflowError::ResourceMissing(_))));
    }

    #[tokio::test]
    async fn factory_runs_once_per_run() {
        static RUNS: AtomicU32 = AtomicU32::new(0);
        let mut registry = ResourceRegistry::new();
        registry.provide::<Endpoint, _, _>(|_| async {
            RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Endpoint("https://api".into()))
        });
        let resources = registry.into_resources();

        let a = resources.get::<Endpoint>().await.unwrap();
        let b = resources.get::<Endpoint>().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn factories_may_depend_on_other_resources() {
        let mut registry = ResourceRegistry::new();
        registry.provide_value(Endpoint("https://api".into()));
        registry.provide::<Client, _, _>(|resources| async move {
            let endpoint = resources.get::<Endpoint>().await?;
            Ok(Client {
                endpoint: endpoint.0.clone(),
            })
        });
        let resources = registry.into_resources();

        let client = resources.get::<Client>().await.unwrap();
        assert_eq!(client.endpoint, "https://api");
    }

    #[tokio::test]
    async fn separate_runs_get_separate_caches() {
        static RUNS: AtomicU32 = AtomicU32::new(0);
        let mut registry = ResourceRegistry::new();
        registry.provide::<Endpoint, _, _>(|_| async {
            RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(Endpoint("e".into()))
        });

        let run1 = registry.clone().into_resources();
        let run2 = registry.into_resources();
        run1.get::<Endpoint>().await.unwrap();
        run2.get::<Endpoint>().await.unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 2);
    }
}
