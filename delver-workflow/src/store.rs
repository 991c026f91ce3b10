//! Per-run keyed state store with scoped atomic edits.
//!
//! One `tokio::sync::Mutex` guards the whole map. Plain reads take the lock
//! briefly and clone; [`ContextStore::edit`] holds it for the lifetime of
//! the returned guard, so an edit is atomic relative to every other access
//! and readers never observe a partially applied edit. The guard releases
//! on all exit paths, including panics and early returns.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use delver_core::error::StateError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OwnedMutexGuard};

type StoreMap = HashMap<String, serde_json::Value>;

/// Keyed store of opaque serializable values, owned by one run context.
#[derive(Clone, Default)]
pub struct ContextStore {
    inner: Arc<Mutex<StoreMap>>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value by key, cloning it out. Missing keys yield `None`;
    /// reads never fail.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.lock().await.get(key).cloned()
    }

    /// Read a value by key, falling back to `default` when missing.
    pub async fn get_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.get(key).await.unwrap_or(default)
    }

    /// Decode a stored value into a type. Missing keys yield `Ok(None)`;
    /// a present value that does not decode is a [`StateError`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.get(key).await {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                StateError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }

    /// Overwrite a value atomically.
    pub async fn set(&self, key: &str, value: serde_json::Value) {
        self.inner.lock().await.insert(key.to_string(), value);
    }

    /// Serialize and store a typed value.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(value).map_err(|e| StateError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set(key, value).await;
        Ok(())
    }

    /// Acquire exclusive access to the store for the guard's lifetime.
    ///
    /// Concurrent edits across tasks serialize here. Do not hold the guard
    /// across calls that re-enter the same store — that deadlocks.
    pub async fn edit(&self) -> StoreGuard {
        StoreGuard {
            guard: self.inner.clone().lock_owned().await,
        }
    }

    /// Snapshot the whole store (used for sub-agent state handoff).
    pub async fn snapshot(&self) -> StoreMap {
        self.inner.lock().await.clone()
    }
}

/// Exclusive, mutable view of the store. Dropping publishes the edit.
pub struct StoreGuard {
    guard: OwnedMutexGuard<StoreMap>,
}

impl StoreGuard {
    /// Decode a value under the guard. Missing keys yield `Ok(None)`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.guard.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                StateError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }

    /// Serialize and store a typed value under the guard.
    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(value).map_err(|e| StateError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.guard.insert(key.to_string(), value);
        Ok(())
    }
}

impl Deref for StoreGuard {
    type Target = StoreMap;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for StoreGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
