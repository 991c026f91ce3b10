//! Streaming event bus: multi-producer, single-consumer, close-on-complete.
//!
//! Producers (steps, sub-agent runs) share one [`EventStream`] handle and
//! publish without blocking. Publication never fails — events written after
//! close are dropped. The runtime closes the stream when the run finishes
//! so consumers see end-of-stream instead of hanging.

use std::sync::{Arc, Mutex};

use delver_core::event::WorkflowEvent;
use tokio::sync::mpsc;

/// Cloneable producer handle to the per-run event stream.
#[derive(Clone)]
pub struct EventStream {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<Box<dyn WorkflowEvent>>>>>,
}

impl EventStream {
    /// Create a stream and its single consumer side.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Box<dyn WorkflowEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Publish an event. Non-blocking; a no-op once the stream is closed.
    pub fn send(&self, event: Box<dyn WorkflowEvent>) {
        let tx = self.tx.lock().expect("stream lock poisoned");
        if let Some(tx) = tx.as_ref() {
            // Receiver may already be gone; publication still never fails.
            let _ = tx.send(event);
        }
    }

    /// Close the stream. Subsequent sends are dropped; the consumer sees
    /// end-of-stream once buffered events drain.
    pub fn close(&self) {
        self.tx.lock().expect("stream lock poisoned").take();
    }
}
