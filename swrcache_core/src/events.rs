//! Asynchronous invalidation and refresh dispatch
//!
//! Write-side operations in ASYNC modes enqueue an event and return; a
//! worker replays each event against the engine's synchronous counterpart.
//! Handlers never dispatch further events, so a replayed event always
//! terminates. Delivery is at-least-once and handlers are idempotent.

use crate::error::{Result, StoreError};
use crate::key::Selector;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A deferred invalidation or refresh request
#[derive(Debug, Clone)]
pub struct AsyncEvent {
    /// What the event targets.
    pub selector: Selector,
    /// Exact-key operation rather than a prefix-scoped one.
    pub exact: bool,
    /// Recompute-and-save rather than delete.
    pub refresh: bool,
}

/// Publish side of the event bus
///
/// `dispatch` must enqueue and return without blocking the caller.
pub trait EventBus: Send + Sync {
    /// Enqueue an event for eventual handling.
    fn dispatch(&self, event: AsyncEvent) -> Result<()>;
}

/// Consumer of bus events
///
/// Implemented by the engine: each event maps back to the synchronous
/// counterpart of the operation that enqueued it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply one event.
    async fn handle_event(&self, event: AsyncEvent) -> Result<()>;
}

/// Queue-backed in-process bus with a single worker task
pub struct InProcessBus {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<AsyncEvent>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<AsyncEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InProcessBus {
    /// Create a bus with no worker attached yet.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker task feeding `handler`.
    ///
    /// Events dispatched before `attach` are retained and handled once the
    /// worker starts. Attaching twice is a no-op.
    pub async fn attach(&self, handler: Arc<dyn EventHandler>) {
        let Some(mut rx) = self.rx.lock().await.take() else {
            return;
        };

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!(
                    "handling event: selector='{}' exact={} refresh={}",
                    event.selector.prefix_string(),
                    event.exact,
                    event.refresh
                );
                if let Err(error) = handler.handle_event(event).await {
                    // Handler failures stay on the bus side; the enqueueing
                    // caller already moved on.
                    warn!("event handler failed: {error}");
                }
            }
        });

        *self.worker.lock().await = Some(worker);
    }

    /// Close the queue and wait for the worker to drain it.
    pub async fn shutdown(&self) {
        self.tx.lock().unwrap().take();
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InProcessBus {
    fn dispatch(&self, event: AsyncEvent) -> Result<()> {
        let guard = self.tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            return Err(StoreError::unavailable("event bus is shut down").into());
        };
        tx.send(event)
            .map_err(|_| StoreError::unavailable("event bus worker is gone").into())
    }
}
