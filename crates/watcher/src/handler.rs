//! Event and error sinks
//!
//! The event sink is asynchronous and receives every record in queue order,
//! one invocation at a time. The error sink is synchronous and receives
//! native-layer failures plus handler failures caught at the drain boundary.

use crate::error::WatchError;
use async_trait::async_trait;
use parking_lot::RwLock;
use relay_core::EventRecord;
use std::future::Future;
use std::sync::Arc;

/// Asynchronous consumer of the ordered event stream
///
/// Implemented for any `Fn(EventRecord) -> impl Future<Output = anyhow::Result<()>>`
/// so a plain async closure can be passed to the builder.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one record; the next record is not delivered until this returns
    async fn handle(&self, record: EventRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(EventRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, record: EventRecord) -> anyhow::Result<()> {
        (self)(record).await
    }
}

/// Synchronous callback receiving errors that never reach a caller
pub type ErrorHandler = Arc<dyn Fn(&WatchError) + Send + Sync + 'static>;

/// Shared error notification path
///
/// Falls back to logging when no callback is installed.
#[derive(Default)]
pub struct ErrorSink {
    callback: RwLock<Option<ErrorHandler>>,
}

impl ErrorSink {
    pub fn new(callback: Option<ErrorHandler>) -> Self {
        Self {
            callback: RwLock::new(callback),
        }
    }

    /// Deliver an error to the installed callback
    pub fn report(&self, error: &WatchError) {
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback(error),
            None => tracing::warn!("Unhandled watcher error: {}", error),
        }
    }

    pub fn set(&self, callback: ErrorHandler) {
        *self.callback.write() = Some(callback);
    }

    /// Drop the callback (disposal)
    pub fn clear(&self) {
        self.callback.write().take();
    }
}
