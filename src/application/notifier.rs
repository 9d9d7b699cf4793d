//! Best-effort progress delivery.
//!
//! Pagination loops hand events to a [`Notifier`], which pushes them into a
//! [`ProgressSink`] with a small bounded retry. Delivery failures are logged
//! and dropped; they never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{NotifyConfig, ProgressEvent};

/// Why an event could not be handed over.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("progress queue is full")]
    QueueFull,

    #[error("progress receiver is gone")]
    Closed,
}

impl DeliveryError {
    /// Whether another attempt can succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::QueueFull)
    }
}

/// Destination for progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError>;
}

/// Sink writing into a bounded queue drained by the UI surface.
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Sink for runs without any UI attached.
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn deliver(&self, event: &ProgressEvent) -> Result<(), DeliveryError> {
        tracing::trace!(?event, "Discarding progress event");
        Ok(())
    }
}

/// Fire-and-forget event emitter with linear backoff.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn ProgressSink>,
    max_attempts: u32,
    backoff: Duration,
}

impl Notifier {
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>, config: &NotifyConfig) -> Self {
        Self {
            sink,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Notifier backed by a bounded queue, plus the receiving end.
    #[must_use]
    pub fn channel(config: &NotifyConfig) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        (Self::new(Arc::new(ChannelSink::new(tx)), config), rx)
    }

    /// Notifier that drops everything.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink), &NotifyConfig::default())
    }

    /// Delivers `event`, retrying up to the configured attempt count.
    pub async fn emit(&self, event: ProgressEvent) {
        for attempt in 1..=self.max_attempts {
            match self.sink.deliver(&event).await {
                Ok(()) => return,
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(attempt, error = %e, "Progress delivery failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, event = %event.summary(), "Dropping progress event");
                    return;
                }
            }
        }
    }
}
