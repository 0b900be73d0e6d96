//! Metrics collection for pool events.
//!
//! Subscribes to the [`EventBus`] and translates events into counters via
//! the `metrics` crate.
//!
//! Gated behind the `metrics` feature.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::events::{DestroyReason, EventBus, PoolEvent};

/// Background collector that subscribes to an [`EventBus`] and records
/// counters via the `metrics` crate.
///
/// # Usage
///
/// ```rust,ignore
/// let bus = Arc::new(EventBus::default());
/// let pool = Pool::builder().factory(factory).event_bus(bus.clone()).build().await?;
/// let cancel = CancellationToken::new();
/// tokio::spawn(MetricsCollector::new(&bus).run(cancel));
/// ```
pub struct MetricsCollector {
    receiver: broadcast::Receiver<PoolEvent>,
}

impl MetricsCollector {
    /// Create a new collector subscribed to the given event bus.
    #[must_use]
    pub fn new(event_bus: &EventBus) -> Self {
        Self {
            receiver: event_bus.subscribe(),
        }
    }

    /// Run until the bus is dropped or `cancel` fires. Lagged events are
    /// skipped with a warning.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                result = self.receiver.recv() => {
                    match result {
                        Ok(event) => Self::record_event(&event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "MetricsCollector lagged behind event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    }

    fn record_event(event: &PoolEvent) {
        match event {
            PoolEvent::Created { pool_id } => {
                metrics::counter!("pool.create.total", "pool_id" => pool_id.to_string())
                    .increment(1);
            }
            PoolEvent::Acquired { pool_id, reused } => {
                metrics::counter!(
                    "pool.acquire.total",
                    "pool_id" => pool_id.to_string(),
                    "reused" => reused.to_string()
                )
                .increment(1);
            }
            PoolEvent::Released { pool_id } => {
                metrics::counter!("pool.release.total", "pool_id" => pool_id.to_string())
                    .increment(1);
            }
            PoolEvent::Destroyed { pool_id, reason } => {
                metrics::counter!(
                    "pool.destroy.total",
                    "pool_id" => pool_id.to_string(),
                    "reason" => reason_label(*reason)
                )
                .increment(1);
            }
            PoolEvent::Exhausted { pool_id, .. } => {
                metrics::counter!("pool.exhausted.total", "pool_id" => pool_id.to_string())
                    .increment(1);
            }
            // Shutdown is a one-off; the drain shows up as destroy counts.
            PoolEvent::ShutDown { .. } => {}
        }
    }
}

fn reason_label(reason: DestroyReason) -> &'static str {
    match reason {
        DestroyReason::Stale => "stale",
        DestroyReason::ValidationFailed => "validation_failed",
        DestroyReason::Overflow => "overflow",
        DestroyReason::Closed => "closed",
        DestroyReason::Explicit => "explicit",
        DestroyReason::Shutdown => "shutdown",
        DestroyReason::Rollback => "rollback",
        DestroyReason::Abandoned => "abandoned",
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector").finish()
    }
}

/// Create a [`MetricsCollector`] and spawn it as a background task.
pub fn spawn_metrics_collector(
    event_bus: &Arc<EventBus>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let collector = MetricsCollector::new(event_bus);
    tokio::spawn(collector.run(cancel))
}
