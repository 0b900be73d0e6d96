//! Event broadcasting for pool lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted by a [`Pool`](crate::Pool) and an
//! [`EventBus`] backed by `tokio::sync::broadcast`.

use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted during pool operations.
///
/// Every variant carries the id of the pool that emitted it, so several pools
/// can share one bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// The factory built a new resource.
    Created {
        /// The emitting pool.
        pool_id: Uuid,
    },
    /// A resource was handed to a caller.
    Acquired {
        /// The emitting pool.
        pool_id: Uuid,
        /// Whether it came from the idle set rather than the factory.
        reused: bool,
    },
    /// A returned resource went back into the idle set.
    Released {
        /// The emitting pool.
        pool_id: Uuid,
    },
    /// A resource was destroyed.
    Destroyed {
        /// The emitting pool.
        pool_id: Uuid,
        /// Why it was destroyed.
        reason: DestroyReason,
    },
    /// An acquire was refused because the pool is at capacity.
    Exhausted {
        /// The emitting pool.
        pool_id: Uuid,
        /// Open resources at the time.
        open: usize,
        /// Configured ceiling.
        max_active: usize,
    },
    /// The pool was shut down.
    ShutDown {
        /// The emitting pool.
        pool_id: Uuid,
        /// Idle resources destroyed by the drain.
        drained: usize,
    },
}

// ---------------------------------------------------------------------------
// DestroyReason
// ---------------------------------------------------------------------------

/// Reason a resource was permanently removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// It sat idle for at least the idle timeout.
    Stale,
    /// The factory's validation rejected it.
    ValidationFailed,
    /// It was returned while the idle set was full.
    Overflow,
    /// It was returned after shutdown.
    Closed,
    /// The caller asked for it.
    Explicit,
    /// The shutdown drain.
    Shutdown,
    /// The initial fill failed part way through.
    Rollback,
    /// A guard was dropped where no runtime could run the factory's destroy.
    Abandoned,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool events.
///
/// Emission is fire-and-forget: with no subscribers, or with a full channel,
/// events are dropped and the emitter never waits.
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    ///
    /// Subscribers that fall more than `buffer_size` events behind receive
    /// `Lagged` and skip ahead.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // No receivers is not an error for us.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
