//! Resource pool: a bounded idle set plus a ceiling on open resources.
//!
//! `Pool<F>` calls `F::create`, `F::validate` and `F::destroy` and keeps only
//! the bookkeeping: which resources are idle and how many are open.
//!
//! Acquire never waits for a resource to come back. When nothing usable is
//! idle and `max_active` resources are already open it fails with
//! [`Error::PoolExhausted`] and leaves backoff to the caller.

pub mod config;
mod idle;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{Error, FactoryOperation, Result};
use crate::events::{DestroyReason, EventBus, PoolEvent};
use crate::factory::ResourceFactory;
use crate::guard::Pooled;

pub use config::{PoolBuilder, PoolConfig};
use idle::{IdleEntry, IdleSet, Rejected};

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources built by the factory.
    pub created: u64,
    /// Resources destroyed, for any reason.
    pub destroyed: u64,
    /// Successful acquisitions.
    pub acquisitions: u64,
    /// Acquisitions served from the idle set.
    pub reused: u64,
    /// Returns that landed in the idle set.
    pub releases: u64,
    /// Idle resources destroyed for exceeding the idle timeout.
    pub stale_evictions: u64,
    /// Idle resources destroyed because validation failed.
    pub validation_failures: u64,
    /// Returns destroyed because the idle set was full.
    pub overflow_discards: u64,
    /// Acquisitions refused at capacity.
    pub exhausted: u64,
    /// Open resources when the snapshot was taken.
    pub open: usize,
    /// Idle resources when the snapshot was taken.
    pub idle: usize,
}

/// Inner shared state for the pool.
struct PoolInner<F: ResourceFactory> {
    id: Uuid,
    factory: F,
    config: PoolConfig,
    idle: IdleSet<F::Resource>,
    /// Idle plus checked-out. Only grows under `gate`.
    open: AtomicUsize,
    /// Held across the capacity check and `create`, and across the idle-set
    /// detach in `shutdown`.
    gate: tokio::sync::Mutex<()>,
    stats: Mutex<PoolStats>,
    events: Option<Arc<EventBus>>,
}

/// Generic resource pool.
///
/// Cheap to clone; clones share the same idle set and counters. Every
/// resource the pool hands out is in exactly one state: idle in the pool,
/// checked out by a caller, or destroyed.
pub struct Pool<F: ResourceFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ResourceFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<F: ResourceFactory> Pool<F> {
    /// Start building a pool.
    #[must_use]
    pub fn builder() -> PoolBuilder<F> {
        PoolBuilder::new()
    }

    /// Create a pool and fill it with `config.initial_size` resources.
    ///
    /// # Errors
    /// `InvalidConfiguration` unless `initial_size <= max_idle <= max_active`.
    /// If the factory fails during the fill, every resource built so far is
    /// destroyed and the factory error is returned.
    pub async fn new(config: PoolConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Self::construct(config, factory, None).await
    }

    /// Expects an already validated `config`.
    pub(crate) async fn construct(
        config: PoolConfig,
        factory: F,
        events: Option<Arc<EventBus>>,
    ) -> Result<Self> {
        let pool = Self {
            inner: Arc::new(PoolInner {
                id: Uuid::new_v4(),
                factory,
                idle: IdleSet::with_capacity(config.max_idle),
                config,
                open: AtomicUsize::new(0),
                gate: tokio::sync::Mutex::new(()),
                stats: Mutex::new(PoolStats::default()),
                events,
            }),
        };

        for _ in 0..pool.inner.config.initial_size {
            let resource = match pool.inner.factory.create().await {
                Ok(resource) => resource,
                Err(err) => {
                    pool.roll_back().await;
                    return Err(Error::factory(FactoryOperation::Create, err));
                }
            };
            let open = pool.inner.open.fetch_add(1, Ordering::SeqCst) + 1;
            pool.record_created(open);
            if let Err(rejected) = pool.inner.idle.push(IdleEntry::new(resource)) {
                pool.settle(rejected).await?;
            }
        }

        debug!(
            pool_id = %pool.inner.id,
            initial_size = pool.inner.config.initial_size,
            max_idle = pool.inner.config.max_idle,
            max_active = pool.inner.config.max_active,
            "Pool created"
        );
        Ok(pool)
    }

    /// Destroy whatever the initial fill managed to build.
    async fn roll_back(&self) {
        let Some(queue) = self.inner.idle.detach() else {
            return;
        };
        while let Some(entry) = queue.pop() {
            self.discard_quietly(entry.resource, DestroyReason::Rollback)
                .await;
        }
    }

    /// Unique id of this pool, carried by its events and guards.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Number of idle resources right now. Zero once shut down.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.idle.len()
    }

    /// Number of open resources (idle plus checked out).
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.idle.is_detached()
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.open = self.open_count();
        stats.idle = self.size();
        stats
    }

    /// Take a resource out of the pool.
    ///
    /// Idle resources are tried first. One that has been idle for at least
    /// `idle_timeout`, or that fails the factory's validation, is destroyed
    /// and the next is tried; at most as many are discarded as were idle when
    /// the call started. If none is usable a new one is built, unless
    /// `max_active` resources are already open.
    ///
    /// # Errors
    /// `PoolClosed` after shutdown, `PoolExhausted` at capacity, or the
    /// factory's create error.
    pub async fn acquire(&self) -> Result<F::Resource> {
        let inner = &*self.inner;
        let budget = inner.idle.len();
        let mut discarded = 0;

        loop {
            let entry = match inner.idle.pop() {
                None => return Err(Error::PoolClosed),
                Some(None) => break,
                Some(Some(entry)) => entry,
            };

            if inner.config.is_stale(entry.idle_for()) {
                inner.stats.lock().stale_evictions += 1;
                self.discard_quietly(entry.resource, DestroyReason::Stale)
                    .await;
            } else {
                let verdict = inner.factory.validate(&entry.resource).await;
                match verdict {
                    Ok(()) => {
                        self.record_acquired(true);
                        return Ok(entry.resource);
                    }
                    Err(err) => {
                        trace!(pool_id = %inner.id, error = %err, "Idle resource failed validation");
                        inner.stats.lock().validation_failures += 1;
                        self.discard_quietly(entry.resource, DestroyReason::ValidationFailed)
                            .await;
                    }
                }
            }

            discarded += 1;
            if discarded >= budget {
                break;
            }
        }

        self.acquire_new().await
    }

    async fn acquire_new(&self) -> Result<F::Resource> {
        let inner = &*self.inner;
        let _gate = inner.gate.lock().await;

        if inner.idle.is_detached() {
            return Err(Error::PoolClosed);
        }

        let open = inner.open.load(Ordering::SeqCst);
        let max_active = inner.config.max_active;
        if open >= max_active {
            inner.stats.lock().exhausted += 1;
            self.emit(PoolEvent::Exhausted {
                pool_id: inner.id,
                open,
                max_active,
            });
            debug!(pool_id = %inner.id, open, max_active, "Pool exhausted");
            return Err(Error::PoolExhausted { open, max_active });
        }

        let resource = inner
            .factory
            .create()
            .await
            .map_err(|err| Error::factory(FactoryOperation::Create, err))?;
        let open = inner.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.record_created(open);
        self.record_acquired(false);
        Ok(resource)
    }

    /// [`acquire`](Self::acquire), wrapped in a guard that gives the resource
    /// back when dropped.
    pub async fn get(&self) -> Result<Pooled<F>> {
        let resource = self.acquire().await?;
        Ok(Pooled::new(self.clone(), resource))
    }

    /// Return a checked-out resource.
    ///
    /// It becomes idle if the idle set has room; otherwise, or if the pool
    /// has been shut down, it is destroyed and only the factory's destroy
    /// error can come back.
    pub async fn release(&self, resource: F::Resource) -> Result<()> {
        match self.inner.idle.push(IdleEntry::new(resource)) {
            Ok(()) => {
                self.inner.stats.lock().releases += 1;
                self.emit(PoolEvent::Released {
                    pool_id: self.inner.id,
                });
                trace!(pool_id = %self.inner.id, "Resource returned to idle set");
                Ok(())
            }
            Err(rejected) => self.settle(rejected).await,
        }
    }

    /// Return a guard issued by this pool and wait for the release to finish.
    ///
    /// # Errors
    /// `InvalidArgument` if another pool issued the guard. The guard is then
    /// dropped and goes back to the pool that issued it.
    pub async fn checkin(&self, pooled: Pooled<F>) -> Result<()> {
        if pooled.pool_id() != self.inner.id {
            return Err(Error::invalid_argument(format!(
                "guard was issued by pool {}, not {}",
                pooled.pool_id(),
                self.inner.id
            )));
        }
        pooled.release().await
    }

    /// Destroy a resource this pool opened.
    ///
    /// The open count drops first, even if the factory then fails to destroy
    /// the resource.
    pub async fn destroy(&self, resource: F::Resource) -> Result<()> {
        self.discard(resource, DestroyReason::Explicit).await
    }

    /// Ask the factory whether `resource` is still usable.
    pub async fn validate(&self, resource: &F::Resource) -> Result<()> {
        self.inner
            .factory
            .validate(resource)
            .await
            .map_err(|err| Error::factory(FactoryOperation::Validate, err))
    }

    /// Destroy every idle resource whose idle timeout has elapsed.
    ///
    /// Acquire already skips stale resources; this lets a caller release
    /// them without waiting for the next acquire. Returns how many were
    /// destroyed.
    ///
    /// # Errors
    /// `PoolClosed` after shutdown.
    pub async fn evict_stale(&self) -> Result<usize> {
        let inner = &*self.inner;
        if inner.idle.is_detached() {
            return Err(Error::PoolClosed);
        }
        if inner.config.idle_timeout.is_zero() {
            return Ok(0);
        }

        let Some(stale) = inner
            .idle
            .take_stale(|entry| inner.config.is_stale(entry.idle_for()))
        else {
            return Err(Error::PoolClosed);
        };

        let evicted = stale.len();
        inner.stats.lock().stale_evictions += evicted as u64;
        for resource in stale {
            self.discard_quietly(resource, DestroyReason::Stale).await;
        }
        if evicted > 0 {
            debug!(pool_id = %inner.id, evicted, "Evicted stale resources");
        }
        Ok(evicted)
    }

    /// Close the pool and destroy every idle resource.
    ///
    /// Afterwards `acquire` fails with `PoolClosed` and `release` destroys
    /// instead of re-pooling. Destroy failures during the drain are logged,
    /// not returned. Calling it again does nothing.
    pub async fn shutdown(&self) {
        let queue = {
            let _gate = self.inner.gate.lock().await;
            self.inner.idle.detach()
        };
        let Some(queue) = queue else {
            return;
        };

        let mut drained = 0;
        while let Some(entry) = queue.pop() {
            self.discard_quietly(entry.resource, DestroyReason::Shutdown)
                .await;
            drained += 1;
        }

        self.emit(PoolEvent::ShutDown {
            pool_id: self.inner.id,
            drained,
        });
        debug!(
            pool_id = %self.inner.id,
            drained,
            open = self.open_count(),
            "Pool shut down"
        );
    }

    /// Destroy a resource the idle set would not take.
    async fn settle(&self, rejected: Rejected<F::Resource>) -> Result<()> {
        match rejected {
            Rejected::Full(resource) => {
                self.inner.stats.lock().overflow_discards += 1;
                self.discard(resource, DestroyReason::Overflow).await
            }
            Rejected::Detached(resource) => self.discard(resource, DestroyReason::Closed).await,
        }
    }

    /// The only place the open count goes down.
    async fn discard(&self, resource: F::Resource, reason: DestroyReason) -> Result<()> {
        let open = self.forget_one();
        self.inner.stats.lock().destroyed += 1;
        self.emit(PoolEvent::Destroyed {
            pool_id: self.inner.id,
            reason,
        });
        debug!(pool_id = %self.inner.id, open, ?reason, "Destroying resource");

        self.inner
            .factory
            .destroy(resource)
            .await
            .map_err(|err| Error::factory(FactoryOperation::Destroy, err))
    }

    async fn discard_quietly(&self, resource: F::Resource, reason: DestroyReason) {
        if let Err(err) = self.discard(resource, reason).await {
            warn!(pool_id = %self.inner.id, ?reason, error = ?err, "Failed to destroy resource");
        }
    }

    /// Account for a resource dropped without going through the factory.
    pub(crate) fn abandon(&self, resource: F::Resource) {
        let open = self.forget_one();
        self.inner.stats.lock().destroyed += 1;
        self.emit(PoolEvent::Destroyed {
            pool_id: self.inner.id,
            reason: DestroyReason::Abandoned,
        });
        warn!(
            pool_id = %self.inner.id,
            open,
            "No runtime to return dropped guard; resource dropped without factory destroy"
        );
        drop(resource);
    }

    /// Decrement the open count, never below zero. Returns the new count.
    fn forget_one(&self) -> usize {
        match self
            .inner
            .open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!(
                    pool_id = %self.inner.id,
                    "Destroying a resource with no open resources recorded"
                );
                0
            }
        }
    }

    fn record_created(&self, open: usize) {
        self.inner.stats.lock().created += 1;
        self.emit(PoolEvent::Created {
            pool_id: self.inner.id,
        });
        debug!(pool_id = %self.inner.id, open, "Constructed resource");
    }

    fn record_acquired(&self, reused: bool) {
        {
            let mut stats = self.inner.stats.lock();
            stats.acquisitions += 1;
            if reused {
                stats.reused += 1;
            }
        }
        self.emit(PoolEvent::Acquired {
            pool_id: self.inner.id,
            reused,
        });
        trace!(pool_id = %self.inner.id, reused, "Resource acquired");
    }

    fn emit(&self, event: PoolEvent) {
        if let Some(bus) = &self.inner.events {
            bus.emit(event);
        }
    }
}
