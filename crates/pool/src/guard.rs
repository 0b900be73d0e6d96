//! RAII guard for checked-out resources

use std::time::{Duration, Instant};

use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::factory::ResourceFactory;
use crate::pool::Pool;

/// A checked-out resource that goes back to its pool when dropped.
///
/// Dropping the guard inside a tokio runtime spawns the release. Prefer
/// [`release`](Self::release) or [`Pool::checkin`] when the outcome matters.
/// Use [`detach`](Self::detach) to keep the resource; it then stays counted as
/// open until it is released or destroyed through the pool.
pub struct Pooled<F: ResourceFactory> {
    resource: Option<F::Resource>,
    pool: Pool<F>,
    acquired_at: Instant,
}

impl<F: ResourceFactory> Pooled<F> {
    pub(crate) fn new(pool: Pool<F>, resource: F::Resource) -> Self {
        Self {
            resource: Some(resource),
            pool,
            acquired_at: Instant::now(),
        }
    }

    /// Id of the pool that issued this guard.
    #[must_use]
    pub fn pool_id(&self) -> Uuid {
        self.pool.id()
    }

    /// How long the resource has been checked out.
    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Give the resource back to its pool.
    pub async fn release(mut self) -> Result<()> {
        let resource = self.take();
        self.pool.release(resource).await
    }

    /// Destroy the resource instead of returning it.
    pub async fn destroy(mut self) -> Result<()> {
        let resource = self.take();
        self.pool.destroy(resource).await
    }

    /// Take the resource out of the guard without returning it.
    #[must_use]
    pub fn detach(mut self) -> F::Resource {
        self.take()
    }

    fn take(&mut self) -> F::Resource {
        self.resource.take().expect("guard used after release")
    }
}

impl<F: ResourceFactory> std::ops::Deref for Pooled<F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        self.resource.as_ref().expect("guard used after release")
    }
}

impl<F: ResourceFactory> std::ops::DerefMut for Pooled<F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        self.resource.as_mut().expect("guard used after release")
    }
}

impl<F: ResourceFactory> Drop for Pooled<F> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let mut pending = PendingReturn {
                    pool: self.pool.clone(),
                    resource: Some(resource),
                };
                drop(handle.spawn(async move {
                    let Some(resource) = pending.resource.take() else {
                        return;
                    };
                    if let Err(err) = pending.pool.release(resource).await {
                        warn!(pool_id = %pending.pool.id(), error = ?err, "Failed to release dropped guard");
                    }
                }));
            }
            Err(_) => self.pool.abandon(resource),
        }
    }
}

/// A release scheduled from `Pooled::drop`. If the task is dropped before it
/// first runs (runtime shutting down), the resource is abandoned so the open
/// count still goes down.
struct PendingReturn<F: ResourceFactory> {
    pool: Pool<F>,
    resource: Option<F::Resource>,
}

impl<F: ResourceFactory> Drop for PendingReturn<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.abandon(resource);
        }
    }
}

impl<F> std::fmt::Debug for Pooled<F>
where
    F: ResourceFactory,
    F::Resource: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("resource", &self.resource)
            .field("pool_id", &self.pool.id())
            .finish()
    }
}
