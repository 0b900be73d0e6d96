//! Testing utilities for pools
//!
//! [`MockFactory`] hands out numbered [`MockConn`]s and records every call so
//! tests can assert on what the pool did. Clones share state, so a test can
//! keep one handle while the pool owns another.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::factory::ResourceFactory;

/// Connection handed out by [`MockFactory`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockConn {
    id: u64,
    uses: u32,
}

impl MockConn {
    /// A connection no factory built, e.g. to hand a pool something foreign.
    #[must_use]
    pub fn detached(id: u64) -> Self {
        Self { id, uses: 0 }
    }

    /// Creation order, starting at zero.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn touch(&mut self) {
        self.uses += 1;
    }

    #[must_use]
    pub fn uses(&self) -> u32 {
        self.uses
    }
}

/// Failures injected by [`MockFactory`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockError {
    #[error("create call {call} failed")]
    Create { call: u64 },
    #[error("connection {id} is invalid")]
    Invalid { id: u64 },
    #[error("connection {id} failed to close")]
    Destroy { id: u64 },
}

#[derive(Default)]
struct MockState {
    create_calls: AtomicU64,
    next_id: AtomicU64,
    validations: AtomicU64,
    failing_calls: Mutex<HashSet<u64>>,
    invalid: Mutex<HashSet<u64>>,
    destroyed: Mutex<Vec<u64>>,
    fail_destroy: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
}

/// Factory double with failure injection and call recording.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<MockState>,
}

impl MockFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th `create` (zero-based, counting failures) fail.
    pub fn fail_create_call(&self, call: u64) {
        self.state.failing_calls.lock().insert(call);
    }

    /// Make validation of connection `id` fail from now on.
    pub fn invalidate(&self, id: u64) {
        self.state.invalid.lock().insert(id);
    }

    pub fn set_fail_destroy(&self, fail: bool) {
        self.state.fail_destroy.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every `create`.
    pub fn set_create_delay(&self, delay: Duration) {
        *self.state.create_delay.lock() = Some(delay);
    }

    /// Connections successfully built.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.state.next_id.load(Ordering::SeqCst)
    }

    /// All `create` calls, failed ones included.
    #[must_use]
    pub fn create_calls(&self) -> u64 {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn validations(&self) -> u64 {
        self.state.validations.load(Ordering::SeqCst)
    }

    /// Ids passed to `destroy`, in call order, failed destroys included.
    #[must_use]
    pub fn destroyed(&self) -> Vec<u64> {
        self.state.destroyed.lock().clone()
    }

    /// Built and not yet destroyed.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.created()
            .saturating_sub(self.state.destroyed.lock().len() as u64)
    }
}

impl std::fmt::Debug for MockFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFactory")
            .field("created", &self.created())
            .field("destroyed", &self.state.destroyed.lock().len())
            .finish()
    }
}

#[async_trait]
impl ResourceFactory for MockFactory {
    type Resource = MockConn;
    type Error = MockError;

    async fn create(&self) -> Result<MockConn, MockError> {
        let call = self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.failing_calls.lock().contains(&call) {
            return Err(MockError::Create { call });
        }
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MockConn { id, uses: 0 })
    }

    async fn validate(&self, conn: &MockConn) -> Result<(), MockError> {
        self.state.validations.fetch_add(1, Ordering::SeqCst);
        if self.state.invalid.lock().contains(&conn.id) {
            return Err(MockError::Invalid { id: conn.id });
        }
        Ok(())
    }

    async fn destroy(&self, conn: MockConn) -> Result<(), MockError> {
        self.state.destroyed.lock().push(conn.id);
        if self.state.fail_destroy.load(Ordering::SeqCst) {
            return Err(MockError::Destroy { id: conn.id });
        }
        Ok(())
    }
}
