//! # respool
//!
//! A generic resource pool. It hands out interchangeable resources (network
//! connections, driver handles), takes them back for reuse, caps how many are
//! open at once, and evicts idle ones that went stale or fail validation.
//!
//! Building, checking and closing a resource is delegated to a caller-supplied
//! [`ResourceFactory`]. Acquisition never blocks: at capacity it fails with
//! [`Error::PoolExhausted`] and the caller decides how to back off.

pub mod error;
pub mod events;
pub mod factory;
pub mod guard;
pub mod pool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use error::{Error, FactoryOperation, Result};
pub use events::{DestroyReason, EventBus, PoolEvent};
pub use factory::ResourceFactory;
pub use guard::Pooled;
pub use pool::{Pool, PoolBuilder, PoolConfig, PoolStats};

#[cfg(feature = "metrics")]
pub use metrics::{MetricsCollector, spawn_metrics_collector};
