//! Pool configuration types

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::factory::ResourceFactory;

use super::Pool;

/// Configuration for a resource pool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Resources constructed up front and placed idle
    pub initial_size: usize,
    /// Capacity of the idle set; returns beyond it are destroyed
    pub max_idle: usize,
    /// Ceiling on open resources (idle + checked out)
    pub max_active: usize,
    /// How long a resource may sit idle before it is stale; zero disables
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_idle: 8,
            max_active: 16,
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    ///
    /// Requires `initial_size <= max_idle <= max_active`.
    pub fn validate(&self) -> Result<()> {
        if self.initial_size > self.max_idle {
            return Err(Error::configuration(format!(
                "initial_size ({}) must not exceed max_idle ({})",
                self.initial_size, self.max_idle
            )));
        }
        if self.max_idle > self.max_active {
            return Err(Error::configuration(format!(
                "max_idle ({}) must not exceed max_active ({})",
                self.max_idle, self.max_active
            )));
        }
        Ok(())
    }

    pub(crate) fn is_stale(&self, idle_for: Duration) -> bool {
        !self.idle_timeout.is_zero() && idle_for >= self.idle_timeout
    }
}

/// Builder for [`Pool`].
///
/// ```rust,ignore
/// let pool = Pool::builder()
///     .factory(TcpFactory::new(addr))
///     .initial_size(2)
///     .max_idle(4)
///     .max_active(8)
///     .idle_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// ```
pub struct PoolBuilder<F: ResourceFactory> {
    config: PoolConfig,
    factory: Option<F>,
    events: Option<Arc<EventBus>>,
}

impl<F: ResourceFactory> PoolBuilder<F> {
    /// Start from [`PoolConfig::default`] with no factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            factory: None,
            events: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.config.initial_size = initial_size;
        self
    }

    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    pub fn max_active(mut self, max_active: usize) -> Self {
        self.config.max_active = max_active;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.config.idle_timeout = idle_timeout;
        self
    }

    /// Set the factory the pool delegates to. Required.
    pub fn factory(mut self, factory: F) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Publish lifecycle events on `bus`.
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Validate the configuration, then construct the pool and fill it with
    /// `initial_size` resources.
    ///
    /// # Errors
    /// `InvalidConfiguration` for bad bounds or a missing factory, or the
    /// factory error if the initial fill fails.
    pub async fn build(self) -> Result<Pool<F>> {
        self.config.validate()?;
        let factory = self
            .factory
            .ok_or_else(|| Error::configuration("a resource factory is required"))?;
        Pool::construct(self.config, factory, self.events).await
    }
}

impl<F: ResourceFactory> Default for PoolBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ResourceFactory> std::fmt::Debug for PoolBuilder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("config", &self.config)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}
