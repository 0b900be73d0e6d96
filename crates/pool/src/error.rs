//! Error types for pool operations
use std::fmt;

use thiserror::Error;

/// Boxed error produced by a [`ResourceFactory`](crate::ResourceFactory).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// The factory call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryOperation {
    /// `ResourceFactory::create`
    Create,
    /// `ResourceFactory::validate`
    Validate,
    /// `ResourceFactory::destroy`
    Destroy,
}

impl fmt::Display for FactoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Validate => "validate",
            Self::Destroy => "destroy",
        })
    }
}

/// Error type for pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// Pool parameters are malformed; the pool was never created
    #[error("Configuration error: {message}")]
    InvalidConfiguration {
        /// What is wrong with the configuration
        message: String,
    },

    /// A handle the pool cannot accept was passed to an operation
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Why the argument was rejected
        message: String,
    },

    /// The pool has been shut down
    #[error("Pool is closed")]
    PoolClosed,

    /// Every permitted resource is open and none is idle
    #[error("Pool exhausted: {open}/{max_active} resources open")]
    PoolExhausted {
        /// Open resources at the time of the attempt
        open: usize,
        /// Configured ceiling
        max_active: usize,
    },

    /// The resource factory failed; `source` is the factory's own error
    #[error("Resource factory failed to {operation}")]
    Factory {
        /// Which factory call failed
        operation: FactoryOperation,
        /// The factory's error, untouched
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn factory<E>(operation: FactoryOperation, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Factory {
            operation,
            source: Box::new(source),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only exhaustion is: the caller may back off and try again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Downcast the factory error carried by [`Error::Factory`].
    #[must_use]
    pub fn factory_source<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Factory { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// The factory call that failed, if this is a factory error.
    #[must_use]
    pub fn factory_operation(&self) -> Option<FactoryOperation> {
        match self {
            Self::Factory { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("socket reset")]
    struct SocketReset;

    #[test]
    fn only_exhaustion_is_retryable() {
        assert!(
            Error::PoolExhausted {
                open: 4,
                max_active: 4
            }
            .is_retryable()
        );
        assert!(!Error::PoolClosed.is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
        assert!(!Error::factory(FactoryOperation::Create, SocketReset).is_retryable());
    }

    #[test]
    fn factory_source_downcasts_original_error() {
        let err = Error::factory(FactoryOperation::Destroy, SocketReset);
        assert!(err.factory_source::<SocketReset>().is_some());
        assert_eq!(err.factory_operation(), Some(FactoryOperation::Destroy));
        assert!(Error::PoolClosed.factory_source::<SocketReset>().is_none());
    }

    #[test]
    fn display_messages() {
        let err = Error::PoolExhausted {
            open: 2,
            max_active: 2,
        };
        assert_eq!(err.to_string(), "Pool exhausted: 2/2 resources open");
        let err = Error::factory(FactoryOperation::Validate, SocketReset);
        assert_eq!(err.to_string(), "Resource factory failed to validate");
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("socket reset".to_string())
        );
    }
}
