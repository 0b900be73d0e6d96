//! The factory contract the pool delegates resource construction to.
//!
//! The pool never builds, checks or tears down a resource itself. It calls
//! `create`, `validate` and `destroy` on the factory it was built with and
//! keeps only the bookkeeping.

use async_trait::async_trait;

/// Caller-supplied collaborator that knows how to build, check and close one
/// kind of resource (a socket, a driver connection, a client handle).
///
/// `create` may be called from several tasks at once when the pool is shared.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource.
    type Resource: Send + 'static;

    /// Error reported by any factory call. The pool passes it through as the
    /// source of [`Error::Factory`](crate::Error::Factory).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build one new resource.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Check that an idle resource is still usable.
    ///
    /// An error means the resource should be discarded.
    async fn validate(&self, _resource: &Self::Resource) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Release whatever the resource holds (close the socket, the handle...).
    async fn destroy(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        drop(resource);
        Ok(())
    }
}
