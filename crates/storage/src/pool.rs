//! Connection pool abstraction consumed by the transaction wrapper.
//!
//! Drivers implement these two traits; the wrapper never sees driver types.

use async_trait::async_trait;
use masterymap_core::DbFailure;

use crate::params::{QueryOutput, SqlValue};

/// Source of pooled connections.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    type Connection: PooledConnection;

    /// Acquire a connection. Callers must hand it back with
    /// [`PooledConnection::release`].
    async fn connect(&self) -> Result<Self::Connection, DbFailure>;
}

/// A connection checked out of a [`ConnectionPool`].
#[async_trait]
pub trait PooledConnection: Send {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, DbFailure>;

    /// Return the connection to its pool. Consumes the handle, so a
    /// connection cannot be released twice.
    fn release(self)
    where
        Self: Sized;
}
