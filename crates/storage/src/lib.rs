//! Storage layer for MasteryMap
//!
//! Scoped transactions over pooled connections: every unit of work either
//! commits or rolls back, and every acquired connection is released exactly
//! once. PostgreSQL access goes through sqlx.

mod health;
mod params;
mod pg_pool;
mod pool;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transaction;


pub use health::{DatabaseProbe, HealthCheckPolicy, PoolProbe, check_database_health};
pub use params::{QueryOutput, SqlValue, Statement};
pub use pg_pool::{PgConnectionPool, PgPooledConnection};
pub use pool::{ConnectionPool, PooledConnection};
pub use transaction::{
    Transaction, TransactionState, TransactionStateError, batch_operation, execute_query,
    with_transaction,
};
