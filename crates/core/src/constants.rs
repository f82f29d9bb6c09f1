//! Shared constants for MasteryMap.
//!
//! Centralizes tuning values used by more than one crate.

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection pool: idle timeout in seconds.
pub const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;

/// Health check: attempts before reporting the database unreachable.
pub const HEALTH_CHECK_MAX_ATTEMPTS: u32 = 3;

/// Health check: delay before the second attempt, doubled for each later one.
pub const HEALTH_CHECK_BASE_DELAY_MS: u64 = 100;

/// Message shown to clients for non-operational errors outside development.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
