//! Database reachability checks with bounded exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use masterymap_core::{AppConfig, HEALTH_CHECK_BASE_DELAY_MS, HEALTH_CHECK_MAX_ATTEMPTS};

use crate::pool::ConnectionPool;
use crate::transaction::execute_query;

/// Retry policy for [`check_database_health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            max_attempts: HEALTH_CHECK_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(HEALTH_CHECK_BASE_DELAY_MS),
        }
    }
}

impl HealthCheckPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.health_check_attempts.max(1),
            base_delay: config.health_check_base_delay,
        }
    }

    /// Delay after the given failed attempt (1-indexed): `base * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

/// Runs `SELECT 1` until it succeeds or the policy's attempts run out.
/// Never fails; the outcome is reported as a boolean.
pub async fn check_database_health<P>(pool: &P, policy: &HealthCheckPolicy) -> bool
where
    P: ConnectionPool + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match execute_query(pool, "SELECT 1", &[], "health_check").await {
            Ok(_) => {
                if attempt > 1 {
                    tracing::info!(attempt, "database reachable after retry");
                }
                return true;
            },
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error_id = %err.error_id(),
                    code = err.code(),
                    causes = ?err.source_chain(),
                    "database health check failed"
                );
                if attempt < max_attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            },
        }
    }
    tracing::error!(max_attempts, "database unreachable");
    false
}

/// Object-safe reachability probe, so HTTP state does not need to be generic
/// over the pool type.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

/// [`DatabaseProbe`] backed by a [`ConnectionPool`] and a retry policy.
#[derive(Debug, Clone)]
pub struct PoolProbe<P> {
    pool: P,
    policy: HealthCheckPolicy,
}

impl<P: ConnectionPool> PoolProbe<P> {
    pub fn new(pool: P, policy: HealthCheckPolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait]
impl<P: ConnectionPool> DatabaseProbe for PoolProbe<P> {
    async fn is_healthy(&self) -> bool {
        check_database_health(&self.pool, &self.policy).await
    }
}
