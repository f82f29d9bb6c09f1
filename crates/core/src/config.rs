//! Runtime configuration loaded from the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, HEALTH_CHECK_BASE_DELAY_MS, HEALTH_CHECK_MAX_ATTEMPTS,
    PG_POOL_ACQUIRE_TIMEOUT_SECS,
};
use crate::env_config::parse_with_default;

/// Deployment environment. Only `Development` exposes error internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
    Test,
}

impl Environment {
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown environment: {0}")]
pub struct UnknownEnvironment(String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(UnknownEnvironment(other.to_owned())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment variable names read by [`AppConfig::from_env`].
pub const ENV_ENVIRONMENT: &str = "MASTERYMAP_ENV";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_HOST: &str = "MASTERYMAP_HOST";
pub const ENV_PORT: &str = "MASTERYMAP_PORT";
pub const ENV_HEALTH_ATTEMPTS: &str = "MASTERYMAP_HEALTH_ATTEMPTS";
pub const ENV_HEALTH_BASE_DELAY_MS: &str = "MASTERYMAP_HEALTH_BASE_DELAY_MS";
pub const ENV_DB_ACQUIRE_TIMEOUT_MS: &str = "MASTERYMAP_DB_ACQUIRE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub health_check_attempts: u32,
    pub health_check_base_delay: Duration,
    /// How long a pool waits for a connection before giving up.
    pub db_acquire_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            database_url: None,
            host: DEFAULT_HTTP_HOST.to_owned(),
            port: DEFAULT_HTTP_PORT,
            health_check_attempts: HEALTH_CHECK_MAX_ATTEMPTS,
            health_check_base_delay: Duration::from_millis(HEALTH_CHECK_BASE_DELAY_MS),
            db_acquire_timeout: Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let delay_ms = parse_with_default(
            ENV_HEALTH_BASE_DELAY_MS,
            lookup(ENV_HEALTH_BASE_DELAY_MS),
            HEALTH_CHECK_BASE_DELAY_MS,
        );
        let acquire_ms = parse_with_default(
            ENV_DB_ACQUIRE_TIMEOUT_MS,
            lookup(ENV_DB_ACQUIRE_TIMEOUT_MS),
            PG_POOL_ACQUIRE_TIMEOUT_SECS * 1000,
        );
        Self {
            environment: parse_with_default(
                ENV_ENVIRONMENT,
                lookup(ENV_ENVIRONMENT),
                defaults.environment,
            ),
            database_url: lookup(ENV_DATABASE_URL).filter(|url| !url.trim().is_empty()),
            host: lookup(ENV_HOST).filter(|h| !h.trim().is_empty()).unwrap_or(defaults.host),
            port: parse_with_default(ENV_PORT, lookup(ENV_PORT), defaults.port),
            health_check_attempts: parse_with_default(
                ENV_HEALTH_ATTEMPTS,
                lookup(ENV_HEALTH_ATTEMPTS),
                defaults.health_check_attempts,
            )
            .max(1),
            health_check_base_delay: Duration::from_millis(delay_ms),
            db_acquire_timeout: Duration::from_millis(acquire_ms.max(1)),
        }
    }
}
