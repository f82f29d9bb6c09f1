//! Injected error logging for the error middleware.
//!
//! The middleware never calls `tracing` directly; it hands an
//! [`ErrorLogEntry`] to the [`ErrorSink`] stored in the application state.

use chrono::{DateTime, Utc};
use masterymap_core::AppError;
use serde::Serialize;

/// How loudly an error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Operational client error (4xx).
    Warning,
    /// Operational server-side failure (5xx).
    Error,
    /// Non-operational: an unexpected bug.
    Critical,
}

impl Severity {
    #[must_use]
    pub fn for_error(error: &AppError) -> Self {
        if !error.is_operational() {
            Self::Critical
        } else if error.status() >= 500 {
            Self::Error
        } else {
            Self::Warning
        }
    }
}

/// One structured log record per failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    pub severity: Severity,
    pub error_id: String,
    pub code: &'static str,
    pub status: u16,
    pub message: String,
    pub context: Option<String>,
    pub method: String,
    pub path: String,
    pub operational: bool,
    pub causes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorLogEntry {
    #[must_use]
    pub fn new(error: &AppError, method: &str, path: &str) -> Self {
        Self {
            severity: Severity::for_error(error),
            error_id: error.error_id().to_owned(),
            code: error.code(),
            status: error.status(),
            message: error.message().to_owned(),
            context: error.context().map(str::to_owned),
            method: method.to_owned(),
            path: path.to_owned(),
            operational: error.is_operational(),
            causes: error.source_chain(),
            timestamp: error.timestamp(),
        }
    }
}

/// Destination for error log entries.
pub trait ErrorSink: Send + Sync {
    fn record(&self, entry: &ErrorLogEntry);
}

/// Default sink: emits `tracing` events. `Critical` entries are error-level
/// events tagged `severity = "critical"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn record(&self, entry: &ErrorLogEntry) {
        let context = entry.context.as_deref().unwrap_or("-");
        match entry.severity {
            Severity::Warning => tracing::warn!(
                error_id = %entry.error_id,
                code = entry.code,
                status = entry.status,
                method = %entry.method,
                path = %entry.path,
                context,
                "{}",
                entry.message
            ),
            Severity::Error => tracing::error!(
                error_id = %entry.error_id,
                code = entry.code,
                status = entry.status,
                method = %entry.method,
                path = %entry.path,
                context,
                causes = ?entry.causes,
                "{}",
                entry.message
            ),
            Severity::Critical => tracing::error!(
                severity = "critical",
                error_id = %entry.error_id,
                code = entry.code,
                status = entry.status,
                method = %entry.method,
                path = %entry.path,
                context,
                causes = ?entry.causes,
                "unexpected error: {}",
                entry.message
            ),
        }
    }
}
