//! Error taxonomy shared by every MasteryMap crate.
//!
//! Each failure is classified into one [`ErrorKind`] variant, which fixes its
//! HTTP status and machine code. [`AppError`] adds the metadata needed to log
//! and render the failure consistently: message, context, correlation id,
//! timestamp and the operational flag.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::constants::GENERIC_INTERNAL_MESSAGE;

/// Closed set of failure kinds, each with its kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input was rejected.
    Validation { field: Option<String> },
    /// Missing or invalid credentials.
    Unauthorized,
    /// Authenticated but not allowed.
    Forbidden,
    /// Requested resource does not exist.
    NotFound { resource: Option<String> },
    /// Resource already exists or a concurrent write won.
    Conflict,
    /// Too many requests; optional hint for the client.
    RateLimited { retry_after_secs: Option<u64> },
    /// Unexpected failure with no better classification.
    Internal,
    /// Database failure that is not a known constraint or connectivity issue.
    Database { sqlstate: Option<String> },
    /// AI provider call failed.
    AiService { provider_status: Option<u16> },
    /// Upstream dependency unreachable.
    Network,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict => 409,
            Self::RateLimited { .. } => 429,
            Self::Internal | Self::Database { .. } | Self::AiService { .. } => 500,
            Self::Network => 503,
        }
    }

    /// Machine-readable code rendered in the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized => "AUTHENTICATION_ERROR",
            Self::Forbidden => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::Internal => "INTERNAL_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::AiService { .. } => "AI_SERVICE_ERROR",
            Self::Network => "NETWORK_ERROR",
        }
    }

    /// Short snake_case name, used in logs and development details.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal => "internal",
            Self::Database { .. } => "database",
            Self::AiService { .. } => "ai_service",
            Self::Network => "network",
        }
    }

    /// Whether failures of this kind are anticipated by default.
    #[must_use]
    pub const fn is_operational_by_default(&self) -> bool {
        !matches!(self, Self::Internal | Self::Database { .. })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified failure.
///
/// Cheap to clone: the optional source is reference counted. Construction
/// never fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    context: Option<String>,
    error_id: String,
    timestamp: DateTime<Utc>,
    operational: bool,
    details: Option<Value>,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

/// JSON body sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let operational = kind.is_operational_by_default();
        Self {
            kind,
            message: message.into(),
            context: None,
            error_id: generate_error_id(),
            timestamp: Utc::now(),
            operational,
            details: None,
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation { field: None }, message)
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation { field: Some(field.into()) }, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// `"<resource> not found"` with the resource kept in the payload.
    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let message = format!("{resource} not found");
        Self::new(ErrorKind::NotFound { resource: Some(resource) }, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::new(ErrorKind::RateLimited { retry_after_secs }, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn database(message: impl Into<String>, sqlstate: Option<String>) -> Self {
        Self::new(ErrorKind::Database { sqlstate }, message)
    }

    pub fn ai_service(message: impl Into<String>, provider_status: Option<u16>) -> Self {
        Self::new(ErrorKind::AiService { provider_status }, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the context only when none has been attached yet.
    #[must_use]
    pub fn with_context_if_absent(mut self, context: impl Into<String>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn with_boxed_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(Arc::from(source));
        self
    }

    /// Marks the failure as an unexpected bug.
    #[must_use]
    pub fn non_operational(mut self) -> Self {
        self.operational = false;
        self
    }

    #[must_use]
    pub fn operational(mut self) -> Self {
        self.operational = true;
        self
    }

    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    #[must_use]
    pub fn error_id(&self) -> &str {
        &self.error_id
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.operational
    }

    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Display strings of the source chain, outermost first.
    #[must_use]
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn StdError + 'static)> =
            self.source.as_deref().map(|s| s as &(dyn StdError + 'static));
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// Serializes the error for a client.
    ///
    /// Outside development, `details` is dropped and non-operational errors
    /// get a generic message.
    #[must_use]
    pub fn to_body(&self, development: bool) -> ErrorBody {
        let message = if development || self.operational {
            self.message.clone()
        } else {
            GENERIC_INTERNAL_MESSAGE.to_owned()
        };
        let details = development.then(|| {
            let mut debug = serde_json::json!({
                "kind": self.kind.name(),
                "operational": self.operational,
                "causes": self.source_chain(),
            });
            if let (Some(extra), Some(map)) = (&self.details, debug.as_object_mut()) {
                map.insert("data".to_owned(), extra.clone());
            }
            debug
        });
        ErrorBody {
            code: self.code().to_owned(),
            message,
            timestamp: self.timestamp,
            error_id: self.error_id.clone(),
            context: self.context.clone(),
            details,
        }
    }
}

/// Correlation id: `err_<unix millis>_<9 random hex chars>`.
#[must_use]
pub fn generate_error_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("err_{}_{suffix}", Utc::now().timestamp_millis())
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => {
                let message = err.to_string();
                Self::internal(message).with_boxed_source(err.into())
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization failed: {err}")).with_source(err)
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::internal(format!("I/O failure: {err}")).with_source(err)
    }
}
