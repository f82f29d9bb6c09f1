//! Classification of AI provider failures.

use crate::error::AppError;

/// Provider-agnostic view of a failed AI call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderFailure {
    /// HTTP status returned by the provider, if a response arrived.
    pub status: Option<u16>,
    pub message: String,
    pub timed_out: bool,
    /// Connection could not be established.
    pub unreachable: bool,
}

impl ProviderFailure {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self { status: Some(status), message: message.into(), ..Self::default() }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "provider returned {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderFailure {}

/// Maps a provider failure onto the taxonomy.
///
/// Rate limits surface as 429 so clients can back off; transport failures
/// surface as network errors; everything else is an AI-service error.
#[must_use]
pub fn parse_ai_service_error(failure: &ProviderFailure, context: &str) -> AppError {
    let error = match failure.status {
        Some(429) => AppError::rate_limited("AI service rate limit exceeded", None),
        Some(401 | 403) => AppError::ai_service("AI service authentication failed", failure.status),
        _ if failure.timed_out || failure.unreachable => {
            AppError::network("AI service is unreachable")
        },
        Some(status) => AppError::ai_service(
            format!("AI service request failed with status {status}"),
            Some(status),
        ),
        None => AppError::ai_service(format!("AI service error: {}", failure.message), None),
    };
    error.with_context(context).with_source(failure.clone())
}

#[cfg(feature = "ai-client")]
impl From<&reqwest::Error> for ProviderFailure {
    fn from(err: &reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            timed_out: err.is_timeout(),
            unreachable: err.is_connect(),
        }
    }
}
