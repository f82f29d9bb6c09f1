//! Maps arbitrary handler failures onto the error taxonomy.

use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use jsonwebtoken::errors::ErrorKind as TokenErrorKind;
use masterymap_core::{AppError, DbFailure, parse_database_error};

/// Substrings that indicate the database could not be reached.
pub const CONNECTIVITY_MARKERS: &[&str] = &[
    "econnrefused",
    "connection refused",
    "connection reset",
    "connection terminated",
    "pool timed out",
    "could not connect",
];

/// Classifies a handler failure, first match wins:
///
/// 1. an [`AppError`] is returned unchanged;
/// 2. request-validation failures (axum rejections, malformed JSON) → 400;
/// 3. token failures → 401;
/// 4. database driver errors via [`parse_database_error`], then connectivity
///    markers in the message → 503;
/// 5. everything else → non-operational internal error.
#[must_use]
pub fn classify_error(error: anyhow::Error) -> AppError {
    let error = match error.downcast::<AppError>() {
        Ok(app) => return app,
        Err(other) => other,
    };

    if let Some(message) = validation_message(&error) {
        return AppError::validation(message)
            .with_context("request")
            .with_boxed_source(error.into());
    }

    if let Some(token_err) = error.downcast_ref::<jsonwebtoken::errors::Error>() {
        let message = match token_err.kind() {
            TokenErrorKind::ExpiredSignature => "Token has expired",
            _ => "Invalid token",
        };
        return AppError::unauthorized(message).with_context("auth:token").with_boxed_source(error.into());
    }

    if let Some(db_err) = error.downcast_ref::<sqlx::Error>() {
        return parse_database_error(&DbFailure::from(db_err), "request");
    }

    let rendered = format!("{error:#}");
    if is_connectivity_failure(&rendered) {
        return AppError::network("Service temporarily unavailable")
            .with_context("database:connection")
            .with_boxed_source(error.into());
    }

    AppError::internal(rendered).with_boxed_source(error.into())
}

fn validation_message(error: &anyhow::Error) -> Option<String> {
    if let Some(rejection) = error.downcast_ref::<JsonRejection>() {
        return Some(rejection.body_text());
    }
    if let Some(rejection) = error.downcast_ref::<QueryRejection>() {
        return Some(rejection.body_text());
    }
    if let Some(rejection) = error.downcast_ref::<PathRejection>() {
        return Some(rejection.body_text());
    }
    if let Some(rejection) = error.downcast_ref::<FormRejection>() {
        return Some(rejection.body_text());
    }
    match error.downcast_ref::<serde_json::Error>() {
        Some(json_err) if !json_err.is_io() => Some(format!("Invalid JSON: {json_err}")),
        _ => None,
    }
}

fn is_connectivity_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECTIVITY_MARKERS.iter().any(|marker| lower.contains(marker))
}
