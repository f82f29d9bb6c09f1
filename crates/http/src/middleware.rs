//! Global error handling: the only place a failure becomes a client response.

use std::any::Any;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use masterymap_core::{AppError, Environment, ErrorKind};

use crate::AppState;
use crate::api_error::{ApiError, status_of};
use crate::error_log::ErrorLogEntry;

/// Logs and re-renders every response that carries an [`AppError`].
///
/// Responses without one pass through untouched.
pub async fn error_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let mut response = next.run(request).await;
    let Some(error) = response.extensions_mut().remove::<AppError>() else {
        return response;
    };

    state.error_sink.record(&ErrorLogEntry::new(&error, method.as_str(), &path));
    render_error(&error, state.config.environment)
}

/// JSON error response for the given environment.
#[must_use]
pub fn render_error(error: &AppError, environment: Environment) -> Response {
    (status_of(error), Json(error.to_body(environment.is_development()))).into_response()
}

/// Fallback for unmatched routes, including a known path with the wrong method.
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    AppError::new(
        ErrorKind::NotFound { resource: None },
        format!("Route {method} {} not found", uri.path()),
    )
    .with_context("routing")
    .into()
}

/// Converts a handler panic into a non-operational internal error, so it is
/// reported like any other unexpected failure instead of killing the task.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };
    ApiError::from(AppError::internal(format!("handler panicked: {detail}"))).into_response()
}
