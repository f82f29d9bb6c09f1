//! HTTP layer for MasteryMap.
//!
//! Error handling is wired around every route: handlers return
//! [`ApiResult`], panics are caught, unmatched routes get a 404, and
//! [`error_middleware`] logs and renders every failure.

#![allow(clippy::exhaustive_structs, reason = "HTTP types are stable")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]

pub mod api_error;
pub mod classify;
pub mod error_log;
mod handlers;
pub mod middleware;
mod response_types;


use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use masterymap_core::AppConfig;
use masterymap_storage::DatabaseProbe;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub use api_error::{ApiError, ApiResult};
pub use classify::classify_error;
pub use error_log::{ErrorLogEntry, ErrorSink, Severity, TracingSink};
pub use middleware::{error_middleware, handle_panic, not_found, render_error};
pub use response_types::{HealthResponse, VersionResponse};

/// Shared application state for all HTTP handlers.
pub struct AppState {
    /// Runtime configuration; the environment decides error verbosity
    pub config: AppConfig,
    /// Where the error middleware reports failures
    pub error_sink: Arc<dyn ErrorSink>,
    /// Database reachability probe, absent when no database is configured
    pub database: Option<Arc<dyn DatabaseProbe>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self { config, error_sink: Arc::new(TracingSink), database: None }
    }

    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    #[must_use]
    pub fn with_database(mut self, probe: Arc<dyn DatabaseProbe>) -> Self {
        self.database = Some(probe);
        self
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/health/db", get(handlers::health::database_health))
        .route("/api/version", get(handlers::health::version))
        .with_state(Arc::clone(&state));
    with_error_handling(routes, state)
}

/// Adds the not-found fallback, the panic adapter and the error middleware.
///
/// Exposed separately so feature routers get identical error handling.
/// Unknown paths and known paths with an unsupported method both get the
/// 404 taxonomy error.
///
/// Extractor rejections only reach the middleware when the handler takes
/// them as a `Result` and propagates with `?`:
///
/// ```ignore
/// async fn create(body: Result<Json<NewProject>, JsonRejection>) -> ApiResult<Json<Project>> {
///     let Json(body) = body?;
///     // ...
/// }
/// ```
///
/// A bare `Json<T>` argument makes axum answer with its own plain-text
/// rejection, which is neither logged nor shaped like an error body.
pub fn with_error_handling(router: Router, state: Arc<AppState>) -> Router {
    router
        .fallback(middleware::not_found)
        .method_not_allowed_fallback(middleware::not_found)
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(axum::middleware::from_fn_with_state(state, middleware::error_middleware))
        .layer(TraceLayer::new_for_http())
}
