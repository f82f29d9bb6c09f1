use axum::Json;
use axum::extract::State;
use masterymap_core::AppError;
use std::sync::Arc;

use crate::AppState;
use crate::api_error::ApiResult;
use crate::response_types::{HealthResponse, VersionResponse};

pub async fn health() -> &'static str {
    "ok"
}

/// Probes the database; 503 when it cannot be reached or is not configured.
pub async fn database_health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let Some(probe) = state.database.as_ref() else {
        return Err(AppError::network("Database is not configured")
            .with_context("health:database")
            .into());
    };
    if probe.is_healthy().await {
        Ok(Json(HealthResponse { status: "ok".to_owned() }))
    } else {
        Err(AppError::network("Database is unreachable").with_context("health:database").into())
    }
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse { version: env!("CARGO_PKG_VERSION").to_owned() })
}
