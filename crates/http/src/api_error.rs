//! Typed API error for HTTP handlers.
//!
//! Handlers return `Result<T, ApiError>`. Any error converts with `?`: it is
//! classified into the taxonomy on the way in, and the resulting [`AppError`]
//! rides along in the response extensions so the error middleware can log
//! it and render the final body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use masterymap_core::AppError;

use crate::classify::classify_error;

/// Handler-side error adapter.
///
/// Deliberately not `std::error::Error`, so the blanket `From` below can
/// accept every error type, [`AppError`] included.
#[derive(Debug, Clone)]
pub struct ApiError(AppError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub fn app_error(&self) -> &AppError {
        &self.0
    }

    #[must_use]
    pub fn into_app_error(self) -> AppError {
        self.0
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(classify_error(err.into()))
    }
}

/// Status code for an [`AppError`]; unknown codes degrade to 500.
pub(crate) fn status_of(error: &AppError) -> StatusCode {
    StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Production-safe body in case no middleware re-renders it.
        let mut response = (status_of(&self.0), Json(self.0.to_body(false))).into_response();
        response.extensions_mut().insert(self.0);
        response
    }
}
