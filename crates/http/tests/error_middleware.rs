//! End-to-end behavior of the error middleware through a real router.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::{Method, Request, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use masterymap_core::{AppConfig, AppError, DbFailure, Environment};
use masterymap_http::{
    ApiResult, AppState, ErrorLogEntry, ErrorSink, Severity, create_router, with_error_handling,
};
use masterymap_storage::testing::MemoryPool;
use masterymap_storage::{HealthCheckPolicy, PoolProbe};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<ErrorLogEntry>>,
}

impl RecordingSink {
    fn entries(&self) -> Vec<ErrorLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn record(&self, entry: &ErrorLogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn state(environment: Environment, sink: &Arc<RecordingSink>) -> AppState {
    let config = AppConfig { environment, ..AppConfig::default() };
    AppState::new(config).with_error_sink(Arc::clone(sink) as Arc<dyn ErrorSink>)
}

async fn validation_route() -> ApiResult<String> {
    Err(AppError::validation_field("Title is required", "title").into())
}

async fn bug_route() -> ApiResult<String> {
    let parsed: u32 = "not a number".parse().map_err(|e| anyhow::anyhow!("parse failed: {e}"))?;
    Ok(parsed.to_string())
}

async fn panic_route() -> &'static str {
    panic!("roadmap invariant broken")
}

async fn ok_route() -> &'static str {
    "fine"
}

async fn create_project(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    Ok(Json(body))
}

#[derive(Deserialize)]
struct Paging {
    page: u32,
}

async fn list_projects(paging: Result<Query<Paging>, QueryRejection>) -> ApiResult<String> {
    let Query(paging) = paging?;
    Ok(paging.page.to_string())
}

async fn get_project(id: Result<Path<u32>, PathRejection>) -> ApiResult<String> {
    let Path(id) = id?;
    Ok(id.to_string())
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
}

const TOKEN_SECRET: &[u8] = b"masterymap-test-secret";

async fn whoami() -> ApiResult<String> {
    let expired_at = chrono::Utc::now().timestamp() - 3600;
    let claims = Claims { sub: "student-7".to_owned(), exp: u64::try_from(expired_at)? };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TOKEN_SECRET),
    )?;
    let decoded = jsonwebtoken::decode::<Claims>(
        &token,
        &DecodingKey::from_secret(TOKEN_SECRET),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(decoded.claims.sub)
}

fn test_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/validation", get(validation_route))
        .route("/bug", get(bug_route))
        .route("/panic", get(panic_route))
        .route("/ok", get(ok_route))
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/{id}", get(get_project))
        .route("/whoami", get(whoami));
    with_error_handling(routes, Arc::new(state))
}

async fn send(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn operational_error_keeps_its_status_and_message() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Production, &sink)), "/validation").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "Title is required");
    assert!(body["errorId"].as_str().unwrap().starts_with("err_"));
    assert!(body.get("details").is_none());

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Warning);
    assert_eq!(entries[0].path, "/validation");
    assert_eq!(entries[0].error_id, body["errorId"].as_str().unwrap());
}

#[tokio::test]
async fn unexpected_error_is_masked_in_production() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Production, &sink)), "/bug").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "An unexpected error occurred");
    assert!(body.get("details").is_none());

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Critical);
    assert!(entries[0].message.contains("parse failed"));
}

#[tokio::test]
async fn unexpected_error_is_detailed_in_development() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Development, &sink)), "/bug").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().contains("parse failed"));
    assert_eq!(body["details"]["kind"], "internal");
    assert_eq!(body["details"]["operational"], false);
}

#[tokio::test]
async fn unmatched_route_is_not_found() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Production, &sink)), "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "Route GET /nope not found");
    assert_eq!(body["context"], "routing");
    assert_eq!(sink.entries().len(), 1);
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Production, &sink)), "/panic").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "An unexpected error occurred");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Critical);
    assert!(entries[0].message.contains("roadmap invariant broken"));
}

#[tokio::test]
async fn successful_responses_pass_through() {
    let sink = Arc::new(RecordingSink::default());
    let router = test_router(state(Environment::Production, &sink));
    let response = router
        .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"fine");
    assert!(sink.entries().is_empty());
}

fn quick_policy() -> HealthCheckPolicy {
    HealthCheckPolicy { max_attempts: 2, base_delay: Duration::from_millis(1) }
}

#[tokio::test]
async fn database_health_reports_ok_when_reachable() {
    let sink = Arc::new(RecordingSink::default());
    let probe = PoolProbe::new(MemoryPool::new(), quick_policy());
    let app = state(Environment::Production, &sink).with_database(Arc::new(probe));
    let (status, body) = send(create_router(Arc::new(app)), "/api/health/db").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn database_health_reports_unavailable_when_unreachable() {
    let sink = Arc::new(RecordingSink::default());
    let pool = MemoryPool::new();
    pool.fail_connects(2, DbFailure::new("connection refused").connectivity());
    let probe = PoolProbe::new(pool.clone(), quick_policy());
    let app = state(Environment::Production, &sink).with_database(Arc::new(probe));
    let (status, body) = send(create_router(Arc::new(app)), "/api/health/db").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "NETWORK_ERROR");
    assert_eq!(body["context"], "health:database");
    assert_eq!(pool.connects(), 0);
    assert_eq!(sink.entries()[0].severity, Severity::Error);
}

#[tokio::test]
async fn plain_health_and_version_routes() {
    let sink = Arc::new(RecordingSink::default());
    let router = create_router(Arc::new(state(Environment::Test, &sink)));
    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = send(router, "/api/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

async fn send_request(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn wrong_method_on_known_path_is_not_found() {
    let sink = Arc::new(RecordingSink::default());
    let router = create_router(Arc::new(state(Environment::Production, &sink)));
    let request = Request::builder().method(Method::POST).uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send_request(router, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["message"], "Route POST /health not found");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].method, "POST");
}

#[tokio::test]
async fn malformed_json_body_is_a_validation_error() {
    let sink = Arc::new(RecordingSink::default());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/projects")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let (status, body) = send_request(test_router(state(Environment::Production, &sink)), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["context"], "request");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Warning);
}

#[tokio::test]
async fn missing_content_type_is_a_validation_error() {
    let sink = Arc::new(RecordingSink::default());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/projects")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send_request(test_router(state(Environment::Production, &sink)), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn bad_query_and_path_parameters_are_validation_errors() {
    let sink = Arc::new(RecordingSink::default());
    let router = test_router(state(Environment::Production, &sink));

    let (status, body) = send(router.clone(), "/projects?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(router, "/projects/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    assert!(sink.entries().iter().all(|e| e.severity == Severity::Warning));
}

#[tokio::test]
async fn valid_json_body_passes_through() {
    let sink = Arc::new(RecordingSink::default());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/projects")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\":\"Roadmap\"}"))
        .unwrap();
    let (status, body) = send_request(test_router(state(Environment::Production, &sink)), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Roadmap");
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn expired_token_is_an_authentication_error() {
    let sink = Arc::new(RecordingSink::default());
    let (status, body) = send(test_router(state(Environment::Production, &sink)), "/whoami").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_ERROR");
    assert_eq!(body["message"], "Token has expired");
    assert_eq!(body["context"], "auth:token");
    assert_eq!(sink.entries()[0].severity, Severity::Warning);
}
