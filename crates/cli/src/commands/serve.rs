use std::sync::Arc;

use anyhow::Result;
use masterymap_core::AppConfig;
use masterymap_http::{AppState, create_router};
use masterymap_storage::{HealthCheckPolicy, PgConnectionPool, PoolProbe};

pub(crate) async fn run(config: AppConfig) -> Result<()> {
    let mut state = AppState::new(config.clone());

    if let Some(url) = config.database_url.as_deref() {
        let pool = PgConnectionPool::open_lazy(url, config.db_acquire_timeout)?;
        let policy = HealthCheckPolicy::from_config(&config);
        state = state.with_database(Arc::new(PoolProbe::new(pool, policy)));
    } else {
        tracing::warn!("DATABASE_URL not set, database health checks will report unavailable");
    }

    let router = create_router(Arc::new(state));
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(environment = %config.environment, "Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
