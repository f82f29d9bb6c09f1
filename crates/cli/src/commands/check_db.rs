use anyhow::{Result, bail};
use masterymap_core::AppConfig;
use masterymap_storage::{HealthCheckPolicy, PgConnectionPool, check_database_health};

pub(crate) async fn run(config: &AppConfig) -> Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL environment variable must be set");
    };
    let pool = PgConnectionPool::open_lazy(url, config.db_acquire_timeout)?;
    let policy = HealthCheckPolicy::from_config(config);

    let healthy = check_database_health(&pool, &policy).await;
    println!(
        "{}",
        serde_json::json!({
            "status": if healthy { "ok" } else { "unavailable" },
            "attempts": policy.max_attempts,
        })
    );
    if !healthy {
        bail!("database unreachable after {} attempts", policy.max_attempts);
    }
    Ok(())
}
