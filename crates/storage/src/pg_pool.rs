//! PostgreSQL implementation of the pool traits using sqlx.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::TryStreamExt;
use masterymap_core::{
    AppError, DbFailure, PG_POOL_ACQUIRE_TIMEOUT_SECS, PG_POOL_IDLE_TIMEOUT_SECS,
    PG_POOL_MAX_CONNECTIONS, parse_database_error,
};
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, PgPool, Postgres, Row, TypeInfo};
use uuid::Uuid;

use crate::params::{QueryOutput, SqlValue};
use crate::pool::{ConnectionPool, PooledConnection};

#[derive(Clone, Debug)]
pub struct PgConnectionPool {
    pool: PgPool,
}

impl PgConnectionPool {
    fn options(acquire_timeout: Duration) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
    }

    /// Opens a pool with the shared sizing constants.
    pub async fn open(database_url: &str) -> Result<Self, AppError> {
        let pool = Self::options(Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await
            .map_err(|e| parse_database_error(&DbFailure::from(&e), "pool:open"))?;
        tracing::info!("PgConnectionPool initialized");
        Ok(Self { pool })
    }

    /// Like [`open`](Self::open) but defers connecting to the first acquire,
    /// so an unreachable database surfaces through health checks instead.
    /// Each acquire gives up after `acquire_timeout`.
    pub fn open_lazy(database_url: &str, acquire_timeout: Duration) -> Result<Self, AppError> {
        let pool = Self::options(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| parse_database_error(&DbFailure::from(&e), "pool:open"))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionPool for PgConnectionPool {
    type Connection = PgPooledConnection;

    async fn connect(&self) -> Result<Self::Connection, DbFailure> {
        let conn = self.pool.acquire().await?;
        Ok(PgPooledConnection { conn, in_transaction: false })
    }
}

/// A pooled PostgreSQL connection that tracks whether a transaction is open.
pub struct PgPooledConnection {
    conn: PoolConnection<Postgres>,
    in_transaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Begin,
    End,
}

fn control_statement(sql: &str) -> Option<Control> {
    let head = sql.trim().trim_end_matches(';').trim().to_ascii_uppercase();
    match head.as_str() {
        "BEGIN" | "START TRANSACTION" => Some(Control::Begin),
        "COMMIT" | "END" | "ROLLBACK" | "ABORT" => Some(Control::End),
        _ => None,
    }
}

#[async_trait]
impl PooledConnection for PgPooledConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, DbFailure> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }

        let mut output = QueryOutput::default();
        {
            let mut stream = (&mut *self.conn).fetch_many(query);
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => {
                        output.rows_affected = output.rows_affected.saturating_add(done.rows_affected());
                    },
                    Either::Right(row) => output.rows.push(row_to_json(&row)),
                }
            }
        }

        match control_statement(sql) {
            Some(Control::Begin) => self.in_transaction = true,
            Some(Control::End) => self.in_transaction = false,
            None => {},
        }
        Ok(output)
    }

    fn release(self) {
        if self.in_transaction {
            // Rollback failed; the session state is unknown, so close it.
            tracing::warn!("closing connection released with an open transaction");
            drop(self.conn.detach());
        } else {
            drop(self.conn);
        }
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Json(v) => query.bind(v.clone()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
    }
}

fn row_to_json(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name());
            (column.name().to_owned(), value)
        })
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    fn opt<T>(v: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
        v.map_or(Value::Null, f)
    }

    let decoded: Result<Value, sqlx::Error> = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| opt(v, Value::Bool)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| opt(v, Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| opt(v, Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| opt(v, Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| opt(v, Value::from)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| opt(v, Value::from)),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).map(Option::unwrap_or_default),
        "UUID" => row.try_get::<Option<Uuid>, _>(idx).map(|v| opt(v, |u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map(|v| opt(v, |t| Value::String(t.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|v| opt(v, |t| Value::String(t.to_string()))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map(|v| opt(v, |d| Value::String(d.to_string()))),
        _ => row.try_get::<Option<String>, _>(idx).map(|v| opt(v, Value::String)),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!(column = idx, type_name, error = %e, "undecodable column, returning null");
        Value::Null
    })
}
