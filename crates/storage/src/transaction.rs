//! Scoped transactions over pooled connections.
//!
//! [`with_transaction`] acquires a connection, issues `BEGIN`, runs the
//! caller's unit of work and then commits or rolls back. The connection is
//! released exactly once on every exit path.

use futures_util::future::BoxFuture;
use masterymap_core::{AppError, DbFailure, parse_database_error};
use thiserror::Error;

use crate::params::{QueryOutput, SqlValue, Statement};
use crate::pool::{ConnectionPool, PooledConnection};

/// Lifecycle of a [`Transaction`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Use of a handle whose transaction has already ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionStateError {
    #[error("transaction already committed")]
    AlreadyCommitted,
    #[error("transaction already rolled back")]
    AlreadyRolledBack,
}

impl From<TransactionStateError> for AppError {
    fn from(err: TransactionStateError) -> Self {
        Self::internal(err.to_string())
            .non_operational()
            .with_context("transaction")
            .with_source(err)
    }
}

/// Handle to an open transaction.
///
/// Queries, commit and rollback are only accepted while the transaction is
/// [`TransactionState::Active`]; afterwards they fail without touching the
/// connection.
pub struct Transaction<C: PooledConnection> {
    conn: C,
    state: TransactionState,
}

impl<C: PooledConnection> Transaction<C> {
    /// Issues `BEGIN`. On failure the connection is handed back so the caller
    /// can release it.
    pub(crate) async fn begin(mut conn: C) -> Result<Self, (C, DbFailure)> {
        match conn.query("BEGIN", &[]).await {
            Ok(_) => Ok(Self { conn, state: TransactionState::Active }),
            Err(failure) => Err((conn, failure)),
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn ensure_active(&self) -> Result<(), TransactionStateError> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(TransactionStateError::AlreadyCommitted),
            TransactionState::RolledBack => Err(TransactionStateError::AlreadyRolledBack),
        }
    }

    pub async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, AppError> {
        self.ensure_active()?;
        self.conn
            .query(sql, params)
            .await
            .map_err(|failure| parse_database_error(&failure, "transaction:query"))
    }

    /// Commits. A failed `COMMIT` leaves the handle active so it can still be
    /// rolled back.
    pub async fn commit(&mut self) -> Result<(), AppError> {
        self.ensure_active()?;
        self.conn
            .query("COMMIT", &[])
            .await
            .map_err(|failure| parse_database_error(&failure, "transaction:commit"))?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), AppError> {
        self.ensure_active()?;
        self.conn
            .query("ROLLBACK", &[])
            .await
            .map_err(|failure| parse_database_error(&failure, "transaction:rollback"))?;
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    fn into_connection(self) -> C {
        self.conn
    }
}

/// Runs `operation` inside a transaction.
///
/// - success: `COMMIT` (unless the operation already ended the transaction);
/// - failure of the operation or of `COMMIT`: `ROLLBACK`, then the original
///   error is returned. A failing rollback is logged and never replaces it.
///
/// ```ignore
/// let id = with_transaction(&pool, |tx| Box::pin(async move {
///     tx.query("INSERT INTO portfolios (student_id) VALUES ($1)", &[student.into()]).await?;
///     Ok(student)
/// })).await?;
/// ```
pub async fn with_transaction<P, T, F>(pool: &P, operation: F) -> Result<T, AppError>
where
    P: ConnectionPool + ?Sized,
    F: for<'t> FnOnce(&'t mut Transaction<P::Connection>) -> BoxFuture<'t, Result<T, AppError>>
        + Send,
    T: Send,
{
    let conn = pool
        .connect()
        .await
        .map_err(|failure| parse_database_error(&failure, "transaction:connect"))?;

    let mut tx = match Transaction::begin(conn).await {
        Ok(tx) => tx,
        Err((conn, failure)) => {
            conn.release();
            return Err(parse_database_error(&failure, "transaction:begin"));
        },
    };

    let outcome = match operation(&mut tx).await {
        Ok(value) if tx.state() == TransactionState::Active => {
            tx.commit().await.map(|()| value)
        },
        Ok(value) => Ok(value),
        Err(err) => Err(err.with_context_if_absent("transaction")),
    };

    if let Err(err) = &outcome
        && tx.state() == TransactionState::Active
        && let Err(rollback_err) = tx.rollback().await
    {
        tracing::error!(
            error_id = %err.error_id(),
            rollback_error_id = %rollback_err.error_id(),
            error = %err,
            rollback_error = ?rollback_err.source_chain(),
            "transaction rollback failed"
        );
    }

    tx.into_connection().release();
    outcome
}

/// Runs `statements` in order inside one transaction.
///
/// If statement K (1-indexed) fails, no later statement runs, the whole batch
/// rolls back and the error carries `batch:step_K` as context and
/// `{"failedStep": K, "totalSteps": N}` as details.
pub async fn batch_operation<P>(pool: &P, statements: &[Statement]) -> Result<Vec<QueryOutput>, AppError>
where
    P: ConnectionPool + ?Sized,
{
    let statements = statements.to_vec();
    let total = statements.len();
    with_transaction(pool, move |tx| {
        Box::pin(async move {
            let mut outputs = Vec::with_capacity(total);
            for (index, statement) in statements.iter().enumerate() {
                let step = index + 1;
                let output = tx
                    .query(&statement.sql, &statement.params)
                    .await
                    .map_err(|err| batch_step_error(err, step, total))?;
                outputs.push(output);
            }
            Ok(outputs)
        })
    })
    .await
}

fn batch_step_error(err: AppError, step: usize, total: usize) -> AppError {
    let wrapped = AppError::new(
        err.kind().clone(),
        format!("Batch operation failed at step {step}: {}", err.message()),
    )
    .with_context(format!("batch:step_{step}"))
    .with_details(serde_json::json!({ "failedStep": step, "totalSteps": total }));
    let wrapped = if err.is_operational() { wrapped } else { wrapped.non_operational() };
    wrapped.with_source(err)
}

/// Runs a single statement outside any explicit transaction.
pub async fn execute_query<P>(
    pool: &P,
    sql: &str,
    params: &[SqlValue],
    context: &str,
) -> Result<QueryOutput, AppError>
where
    P: ConnectionPool + ?Sized,
{
    let mut conn = pool.connect().await.map_err(|failure| parse_database_error(&failure, context))?;
    let result = conn.query(sql, params).await;
    conn.release();
    result.map_err(|failure| parse_database_error(&failure, context))
}
