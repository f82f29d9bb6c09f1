//! In-memory [`ConnectionPool`] for tests.
//!
//! Records every statement, connect and release, keeps uncommitted writes
//! per connection, and fails statements or connects on demand.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use masterymap_core::DbFailure;
use serde_json::{Map, Value};

use crate::params::{QueryOutput, SqlValue};
use crate::pool::{ConnectionPool, PooledConnection};

#[derive(Debug, Default)]
struct MemoryState {
    executed: Vec<String>,
    committed: Vec<String>,
    connects: usize,
    releases: usize,
    leaked: usize,
    statement_failures: Vec<(String, DbFailure)>,
    connect_failures: Vec<DbFailure>,
}

/// Shared handle; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPool {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement whose text contains `pattern` fails with `failure`.
    pub fn fail_statement(&self, pattern: &str, failure: DbFailure) {
        self.lock().statement_failures.push((pattern.to_owned(), failure));
    }

    /// The next `times` connects fail with `failure`.
    pub fn fail_connects(&self, times: usize, failure: DbFailure) {
        let mut state = self.lock();
        for _ in 0..times {
            state.connect_failures.push(failure.clone());
        }
    }

    /// All statements sent to any connection, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Data statements whose effects are durable.
    #[must_use]
    pub fn committed(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    #[must_use]
    pub fn releases(&self) -> usize {
        self.lock().releases
    }

    /// Connections dropped without being released.
    #[must_use]
    pub fn leaked(&self) -> usize {
        self.lock().leaked
    }
}

#[async_trait]
impl ConnectionPool for MemoryPool {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, DbFailure> {
        let mut state = self.lock();
        if !state.connect_failures.is_empty() {
            return Err(state.connect_failures.remove(0));
        }
        state.connects += 1;
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            in_transaction: false,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    pending: Vec<String>,
    in_transaction: bool,
    released: bool,
}

#[async_trait]
impl PooledConnection for MemoryConnection {
    async fn query(&mut self, sql: &str, _params: &[SqlValue]) -> Result<QueryOutput, DbFailure> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.executed.push(sql.to_owned());
        if let Some((_, failure)) =
            state.statement_failures.iter().find(|(pattern, _)| sql.contains(pattern.as_str()))
        {
            return Err(failure.clone());
        }

        match sql.trim().to_ascii_uppercase().as_str() {
            "BEGIN" => {
                self.in_transaction = true;
                Ok(QueryOutput::default())
            },
            "COMMIT" => {
                state.committed.append(&mut self.pending);
                self.in_transaction = false;
                Ok(QueryOutput::default())
            },
            "ROLLBACK" => {
                self.pending.clear();
                self.in_transaction = false;
                Ok(QueryOutput::default())
            },
            "SELECT 1" => {
                let mut row = Map::new();
                row.insert("?column?".to_owned(), Value::from(1));
                Ok(QueryOutput { rows_affected: 0, rows: vec![row] })
            },
            _ => {
                if self.in_transaction {
                    self.pending.push(sql.to_owned());
                } else {
                    state.committed.push(sql.to_owned());
                }
                Ok(QueryOutput { rows_affected: 1, rows: Vec::new() })
            },
        }
    }

    fn release(mut self) {
        self.released = true;
        self.state.lock().unwrap_or_else(PoisonError::into_inner).releases += 1;
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.released {
            self.state.lock().unwrap_or_else(PoisonError::into_inner).leaked += 1;
        }
    }
}
