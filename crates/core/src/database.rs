//! Classification of raw database driver failures into the error taxonomy.
//!
//! SQLSTATE codes decide whenever the driver reports one. Matching on the
//! message text is only a fallback for failures that carry no code.

use crate::error::AppError;

/// SQLSTATE 23505.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE 23503.
pub const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE 23502.
pub const SQLSTATE_NOT_NULL_VIOLATION: &str = "23502";
/// SQLSTATE 23514.
pub const SQLSTATE_CHECK_VIOLATION: &str = "23514";
/// SQLSTATE 40001.
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE 40P01.
pub const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Driver-agnostic view of a database failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbFailure {
    /// SQLSTATE reported by the server, if any.
    pub code: Option<String>,
    pub message: String,
    /// Failure happened below SQL: I/O, TLS, pool exhaustion.
    pub connectivity: bool,
}

impl DbFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into(), connectivity: false }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn connectivity(mut self) -> Self {
        self.connectivity = true;
        self
    }
}

impl std::fmt::Display for DbFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (SQLSTATE {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DbFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbClass {
    Conflict,
    Reference,
    Connectivity,
    Other,
}

fn class_from_sqlstate(code: &str) -> Option<DbClass> {
    match code {
        SQLSTATE_UNIQUE_VIOLATION | SQLSTATE_SERIALIZATION_FAILURE | SQLSTATE_DEADLOCK_DETECTED => {
            Some(DbClass::Conflict)
        },
        SQLSTATE_FOREIGN_KEY_VIOLATION | SQLSTATE_NOT_NULL_VIOLATION | SQLSTATE_CHECK_VIOLATION => {
            Some(DbClass::Reference)
        },
        "57P01" | "57P02" | "57P03" => Some(DbClass::Connectivity),
        c if c.starts_with("08") => Some(DbClass::Connectivity),
        _ => None,
    }
}

fn class_from_message(message: &str) -> DbClass {
    let lower = message.to_lowercase();
    if lower.contains("duplicate key") {
        DbClass::Conflict
    } else if lower.contains("foreign key constraint") {
        DbClass::Reference
    } else if lower.contains("connection") {
        DbClass::Connectivity
    } else {
        DbClass::Other
    }
}

/// Classifies a driver failure.
///
/// | signal | kind |
/// |---|---|
/// | 23505, 40001, 40P01 / "duplicate key" | conflict (409) |
/// | 23503, 23502, 23514 / "foreign key constraint" | validation (400) |
/// | class 08, 57P0x, connectivity flag / "connection" | network (503) |
/// | anything else | database (500) |
///
/// Message text is consulted only when `failure.code` is `None`.
#[must_use]
pub fn parse_database_error(failure: &DbFailure, context: &str) -> AppError {
    let class = match failure.code.as_deref() {
        Some(code) => class_from_sqlstate(code).unwrap_or(if failure.connectivity {
            DbClass::Connectivity
        } else {
            DbClass::Other
        }),
        None if failure.connectivity => DbClass::Connectivity,
        None => class_from_message(&failure.message),
    };

    let error = match class {
        DbClass::Conflict => AppError::conflict("Resource already exists or was modified concurrently"),
        DbClass::Reference => AppError::validation("Invalid reference to related resource"),
        DbClass::Connectivity => AppError::network("Database connection failed"),
        DbClass::Other => AppError::database("Database operation failed", failure.code.clone()),
    };

    let error = match (&failure.code, class) {
        (Some(code), DbClass::Conflict | DbClass::Reference | DbClass::Connectivity) => {
            error.with_details(serde_json::json!({ "sqlstate": code }))
        },
        _ => error,
    };

    error.with_context(context).with_source(failure.clone())
}

#[cfg(feature = "sqlx-types")]
impl From<&sqlx::Error> for DbFailure {
    fn from(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self {
                code: db_err.code().map(|c| c.into_owned()),
                message: db_err.message().to_owned(),
                connectivity: false,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::new(err.to_string()).connectivity(),
            _ => Self::new(err.to_string()),
        }
    }
}

#[cfg(feature = "sqlx-types")]
impl From<sqlx::Error> for DbFailure {
    fn from(err: sqlx::Error) -> Self {
        Self::from(&err)
    }
}
