//! Storage driver boundary.
//!
//! # Responsibility
//! - Define the only operations the core needs from a database client:
//!   execute, query rows, query one scalar.
//! - Provide a SQLite implementation and config-driven bootstrap.
//!
//! # Invariants
//! - Drivers honor the cancellation signal at every statement boundary.
//! - A completed write is never reported as `Cancelled`; a cancelled write
//!   left nothing behind.
//! - Drivers own pooling and locking; the core never serializes calls.

use crate::cancel::CancellationSignal;
use crate::error::PersistError;
use crate::model::value::{Row, Value};
use crate::sql::dialect::Dialect;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod sqlite;

pub use open::open_contexts;
pub use sqlite::SqliteDriver;

pub type DriverResult<T> = Result<T, DriverError>;

/// Statement text with its parameter values, ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub text: String,
    pub params: Vec<(String, Value)>,
}

impl BoundStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    Cancelled,
    Failure {
        message: String,
        source_type: String,
    },
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "statement cancelled"),
            Self::Failure {
                message,
                source_type,
            } => write!(f, "{source_type}: {message}"),
        }
    }
}

impl Error for DriverError {}

impl From<DriverError> for PersistError {
    fn from(value: DriverError) -> Self {
        match value {
            DriverError::Cancelled => Self::Cancelled,
            DriverError::Failure {
                message,
                source_type,
            } => Self::Internal {
                message,
                source_type: Some(source_type),
            },
        }
    }
}

/// Database client used by the persistence handlers.
pub trait StorageDriver: Send + Sync {
    /// Dialect the statements for this driver must be generated in.
    fn dialect(&self) -> &'static dyn Dialect;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&self, statement: &BoundStatement, cancel: &CancellationSignal)
        -> DriverResult<u64>;

    /// Runs a query and returns every row keyed by result column name.
    fn query(&self, statement: &BoundStatement, cancel: &CancellationSignal)
        -> DriverResult<Vec<Row>>;

    /// First column of the first row, or `None` when no row matched.
    fn query_single(
        &self,
        statement: &BoundStatement,
        cancel: &CancellationSignal,
    ) -> DriverResult<Option<Value>>;

    /// Runs `statement` then `follow_up` atomically on the same session,
    /// returning the affected row count and the follow-up's scalar.
    fn execute_with_follow_up(
        &self,
        statement: &BoundStatement,
        follow_up: &str,
        cancel: &CancellationSignal,
    ) -> DriverResult<(u64, Option<Value>)>;
}
