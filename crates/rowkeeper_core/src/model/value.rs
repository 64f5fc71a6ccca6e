//! Driver-agnostic column values and result rows.
//!
//! # Responsibility
//! - Carry bound parameters from entities to drivers.
//! - Carry selected rows from drivers back to entity mappers.
//!
//! # Invariants
//! - `Row` cells are keyed by property name, never by raw column name.
//! - Typed getters reject shape mismatches instead of coercing silently.

use crate::error::{PersistError, PersistResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Property-name keyed parameter values for one entity instance.
pub type ValueMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Timestamp(_) => "timestamp",
            Self::Blob(_) => "blob",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Timestamp(value) => write!(f, "{}", value.to_rfc3339()),
            Self::Blob(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One result row keyed by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.cells.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn value(&self, name: &str) -> PersistResult<&Value> {
        self.cells
            .get(name)
            .ok_or_else(|| decode_error(format!("row has no value for `{name}`")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cells.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get_i64(&self, name: &str) -> PersistResult<i64> {
        self.get_opt_i64(name)?
            .ok_or_else(|| decode_error(format!("`{name}` is null")))
    }

    pub fn get_opt_i64(&self, name: &str) -> PersistResult<Option<i64>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(*value)),
            Value::Bool(value) => Ok(Some(i64::from(*value))),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn get_f64(&self, name: &str) -> PersistResult<f64> {
        match self.value(name)? {
            Value::Real(value) => Ok(*value),
            Value::Integer(value) => Ok(*value as f64),
            other => Err(mismatch(name, "real", other)),
        }
    }

    pub fn get_text(&self, name: &str) -> PersistResult<String> {
        self.get_opt_text(name)?
            .ok_or_else(|| decode_error(format!("`{name}` is null")))
    }

    pub fn get_opt_text(&self, name: &str) -> PersistResult<Option<String>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(mismatch(name, "text", other)),
        }
    }

    /// Reads a flag stored either natively or as `0/1`.
    pub fn get_bool(&self, name: &str) -> PersistResult<bool> {
        match self.value(name)? {
            Value::Bool(value) => Ok(*value),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::Integer(other) => Err(decode_error(format!(
                "invalid flag value `{other}` in `{name}`"
            ))),
            other => Err(mismatch(name, "bool", other)),
        }
    }

    /// Reads a timestamp stored natively or as RFC 3339 text.
    pub fn get_opt_timestamp(&self, name: &str) -> PersistResult<Option<DateTime<Utc>>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::Timestamp(value) => Ok(Some(*value)),
            Value::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|parsed| Some(parsed.with_timezone(&Utc)))
                .map_err(|err| {
                    decode_error(format!("invalid timestamp `{text}` in `{name}`: {err}"))
                }),
            other => Err(mismatch(name, "timestamp", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, actual: &Value) -> PersistError {
    decode_error(format!(
        "expected {expected} for `{name}`, found {}",
        actual.kind()
    ))
}

fn decode_error(message: String) -> PersistError {
    PersistError::internal(message, "RowDecode")
}
