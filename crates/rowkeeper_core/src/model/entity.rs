//! Entity and key contracts implemented by mapped types.
//!
//! # Responsibility
//! - Describe how a plain data type maps to a table.
//! - Move values between entity instances and driver rows.
//!
//! # Invariants
//! - `write_values` never needs to include the primary key; handlers bind
//!   it from `key()`.
//! - Audit fields are read and written by the core, not by `from_row` or
//!   `write_values`.

use crate::audit::AuditFields;
use crate::error::PersistResult;
use crate::model::descriptor::DescriptorBuilder;
use crate::model::value::{Row, Value, ValueMap};
use std::fmt::{Debug, Display};
use uuid::Uuid;

/// Default identifier type for integer-keyed entities.
pub type IntId = i64;

/// Primary-key value type.
pub trait EntityKey: Clone + Debug + Display + Send + Sync + 'static {
    fn to_value(&self) -> Value;
    fn from_value(value: &Value) -> Option<Self>;
}

impl EntityKey for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(value) => Some(*value),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl EntityKey for i32 {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(value) => i32::try_from(*value).ok(),
            Value::Text(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl EntityKey for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(text) => Some(text.clone()),
            Value::Integer(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

impl EntityKey for Uuid {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(text) => Uuid::parse_str(text).ok(),
            _ => None,
        }
    }
}

/// A plain data-holding type mapped to exactly one table.
pub trait Entity: Clone + Send + Sync + 'static {
    type Id: EntityKey;

    /// Declares table, columns, keys, capabilities and owning contexts.
    fn describe() -> DescriptorBuilder;

    /// Current key, or `None` when the database has not assigned one yet.
    fn key(&self) -> Option<Self::Id>;

    fn set_key(&mut self, key: Self::Id);

    /// Writes every non-key, non-audit property under its property name.
    fn write_values(&self, values: &mut ValueMap);

    /// Builds an instance from a row keyed by property name.
    fn from_row(row: &Row) -> PersistResult<Self>;

    fn audit(&self) -> Option<&AuditFields> {
        None
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        None
    }
}
