#![allow(dead_code)]

use rowkeeper_core::{
    AuditFields, ColumnSpec, DescriptorBuilder, Entity, EntityDescriptor, IntId,
    PersistenceHandlers, PersistResult, Row, SingleContextResolver, SqliteDriver, ValueMap,
};
use std::sync::Arc;

pub const USERS_SCHEMA: &str = "
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    EmailAddress TEXT,
    CreatedAt TEXT,
    CreatedBy TEXT,
    LastModifiedAt TEXT,
    LastModifiedBy TEXT,
    IsDeleted INTEGER NOT NULL DEFAULT 0,
    DeletedAt TEXT,
    DeletedBy TEXT
);";

pub const TAGS_SCHEMA: &str = "
CREATE TABLE tags (
    code TEXT PRIMARY KEY,
    label TEXT NOT NULL
);";

/// Audited, soft-deletable entity with a database-assigned key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: IntId,
    pub name: String,
    pub email: Option<String>,
    pub audit: AuditFields,
}

impl User {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: Some(email.to_string()),
            ..Self::default()
        }
    }
}

impl Entity for User {
    type Id = IntId;

    fn describe() -> DescriptorBuilder {
        EntityDescriptor::builder("users")
            .column(ColumnSpec::new("id").identity())
            .column(ColumnSpec::new("name"))
            .column(ColumnSpec::new("email").column_name("EmailAddress"))
            .audited()
            .soft_delete()
            .context("main")
    }

    fn key(&self) -> Option<IntId> {
        (self.id > 0).then_some(self.id)
    }

    fn set_key(&mut self, key: IntId) {
        self.id = key;
    }

    fn write_values(&self, values: &mut ValueMap) {
        values.insert("name".to_string(), self.name.clone().into());
        values.insert("email".to_string(), self.email.clone().into());
    }

    fn from_row(row: &Row) -> PersistResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_text("name")?,
            email: row.get_opt_text("email")?,
            audit: AuditFields::default(),
        })
    }

    fn audit(&self) -> Option<&AuditFields> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut AuditFields> {
        Some(&mut self.audit)
    }
}

/// Plain entity with a caller-assigned text key.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub code: String,
    pub label: String,
}

impl Tag {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

impl Entity for Tag {
    type Id = String;

    fn describe() -> DescriptorBuilder {
        EntityDescriptor::builder("tags")
            .column(ColumnSpec::new("code").primary_key())
            .column(ColumnSpec::new("label"))
            .context("catalog")
            .context("main")
    }

    fn key(&self) -> Option<String> {
        (!self.code.is_empty()).then(|| self.code.clone())
    }

    fn set_key(&mut self, key: String) {
        self.code = key;
    }

    fn write_values(&self, values: &mut ValueMap) {
        values.insert("label".to_string(), self.label.clone().into());
    }

    fn from_row(row: &Row) -> PersistResult<Self> {
        Ok(Self {
            code: row.get_text("code")?,
            label: row.get_text("label")?,
        })
    }
}

pub fn memory_driver() -> Arc<SqliteDriver> {
    let driver = SqliteDriver::open_in_memory().unwrap();
    driver.execute_batch(USERS_SCHEMA).unwrap();
    driver.execute_batch(TAGS_SCHEMA).unwrap();
    Arc::new(driver)
}

pub fn handlers_over(driver: Arc<SqliteDriver>) -> PersistenceHandlers {
    PersistenceHandlers::new(Arc::new(SingleContextResolver::new(driver)))
}

pub fn memory_handlers() -> PersistenceHandlers {
    handlers_over(memory_driver())
}
