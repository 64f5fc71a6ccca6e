//! Entity metadata declaration and validation.
//!
//! # Responsibility
//! - Let each entity type declare its table mapping once through a builder.
//! - Turn that declaration into an immutable `EntityDescriptor`.
//!
//! # Invariants
//! - A built descriptor has exactly one primary-key column.
//! - A built descriptor has at most one identity column.
//! - Property names and column names are unique within one descriptor.
//! - Audit and soft-delete columns always follow the entity's own columns.

use crate::error::{PersistError, PersistResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid table name regex")
});

/// Property names of the audit fields maintained by the stamper.
pub mod audit_property {
    pub const CREATED_AT: &str = "created_at";
    pub const CREATED_BY: &str = "created_by";
    pub const LAST_MODIFIED_AT: &str = "last_modified_at";
    pub const LAST_MODIFIED_BY: &str = "last_modified_by";
    pub const IS_DELETED: &str = "is_deleted";
    pub const DELETED_AT: &str = "deleted_at";
    pub const DELETED_BY: &str = "deleted_by";
}

// (property, column, exclude_from_update)
const AUDIT_COLUMNS: &[(&str, &str, bool)] = &[
    (audit_property::CREATED_AT, "CreatedAt", true),
    (audit_property::CREATED_BY, "CreatedBy", true),
    (audit_property::LAST_MODIFIED_AT, "LastModifiedAt", false),
    (audit_property::LAST_MODIFIED_BY, "LastModifiedBy", false),
];
const SOFT_DELETE_COLUMNS: &[(&str, &str, bool)] = &[
    (audit_property::IS_DELETED, "IsDeleted", true),
    (audit_property::DELETED_AT, "DeletedAt", true),
    (audit_property::DELETED_BY, "DeletedBy", true),
];

/// Resolved mapping of one entity property to one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub property_name: String,
    pub column_name: String,
    pub exclude_from_select: bool,
    pub exclude_from_insert: bool,
    pub exclude_from_update: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
}

impl ColumnDescriptor {
    pub fn is_selectable(&self) -> bool {
        !self.exclude_from_select
    }

    pub fn is_insertable(&self) -> bool {
        !self.is_identity && !self.exclude_from_insert
    }

    /// Key and identity columns never appear in a SET list.
    pub fn is_updatable(&self) -> bool {
        !self.is_primary_key && !self.is_identity && !self.exclude_from_update
    }
}

/// Immutable, shareable metadata for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    entity_name: String,
    table_name: String,
    columns: Vec<ColumnDescriptor>,
    primary_key: usize,
    identity: Option<usize>,
    auditable: bool,
    supports_soft_delete: bool,
    contexts: Vec<String>,
}

impl EntityDescriptor {
    /// Starts a declaration for the given (optionally schema-qualified) table.
    pub fn builder(table_name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(table_name)
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn primary_key_column(&self) -> &ColumnDescriptor {
        &self.columns[self.primary_key]
    }

    pub fn identity_column(&self) -> Option<&ColumnDescriptor> {
        self.identity.map(|index| &self.columns[index])
    }

    pub fn is_auditable(&self) -> bool {
        self.auditable
    }

    pub fn supports_soft_delete(&self) -> bool {
        self.supports_soft_delete
    }

    /// Declared owning contexts; the first entry is the write target.
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    pub fn column_for_property(&self, property_name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|column| column.property_name == property_name)
    }

    pub fn select_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|column| column.is_selectable())
    }

    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|column| column.is_insertable())
    }

    pub fn update_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|column| column.is_updatable())
    }

    /// Fails unless the type declared the soft-delete capability.
    pub fn require_soft_delete(&self) -> PersistResult<()> {
        if self.supports_soft_delete {
            Ok(())
        } else {
            Err(PersistError::unsupported(format!(
                "{} does not support soft delete",
                self.entity_name
            )))
        }
    }

    pub(crate) fn soft_delete_column(&self) -> Option<&ColumnDescriptor> {
        if self.supports_soft_delete {
            self.column_for_property(audit_property::IS_DELETED)
        } else {
            None
        }
    }
}

/// Declaration of one entity property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    property_name: String,
    column_name: Option<String>,
    exclude_from_select: bool,
    exclude_from_insert: bool,
    exclude_from_update: bool,
    primary_key: bool,
    identity: bool,
}

impl ColumnSpec {
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            column_name: None,
            exclude_from_select: false,
            exclude_from_insert: false,
            exclude_from_update: false,
            primary_key: false,
            identity: false,
        }
    }

    /// Overrides the column name; defaults to the property name.
    pub fn column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks a database-assigned column.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn exclude_from_select(mut self) -> Self {
        self.exclude_from_select = true;
        self
    }

    pub fn exclude_from_insert(mut self) -> Self {
        self.exclude_from_insert = true;
        self
    }

    pub fn exclude_from_update(mut self) -> Self {
        self.exclude_from_update = true;
        self
    }

    fn into_column(self) -> ColumnDescriptor {
        let column_name = self
            .column_name
            .unwrap_or_else(|| self.property_name.clone());
        ColumnDescriptor {
            property_name: self.property_name,
            column_name,
            exclude_from_select: self.exclude_from_select,
            exclude_from_insert: self.exclude_from_insert,
            exclude_from_update: self.exclude_from_update,
            is_primary_key: self.primary_key,
            is_identity: self.identity,
        }
    }
}

/// Builder for `EntityDescriptor`.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    table_name: String,
    columns: Vec<ColumnSpec>,
    auditable: bool,
    soft_delete: bool,
    contexts: Vec<String>,
}

impl DescriptorBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            auditable: false,
            soft_delete: false,
            contexts: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends `CreatedAt/CreatedBy/LastModifiedAt/LastModifiedBy`.
    pub fn audited(mut self) -> Self {
        self.auditable = true;
        self
    }

    /// Appends `IsDeleted/DeletedAt/DeletedBy` and enables soft delete.
    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    /// Declares an owning storage context. Order is significant.
    pub fn context(mut self, name: impl Into<String>) -> Self {
        self.contexts.push(name.into());
        self
    }

    /// Validates the declaration and produces the descriptor.
    ///
    /// # Errors
    /// - `Configuration` for invalid identifiers, duplicates, ambiguous
    ///   key/identity markers, or when no primary key can be determined.
    pub fn build(self, entity_name: &str) -> PersistResult<EntityDescriptor> {
        let table_name = self.table_name.trim().to_string();
        if !TABLE_NAME_RE.is_match(&table_name) {
            return Err(config_error(
                entity_name,
                format!("invalid table name `{table_name}`"),
            ));
        }

        let mut columns: Vec<ColumnDescriptor> = self
            .columns
            .into_iter()
            .map(ColumnSpec::into_column)
            .collect();
        if self.auditable {
            columns.extend(AUDIT_COLUMNS.iter().map(generated_column));
        }
        if self.soft_delete {
            columns.extend(SOFT_DELETE_COLUMNS.iter().map(generated_column));
        }

        let mut properties = BTreeSet::new();
        let mut column_names = BTreeSet::new();
        for column in &columns {
            for name in [&column.property_name, &column.column_name] {
                if !IDENTIFIER_RE.is_match(name) {
                    return Err(config_error(
                        entity_name,
                        format!("invalid identifier `{name}`"),
                    ));
                }
            }
            if !properties.insert(column.property_name.as_str()) {
                return Err(config_error(
                    entity_name,
                    format!("duplicate property `{}`", column.property_name),
                ));
            }
            if !column_names.insert(column.column_name.to_ascii_lowercase()) {
                return Err(config_error(
                    entity_name,
                    format!("duplicate column `{}`", column.column_name),
                ));
            }
        }

        let primary_key = resolve_primary_key(entity_name, &mut columns)?;
        if columns[primary_key].exclude_from_select {
            return Err(config_error(
                entity_name,
                "primary key column cannot be excluded from select".to_string(),
            ));
        }

        let identity_markers: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.is_identity)
            .map(|(index, _)| index)
            .collect();
        if identity_markers.len() > 1 {
            return Err(config_error(
                entity_name,
                "more than one identity column declared".to_string(),
            ));
        }

        let mut contexts = Vec::with_capacity(self.contexts.len());
        for name in self.contexts {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(config_error(
                    entity_name,
                    "context name cannot be empty".to_string(),
                ));
            }
            if !contexts.contains(&name) {
                contexts.push(name);
            }
        }

        Ok(EntityDescriptor {
            entity_name: entity_name.to_string(),
            table_name,
            columns,
            primary_key,
            identity: identity_markers.first().copied(),
            auditable: self.auditable,
            supports_soft_delete: self.soft_delete,
            contexts,
        })
    }
}

/// Explicit marker wins; otherwise a property literally named `id`.
fn resolve_primary_key(
    entity_name: &str,
    columns: &mut [ColumnDescriptor],
) -> PersistResult<usize> {
    let markers: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.is_primary_key)
        .map(|(index, _)| index)
        .collect();

    match markers.as_slice() {
        [index] => Ok(*index),
        [] => {
            let index = columns
                .iter()
                .position(|column| column.property_name.eq_ignore_ascii_case("id"))
                .ok_or_else(|| {
                    config_error(entity_name, "no primary key could be determined".to_string())
                })?;
            columns[index].is_primary_key = true;
            Ok(index)
        }
        _ => Err(config_error(
            entity_name,
            "more than one primary key column declared".to_string(),
        )),
    }
}

fn generated_column(spec: &(&str, &str, bool)) -> ColumnDescriptor {
    let (property, column, exclude_from_update) = *spec;
    ColumnDescriptor {
        property_name: property.to_string(),
        column_name: column.to_string(),
        exclude_from_select: false,
        exclude_from_insert: false,
        exclude_from_update,
        is_primary_key: false,
        is_identity: false,
    }
}

fn config_error(entity_name: &str, message: String) -> PersistError {
    PersistError::configuration(format!("{entity_name}: {message}"))
}
