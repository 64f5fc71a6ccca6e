//! Statement generation from entity descriptors.
//!
//! # Responsibility
//! - Produce one parameterized statement template per operation kind.
//! - Apply the implicit soft-delete visibility filter.
//!
//! # Invariants
//! - SELECT lists contain every selectable column in declaration order.
//! - INSERT lists never contain the identity column.
//! - SET lists never contain the primary-key or identity column.
//! - Parameters are named after properties, not columns.
//! - Generation is pure: no I/O, no shared state.

use crate::error::{PersistError, PersistResult};
use crate::model::descriptor::{audit_property, ColumnDescriptor, EntityDescriptor};
use crate::sql::dialect::{Dialect, IdentityRetrieval};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SelectById,
    SelectAll,
    SelectPaged,
    Count,
    Insert,
    Update,
    Delete,
    SoftDelete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        Self::SelectById,
        Self::SelectAll,
        Self::SelectPaged,
        Self::Count,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::SoftDelete,
    ];
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SelectById => "select_by_id",
            Self::SelectAll => "select_all",
            Self::SelectPaged => "select_paged",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SoftDelete => "soft_delete",
        };
        f.write_str(name)
    }
}

/// Operation-specific knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// When false, soft-deleted rows are hidden.
    pub include_deleted: bool,
    /// Raw condition appended with `AND`.
    pub extra_predicate: Option<String>,
    /// Raw ORDER BY expression; paged queries default to the primary key.
    pub order_by: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.extra_predicate = Some(predicate.into());
        self
    }

    pub fn ordered_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }
}

/// Statement text plus the property names it binds, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub text: String,
    pub parameters: Vec<String>,
    pub identity: Option<IdentityRetrieval>,
}

struct TemplateWriter<'d> {
    dialect: &'d dyn Dialect,
    parameters: Vec<String>,
}

impl<'d> TemplateWriter<'d> {
    fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            parameters: Vec::new(),
        }
    }

    fn bind(&mut self, name: &str) -> String {
        self.parameters.push(name.to_string());
        self.dialect.placeholder(name, self.parameters.len())
    }

    fn column(&self, column: &ColumnDescriptor) -> String {
        self.dialect.quote_identifier(&column.column_name)
    }

    fn finish(self, text: String) -> StatementTemplate {
        StatementTemplate {
            text,
            parameters: self.parameters,
            identity: None,
        }
    }
}

/// Generates the statement template for `kind`.
///
/// # Errors
/// - `UnsupportedOperation` for `SoftDelete` on a descriptor without the
///   soft-delete capability.
/// - `Configuration` for an `Update` with nothing to set.
pub fn generate(
    descriptor: &EntityDescriptor,
    kind: OperationKind,
    options: &QueryOptions,
    dialect: &dyn Dialect,
) -> PersistResult<StatementTemplate> {
    let mut writer = TemplateWriter::new(dialect);
    let table = dialect.quote_table(descriptor.table_name());

    match kind {
        OperationKind::SelectById => {
            let mut predicates = vec![key_predicate(&mut writer, descriptor)];
            predicates.extend(visibility_predicates(descriptor, options, dialect));
            let text = format!(
                "SELECT {} FROM {table}{}",
                select_list(&writer, descriptor),
                where_clause(&predicates)
            );
            Ok(writer.finish(text))
        }
        OperationKind::SelectAll => {
            let predicates = visibility_predicates(descriptor, options, dialect);
            let mut text = format!(
                "SELECT {} FROM {table}{}",
                select_list(&writer, descriptor),
                where_clause(&predicates)
            );
            if let Some(order_by) = non_blank(&options.order_by) {
                text.push_str(&format!(" ORDER BY {order_by}"));
            }
            Ok(writer.finish(text))
        }
        OperationKind::SelectPaged => {
            let predicates = visibility_predicates(descriptor, options, dialect);
            let order_by = non_blank(&options.order_by)
                .map(str::to_string)
                .unwrap_or_else(|| writer.column(descriptor.primary_key_column()));
            let mut text = format!(
                "SELECT {} FROM {table}{} ORDER BY {order_by}",
                select_list(&writer, descriptor),
                where_clause(&predicates)
            );
            let window = dialect.page_window(&mut |name| writer.bind(name));
            text.push(' ');
            text.push_str(&window);
            Ok(writer.finish(text))
        }
        OperationKind::Count => {
            let predicates = visibility_predicates(descriptor, options, dialect);
            let text = format!("SELECT COUNT(*) FROM {table}{}", where_clause(&predicates));
            Ok(writer.finish(text))
        }
        OperationKind::Insert => {
            let columns: Vec<&ColumnDescriptor> = descriptor.insert_columns().collect();
            let mut text = if columns.is_empty() {
                format!("INSERT INTO {table} DEFAULT VALUES")
            } else {
                let names: Vec<String> = columns.iter().map(|column| writer.column(column)).collect();
                let values: Vec<String> = columns
                    .iter()
                    .map(|column| writer.bind(&column.property_name))
                    .collect();
                format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    names.join(", "),
                    values.join(", ")
                )
            };
            let identity = match descriptor.identity_column() {
                Some(_) => Some(generate_identity_retrieval(descriptor, dialect)?),
                None => None,
            };
            if let Some(IdentityRetrieval::Returning(clause)) = &identity {
                text.push(' ');
                text.push_str(clause);
            }
            let mut template = writer.finish(text);
            template.identity = identity;
            Ok(template)
        }
        OperationKind::Update => {
            let columns: Vec<&ColumnDescriptor> = descriptor.update_columns().collect();
            if columns.is_empty() {
                return Err(PersistError::configuration(format!(
                    "{} has no updatable columns",
                    descriptor.entity_name()
                )));
            }
            let assignments: Vec<String> = columns
                .iter()
                .map(|column| {
                    let quoted = writer.column(column);
                    format!("{quoted} = {}", writer.bind(&column.property_name))
                })
                .collect();
            let mut predicates = vec![key_predicate(&mut writer, descriptor)];
            predicates.extend(visibility_predicates(descriptor, options, dialect));
            let text = format!(
                "UPDATE {table} SET {}{}",
                assignments.join(", "),
                where_clause(&predicates)
            );
            Ok(writer.finish(text))
        }
        OperationKind::Delete => {
            let mut predicates = vec![key_predicate(&mut writer, descriptor)];
            predicates.extend(extra_predicate(options));
            let text = format!("DELETE FROM {table}{}", where_clause(&predicates));
            Ok(writer.finish(text))
        }
        OperationKind::SoftDelete => {
            descriptor.require_soft_delete()?;
            let mut assignments = Vec::new();
            for column in descriptor.columns() {
                let property = column.property_name.as_str();
                let quoted = writer.column(column);
                match property {
                    audit_property::IS_DELETED => {
                        assignments.push(format!("{quoted} = {}", dialect.bool_literal(true)));
                    }
                    audit_property::DELETED_AT | audit_property::DELETED_BY => {
                        assignments.push(format!("{quoted} = {}", writer.bind(property)));
                    }
                    audit_property::LAST_MODIFIED_AT | audit_property::LAST_MODIFIED_BY
                        if descriptor.is_auditable() =>
                    {
                        assignments.push(format!("{quoted} = {}", writer.bind(property)));
                    }
                    _ => {}
                }
            }
            let mut predicates = vec![key_predicate(&mut writer, descriptor)];
            // Already-deleted rows are never candidates, whatever the options say.
            predicates.extend(soft_delete_filter(descriptor, dialect));
            predicates.extend(extra_predicate(options));
            let text = format!(
                "UPDATE {table} SET {}{}",
                assignments.join(", "),
                where_clause(&predicates)
            );
            Ok(writer.finish(text))
        }
    }
}

/// Post-insert key retrieval for the descriptor's identity column.
///
/// # Errors
/// - `UnsupportedOperation` when the descriptor has no identity column.
pub fn generate_identity_retrieval(
    descriptor: &EntityDescriptor,
    dialect: &dyn Dialect,
) -> PersistResult<IdentityRetrieval> {
    let column = descriptor.identity_column().ok_or_else(|| {
        PersistError::unsupported(format!(
            "{} has no identity column",
            descriptor.entity_name()
        ))
    })?;
    Ok(dialect.identity_retrieval(&dialect.quote_identifier(&column.column_name)))
}

fn select_list(writer: &TemplateWriter<'_>, descriptor: &EntityDescriptor) -> String {
    descriptor
        .select_columns()
        .map(|column| {
            let quoted = writer.column(column);
            if column.column_name == column.property_name {
                quoted
            } else {
                format!(
                    "{quoted} AS {}",
                    writer.dialect.quote_identifier(&column.property_name)
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate(writer: &mut TemplateWriter<'_>, descriptor: &EntityDescriptor) -> String {
    let key = descriptor.primary_key_column();
    let quoted = writer.column(key);
    format!("{quoted} = {}", writer.bind(&key.property_name))
}

fn visibility_predicates(
    descriptor: &EntityDescriptor,
    options: &QueryOptions,
    dialect: &dyn Dialect,
) -> Vec<String> {
    let mut predicates = Vec::new();
    if !options.include_deleted {
        predicates.extend(soft_delete_filter(descriptor, dialect));
    }
    predicates.extend(extra_predicate(options));
    predicates
}

fn soft_delete_filter(descriptor: &EntityDescriptor, dialect: &dyn Dialect) -> Option<String> {
    descriptor.soft_delete_column().map(|column| {
        format!(
            "{} = {}",
            dialect.quote_identifier(&column.column_name),
            dialect.bool_literal(false)
        )
    })
}

fn extra_predicate(options: &QueryOptions) -> Option<String> {
    non_blank(&options.extra_predicate).map(|predicate| format!("({predicate})"))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn where_clause(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::{generate, OperationKind, QueryOptions};
    use crate::model::descriptor::{ColumnSpec, EntityDescriptor};
    use crate::sql::dialect::{IdentityRetrieval, PostgresDialect, SqlServerDialect, SqliteDialect};

    fn users() -> EntityDescriptor {
        EntityDescriptor::builder("users")
            .column(ColumnSpec::new("id").identity())
            .column(ColumnSpec::new("name"))
            .column(ColumnSpec::new("email").column_name("EmailAddress"))
            .soft_delete()
            .build("User")
            .unwrap()
    }

    #[test]
    fn select_by_id_aliases_renamed_columns_and_hides_deleted_rows() {
        let template = generate(
            &users(),
            OperationKind::SelectById,
            &QueryOptions::default(),
            &SqliteDialect,
        )
        .unwrap();
        assert_eq!(
            template.text,
            "SELECT \"id\", \"name\", \"EmailAddress\" AS \"email\", \"IsDeleted\" AS \"is_deleted\", \
             \"DeletedAt\" AS \"deleted_at\", \"DeletedBy\" AS \"deleted_by\" FROM \"users\" \
             WHERE \"id\" = :id AND \"IsDeleted\" = 0"
        );
        assert_eq!(template.parameters, vec!["id"]);
    }

    #[test]
    fn include_deleted_drops_the_implicit_filter() {
        let template = generate(
            &users(),
            OperationKind::Count,
            &QueryOptions::new().including_deleted().with_predicate("name LIKE 'J%'"),
            &SqliteDialect,
        )
        .unwrap();
        assert_eq!(
            template.text,
            "SELECT COUNT(*) FROM \"users\" WHERE (name LIKE 'J%')"
        );
    }

    #[test]
    fn postgres_insert_returns_identity_inline() {
        let template = generate(
            &users(),
            OperationKind::Insert,
            &QueryOptions::default(),
            &PostgresDialect,
        )
        .unwrap();
        assert!(template.text.ends_with("RETURNING \"id\""));
        assert!(template.text.starts_with(
            "INSERT INTO \"users\" (\"name\", \"EmailAddress\", \"IsDeleted\", \"DeletedAt\", \"DeletedBy\") VALUES ($1, $2, $3, $4, $5)"
        ));
        assert_eq!(
            template.parameters,
            vec!["name", "email", "is_deleted", "deleted_at", "deleted_by"]
        );
        assert!(matches!(template.identity, Some(IdentityRetrieval::Returning(_))));
    }

    #[test]
    fn sql_server_paged_select_skips_then_takes() {
        let template = generate(
            &users(),
            OperationKind::SelectPaged,
            &QueryOptions::default(),
            &SqlServerDialect,
        )
        .unwrap();
        assert!(template
            .text
            .ends_with("WHERE [IsDeleted] = 0 ORDER BY [id] OFFSET @__skip ROWS FETCH NEXT @__take ROWS ONLY"));
        assert_eq!(template.parameters, vec!["__skip", "__take"]);
    }

    #[test]
    fn update_never_sets_the_key_or_deletion_columns() {
        let template = generate(
            &users(),
            OperationKind::Update,
            &QueryOptions::default(),
            &SqliteDialect,
        )
        .unwrap();
        assert_eq!(
            template.text,
            "UPDATE \"users\" SET \"name\" = :name, \"EmailAddress\" = :email \
             WHERE \"id\" = :id AND \"IsDeleted\" = 0"
        );
    }

    #[test]
    fn soft_delete_filters_out_already_deleted_rows() {
        let template = generate(
            &users(),
            OperationKind::SoftDelete,
            &QueryOptions::new().including_deleted(),
            &SqliteDialect,
        )
        .unwrap();
        assert_eq!(
            template.text,
            "UPDATE \"users\" SET \"IsDeleted\" = 1, \"DeletedAt\" = :deleted_at, \
             \"DeletedBy\" = :deleted_by WHERE \"id\" = :id AND \"IsDeleted\" = 0"
        );
        assert_eq!(template.parameters, vec!["deleted_at", "deleted_by", "id"]);
    }
}
