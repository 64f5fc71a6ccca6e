//! Command-line front end for `rowkeeper_core`.
//!
//! # Responsibility
//! - Report the linked core version.
//! - Print the statements generated for a sample entity in any dialect.

use clap::{Parser, Subcommand};
use rowkeeper_core::model::registry::resolve;
use rowkeeper_core::sql::generate;
use rowkeeper_core::{
    AuditFields, ColumnSpec, DescriptorBuilder, DialectKind, Entity, EntityDescriptor, IntId,
    OperationKind, PersistResult, QueryOptions, Row, ValueMap,
};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "rowkeeper", version, about = "Entity persistence toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the core crate version.
    Version,
    /// Print every statement generated for the sample `User` entity.
    Preview {
        /// sqlite, postgres or sqlserver.
        #[arg(long, default_value = "sqlite", value_parser = parse_dialect)]
        dialect: DialectKind,
        /// Show soft-deleted rows in read statements.
        #[arg(long)]
        include_deleted: bool,
    },
}

fn parse_dialect(value: &str) -> Result<DialectKind, String> {
    DialectKind::parse(value).ok_or_else(|| format!("unknown dialect `{value}`"))
}

#[derive(Debug, Clone, Default)]
struct User {
    id: IntId,
    name: String,
    email: Option<String>,
    audit: AuditFields,
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

fn preview(dialect: DialectKind, include_deleted: bool) -> PersistResult<()> {
    let descriptor = resolve::<User>()?;
    let options = QueryOptions {
        include_deleted,
        ..QueryOptions::default()
    };
    println!("-- dialect={dialect} table={}", descriptor.table_name());
    for kind in OperationKind::ALL {
        let template = generate(&descriptor, kind, &options, dialect.dialect())?;
        println!("-- {kind} params=[{}]", template.parameters.join(", "));
        println!("{};", template.text);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Version => {
            println!("rowkeeper_core version={}", rowkeeper_core::core_version());
            Ok(())
        }
        Command::Preview {
            dialect,
            include_deleted,
        } => preview(dialect, include_deleted),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error[{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}
