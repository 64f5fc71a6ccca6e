//! SQL statement generation.
//!
//! # Responsibility
//! - Turn entity descriptors into parameterized statements per dialect.
//! - Keep every dialect-specific fragment behind the `Dialect` trait.

pub mod dialect;
pub mod generator;

pub use dialect::{
    Dialect, DialectKind, IdentityRetrieval, PostgresDialect, SqlServerDialect, SqliteDialect,
};
pub use generator::{
    generate, generate_identity_retrieval, OperationKind, QueryOptions, StatementTemplate,
};
