//! SQL dialect extension points.
//!
//! # Responsibility
//! - Isolate every back-end specific fragment: quoting, placeholders,
//!   boolean literals, page windows and post-insert identity retrieval.
//!
//! # Invariants
//! - Page windows always mean "skip N rows, take M rows".
//! - Placeholders are requested in order of appearance in the statement.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Reserved parameter name for the number of skipped rows.
pub const SKIP_PARAM: &str = "__skip";
/// Reserved parameter name for the page size.
pub const TAKE_PARAM: &str = "__take";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Sqlite,
    Postgres,
    SqlServer,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Sqlite => &SqliteDialect,
            Self::Postgres => &PostgresDialect,
            Self::SqlServer => &SqlServerDialect,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlserver" | "mssql" => Some(Self::SqlServer),
            _ => None,
        }
    }
}

impl Display for DialectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        };
        f.write_str(name)
    }
}

/// How the generated key is read back after an INSERT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRetrieval {
    /// Clause appended to the INSERT; the INSERT itself yields the key.
    Returning(String),
    /// Separate query run on the same connection right after the INSERT.
    FollowUp(String),
}

pub trait Dialect: Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    fn quote_identifier(&self, identifier: &str) -> String;

    /// Quotes each part of a possibly schema-qualified name.
    fn quote_table(&self, table_name: &str) -> String {
        table_name
            .split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Placeholder for parameter `name`, the `position`-th (1-based) bound.
    fn placeholder(&self, name: &str, position: usize) -> String;

    fn bool_literal(&self, value: bool) -> &'static str;

    /// Renders the page window; `bind` registers a parameter and returns its placeholder.
    fn page_window(&self, bind: &mut dyn FnMut(&str) -> String) -> String;

    fn identity_retrieval(&self, quoted_identity_column: &str) -> IdentityRetrieval;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn placeholder(&self, name: &str, _position: usize) -> String {
        format!(":{name}")
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn page_window(&self, bind: &mut dyn FnMut(&str) -> String) -> String {
        let take = bind(TAKE_PARAM);
        let skip = bind(SKIP_PARAM);
        format!("LIMIT {take} OFFSET {skip}")
    }

    fn identity_retrieval(&self, _quoted_identity_column: &str) -> IdentityRetrieval {
        IdentityRetrieval::FollowUp("SELECT last_insert_rowid()".to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn placeholder(&self, _name: &str, position: usize) -> String {
        format!("${position}")
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn page_window(&self, bind: &mut dyn FnMut(&str) -> String) -> String {
        let take = bind(TAKE_PARAM);
        let skip = bind(SKIP_PARAM);
        format!("LIMIT {take} OFFSET {skip}")
    }

    fn identity_retrieval(&self, quoted_identity_column: &str) -> IdentityRetrieval {
        IdentityRetrieval::Returning(format!("RETURNING {quoted_identity_column}"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn placeholder(&self, name: &str, _position: usize) -> String {
        format!("@{name}")
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn page_window(&self, bind: &mut dyn FnMut(&str) -> String) -> String {
        let skip = bind(SKIP_PARAM);
        let take = bind(TAKE_PARAM);
        format!("OFFSET {skip} ROWS FETCH NEXT {take} ROWS ONLY")
    }

    fn identity_retrieval(&self, _quoted_identity_column: &str) -> IdentityRetrieval {
        IdentityRetrieval::FollowUp("SELECT CAST(SCOPE_IDENTITY() AS BIGINT)".to_string())
    }
}
