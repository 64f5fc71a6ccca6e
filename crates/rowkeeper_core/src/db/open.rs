//! Connection bootstrap for configured storage contexts.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections with required pragmas.
//! - Turn a `StoreConfig` into a populated context resolver.
//!
//! # Invariants
//! - Returned SQLite connections have `foreign_keys=ON`.
//! - A context whose dialect has no bundled driver is a configuration error,
//!   never silently skipped.

use super::sqlite::SqliteDriver;
use super::DriverResult;
use crate::config::StoreConfig;
use crate::context::NamedContextResolver;
use crate::error::{PersistError, PersistResult};
use crate::sql::dialect::DialectKind;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Database value selecting a private in-memory SQLite database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

impl SqliteDriver {
    /// Opens a SQLite database file.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        open_with("file", || Connection::open(path))
    }

    /// Opens a private in-memory SQLite database.
    pub fn open_in_memory() -> DriverResult<Self> {
        open_with("memory", Connection::open_in_memory)
    }
}

fn open_with(
    mode: &str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DriverResult<SqliteDriver> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect().and_then(|conn| {
        bootstrap_connection(&conn)?;
        Ok(conn)
    });

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(SqliteDriver::new(conn))
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Opens every configured context and registers it by name.
///
/// # Errors
/// - `Configuration` when the config is invalid or names a dialect without
///   a bundled driver.
/// - `Internal` when a database cannot be opened.
pub fn open_contexts(config: &StoreConfig) -> PersistResult<NamedContextResolver> {
    config.validate()?;

    let mut resolver = NamedContextResolver::new();
    for context in &config.contexts {
        let driver = match context.dialect {
            DialectKind::Sqlite => {
                if context.database.trim() == IN_MEMORY_DATABASE {
                    SqliteDriver::open_in_memory()?
                } else {
                    SqliteDriver::open(context.database.trim())?
                }
            }
            other => {
                return Err(PersistError::configuration(format!(
                    "context `{}`: no bundled driver for dialect {other}",
                    context.name
                )));
            }
        };
        resolver.register(context.name.as_str(), Arc::new(driver))?;
    }

    Ok(resolver)
}
