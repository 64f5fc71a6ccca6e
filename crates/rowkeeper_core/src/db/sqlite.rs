//! SQLite storage driver backed by `rusqlite`.
//!
//! # Responsibility
//! - Execute generated statements with named `:property` parameters.
//! - Abort in-flight statements when the caller's signal fires.
//!
//! # Invariants
//! - One connection per driver, guarded by a mutex.
//! - The progress handler is always removed before the lock is released.
//! - A write that completed is reported as completed, never as cancelled.
//! - Booleans are stored as `0/1`, timestamps as RFC 3339 UTC text.

use super::{BoundStatement, DriverError, DriverResult, StorageDriver};
use crate::cancel::CancellationSignal;
use crate::model::value::{Row, Value};
use crate::sql::dialect::{Dialect, SqliteDialect};
use chrono::SecondsFormat;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode, Statement};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// VM instructions between cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

impl From<rusqlite::Error> for DriverError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::OperationInterrupted => {
                Self::Cancelled
            }
            _ => Self::Failure {
                message: value.to_string(),
                source_type: "rusqlite::Error".to_string(),
            },
        }
    }
}

pub struct SqliteDriver {
    conn: Mutex<Connection>,
}

impl SqliteDriver {
    /// Wraps an already configured connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs a raw SQL batch, e.g. schema setup owned by the application.
    pub fn execute_batch(&self, sql: &str) -> DriverResult<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `work` with the progress handler installed. Once `work` has
    /// returned, its outcome stands whatever the signal says afterwards.
    fn run<T>(
        &self,
        cancel: &CancellationSignal,
        work: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> DriverResult<T> {
        if cancel.is_cancelled() {
            return Err(DriverError::Cancelled);
        }

        let conn = self.lock();
        let signal = cancel.clone();
        conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || signal.is_cancelled()));
        let result = work(&*conn);
        conn.progress_handler(0, None::<fn() -> bool>);
        Ok(result?)
    }

    /// Like `run`, but a signal raised while rows were read discards them.
    fn read<T>(
        &self,
        cancel: &CancellationSignal,
        work: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> DriverResult<T> {
        let value = self.run(cancel, work)?;
        if cancel.is_cancelled() {
            return Err(DriverError::Cancelled);
        }
        Ok(value)
    }
}

impl StorageDriver for SqliteDriver {
    fn dialect(&self) -> &'static dyn Dialect {
        &SqliteDialect
    }

    fn execute(&self, statement: &BoundStatement, cancel: &CancellationSignal) -> DriverResult<u64> {
        self.run(cancel, |conn| {
            let mut stmt = prepare_bound(conn, statement)?;
            Ok(stmt.raw_execute()? as u64)
        })
    }

    fn query(&self, statement: &BoundStatement, cancel: &CancellationSignal) -> DriverResult<Vec<Row>> {
        self.read(cancel, |conn| {
            let mut stmt = prepare_bound(conn, statement)?;
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mut rows = stmt.raw_query();
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut mapped = Row::new();
                for (index, name) in names.iter().enumerate() {
                    mapped.insert(name.as_str(), from_value_ref(row.get_ref(index)?));
                }
                out.push(mapped);
            }
            Ok(out)
        })
    }

    fn query_single(
        &self,
        statement: &BoundStatement,
        cancel: &CancellationSignal,
    ) -> DriverResult<Option<Value>> {
        self.read(cancel, |conn| {
            let mut stmt = prepare_bound(conn, statement)?;
            first_scalar(&mut stmt)
        })
    }

    fn execute_with_follow_up(
        &self,
        statement: &BoundStatement,
        follow_up: &str,
        cancel: &CancellationSignal,
    ) -> DriverResult<(u64, Option<Value>)> {
        self.run(cancel, |conn| {
            // Statement and follow-up commit together or not at all.
            let tx = conn.unchecked_transaction()?;
            let affected = prepare_bound(&tx, statement)?.raw_execute()? as u64;
            let value = {
                let mut follow = tx.prepare(follow_up)?;
                first_scalar(&mut follow)?
            };
            tx.commit()?;
            Ok((affected, value))
        })
    }
}

fn prepare_bound<'conn>(
    conn: &'conn Connection,
    statement: &BoundStatement,
) -> rusqlite::Result<Statement<'conn>> {
    let mut stmt = conn.prepare(&statement.text)?;
    for (name, value) in &statement.params {
        if let Some(index) = stmt.parameter_index(&format!(":{name}"))? {
            stmt.raw_bind_parameter(index, to_sql_value(value))?;
        }
    }
    Ok(stmt)
}

fn first_scalar(stmt: &mut Statement<'_>) -> rusqlite::Result<Option<Value>> {
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(Some(from_value_ref(row.get_ref(0)?))),
        None => Ok(None),
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(value) => SqlValue::Integer(*value),
        Value::Real(value) => SqlValue::Real(*value),
        Value::Text(value) => SqlValue::Text(value.clone()),
        Value::Bool(value) => SqlValue::Integer(i64::from(*value)),
        Value::Timestamp(value) => {
            SqlValue::Text(value.to_rfc3339_opts(SecondsFormat::Micros, true))
        }
        Value::Blob(value) => SqlValue::Blob(value.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Real(value),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteDriver;
    use crate::cancel::CancellationSignal;
    use crate::db::{BoundStatement, DriverError, StorageDriver};
    use crate::model::value::Value;
    use rusqlite::Connection;
    use std::thread;
    use std::time::{Duration, Instant};

    const LONG_COUNT: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 500000000) SELECT count(*) FROM c";

    fn cancel_after(cancel: &CancellationSignal, delay: Duration) -> thread::JoinHandle<()> {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            cancel.cancel();
        })
    }

    fn item_count(driver: &SqliteDriver) -> Option<Value> {
        driver
            .query_single(
                &BoundStatement::new("SELECT count(*) FROM items"),
                &CancellationSignal::none(),
            )
            .unwrap()
    }

    fn driver() -> SqliteDriver {
        let driver = SqliteDriver::new(Connection::open_in_memory().unwrap());
        driver
            .execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL, active INTEGER NOT NULL);")
            .unwrap();
        driver
    }

    #[test]
    fn binds_named_parameters_and_reads_rows_back() {
        let driver = driver();
        let cancel = CancellationSignal::none();
        let insert = BoundStatement::new("INSERT INTO items (label, active) VALUES (:label, :active)")
            .bind("label", "first")
            .bind("active", true);
        let (affected, id) = driver
            .execute_with_follow_up(&insert, "SELECT last_insert_rowid()", &cancel)
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(id, Some(Value::Integer(1)));

        let rows = driver
            .query(&BoundStatement::new("SELECT id, label, active FROM items"), &cancel)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_text("label").unwrap(), "first");
        assert!(rows[0].get_bool("active").unwrap());
    }

    #[test]
    fn query_single_returns_none_for_empty_result() {
        let driver = driver();
        let value = driver
            .query_single(
                &BoundStatement::new("SELECT id FROM items WHERE id = :id").bind("id", 9_i64),
                &CancellationSignal::none(),
            )
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn cancelled_signal_short_circuits_before_io() {
        let driver = driver();
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let err = driver
            .execute(&BoundStatement::new("DELETE FROM items"), &cancel)
            .unwrap_err();
        assert_eq!(err, DriverError::Cancelled);
    }

    #[test]
    fn sql_errors_become_failures() {
        let driver = driver();
        let err = driver
            .query(&BoundStatement::new("SELECT * FROM missing"), &CancellationSignal::none())
            .unwrap_err();
        assert!(matches!(err, DriverError::Failure { ref message, .. } if message.contains("missing")));
    }

    #[test]
    fn running_query_is_interrupted_by_the_signal() {
        let driver = driver();
        let cancel = CancellationSignal::new();
        let started_at = Instant::now();
        let canceller = cancel_after(&cancel, Duration::from_millis(50));

        let err = driver
            .query_single(&BoundStatement::new(LONG_COUNT), &cancel)
            .unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err, DriverError::Cancelled);
        assert!(started_at.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn interrupted_follow_up_rolls_back_the_insert() {
        let driver = driver();
        let cancel = CancellationSignal::new();
        let insert = BoundStatement::new("INSERT INTO items (label, active) VALUES (:label, :active)")
            .bind("label", "doomed")
            .bind("active", false);
        let canceller = cancel_after(&cancel, Duration::from_millis(50));

        let err = driver
            .execute_with_follow_up(&insert, LONG_COUNT, &cancel)
            .unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err, DriverError::Cancelled);
        assert_eq!(item_count(&driver), Some(Value::Integer(0)));
    }

    #[test]
    fn finished_write_stands_when_signal_fires_afterwards() {
        let driver = driver();
        let cancel = CancellationSignal::new();

        let affected = driver
            .run(&cancel, |conn| {
                let affected = conn.execute(
                    "INSERT INTO items (label, active) VALUES ('kept', 1)",
                    [],
                )?;
                cancel.cancel();
                Ok(affected)
            })
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(item_count(&driver), Some(Value::Integer(1)));
    }

    #[test]
    fn rows_read_before_a_late_signal_are_discarded() {
        let driver = driver();
        let cancel = CancellationSignal::new();

        let err = driver
            .read(&cancel, |conn| {
                let count: i64 = conn.query_row("SELECT count(*) FROM items", [], |row| row.get(0))?;
                cancel.cancel();
                Ok(count)
            })
            .unwrap_err();

        assert_eq!(err, DriverError::Cancelled);
    }
}
