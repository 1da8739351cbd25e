//! `Connection` implementation over `rusqlite`.

use crate::config::SqliteConfig;
use crate::error::map_error;
use crate::types::{SqlParam, from_value_ref};
use relmodel_core::{Connection, Cx, ExecResult, Result, Row, Value};
use rusqlite::params_from_iter;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// A SQLite database connection.
///
/// Statements are prepared through `rusqlite`'s statement cache. While a
/// statement runs, its `Cx` is visible to the progress handler, which
/// interrupts the statement once the token is cancelled or expired.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    active: Arc<Mutex<Option<Cx>>>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    pub(crate) fn new(conn: rusqlite::Connection, progress_ops: i32) -> Self {
        let active: Arc<Mutex<Option<Cx>>> = Arc::new(Mutex::new(None));
        let watched = Arc::clone(&active);
        conn.progress_handler(
            progress_ops,
            Some(move || {
                let slot = watched.lock().unwrap_or_else(PoisonError::into_inner);
                slot.as_ref()
                    .is_some_and(|cx| cx.is_cancelled() || cx.is_expired())
            }),
        );
        Self { conn, active }
    }

    /// Open with [`SqliteConfig`] defaults.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        config.open()
    }

    /// A private in-memory database.
    pub fn open_memory() -> Result<Self> {
        SqliteConfig::memory().open()
    }

    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        SqliteConfig::file(path).open()
    }

    /// Run one or more statements without parameters, e.g. schema setup.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|e| map_error(e, None))
    }

    /// The underlying `rusqlite` connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn set_active(&self, cx: Option<Cx>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = cx;
    }

    /// Run `f` with `cx` watched by the progress handler.
    fn guarded<T>(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        cx.checkpoint()?;
        tracing::trace!(sql = %sql, params = params.len(), "SQLite statement");
        self.set_active(Some(cx.clone()));
        let result = f(&self.conn);
        self.set_active(None);
        result.map_err(|e| map_error(e, Some(cx)).with_statement(sql, params))
    }
}

impl Connection for SqliteConnection {
    fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.guarded(cx, sql, params, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let columns: Arc<[String]> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let mut rows = stmt.query(params_from_iter(params.iter().map(SqlParam)))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_value_ref(row.get_ref(i)?));
                }
                out.push(Row::new(Arc::clone(&columns), values));
            }
            Ok(out)
        })
    }

    fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.guarded(cx, sql, params, |conn| {
            let before = conn.last_insert_rowid();
            let mut stmt = conn.prepare_cached(sql)?;
            let changes = stmt.execute(params_from_iter(params.iter().map(SqlParam)))?;
            let after = conn.last_insert_rowid();
            // An upsert that took its update path leaves the row id untouched.
            let last_insert_id = if changes > 0 && after != before { after } else { 0 };
            Ok(ExecResult {
                rows_affected: u64::try_from(changes).unwrap_or(u64::MAX),
                last_insert_id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmodel_core::{Error, QueryErrorKind};
    use std::time::Duration;

    fn setup() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_insert_reports_row_id() {
        let conn = setup();
        let cx = Cx::for_testing();
        let result = conn
            .execute(&cx, "INSERT INTO parent (name) VALUES (?)", &[Value::from("a")])
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, 1);

        let rows = conn
            .query(&cx, "SELECT id, name FROM parent WHERE name = ?", &[Value::from("a")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named("NAME"), Some(&Value::Text("a".into())));
    }

    #[test]
    fn test_upsert_update_path_reports_no_row_id() {
        let conn = setup();
        let cx = Cx::for_testing();
        let sql = "INSERT INTO parent (name) VALUES (?) \
                   ON CONFLICT (name) DO UPDATE SET name = excluded.name";
        assert_eq!(
            conn.execute(&cx, sql, &[Value::from("a")]).unwrap().last_insert_id,
            1
        );
        let again = conn.execute(&cx, sql, &[Value::from("a")]).unwrap();
        assert_eq!(again.rows_affected, 1);
        assert_eq!(again.last_insert_id, 0);
    }

    #[test]
    fn test_constraint_violations_are_classified() {
        let conn = setup();
        let cx = Cx::for_testing();
        conn.execute(&cx, "INSERT INTO parent (name) VALUES (?)", &[Value::from("a")])
            .unwrap();

        let err = conn
            .execute(&cx, "INSERT INTO parent (name) VALUES (?)", &[Value::from("a")])
            .unwrap_err();
        assert!(err.is_unique_violation());
        let Error::Query(q) = &err else {
            panic!("expected query error");
        };
        assert_eq!(q.sql.as_deref(), Some("INSERT INTO parent (name) VALUES (?)"));
        assert_eq!(q.params, vec![Value::from("a")]);

        let err = conn
            .execute(&cx, "INSERT INTO child (parent_id) VALUES (?)", &[Value::from(99)])
            .unwrap_err();
        assert!(err.is_foreign_key_violation());

        let err = conn
            .execute(&cx, "INSERT INTO parent (name) VALUES (?)", &[Value::Null])
            .unwrap_err();
        assert!(err.is_not_null_violation());
    }

    #[test]
    fn test_cancelled_token_runs_nothing() {
        let conn = setup();
        let cx = Cx::new();
        cx.cancel();
        let err = conn
            .execute(&cx, "INSERT INTO parent (name) VALUES (?)", &[Value::from("a")])
            .unwrap_err();
        assert!(err.is_cancelled());

        let rows = conn
            .query(&Cx::for_testing(), "SELECT COUNT(*) FROM parent", &[])
            .unwrap();
        assert_eq!(rows[0].get(0), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_deadline_interrupts_running_statement() {
        let conn = setup();
        let cx = Cx::with_timeout(Duration::from_millis(50));
        let err = conn
            .query(
                &cx,
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) \
                 SELECT COUNT(*) FROM n",
                &[],
            )
            .unwrap_err();
        let Error::Query(q) = err else {
            panic!("expected query error");
        };
        assert_eq!(q.kind, QueryErrorKind::Timeout);

        // The handler is idle again once the statement is done.
        let rows = conn.query(&Cx::for_testing(), "SELECT 1", &[]).unwrap();
        assert_eq!(rows[0].get(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let conn = SqliteConnection::open_file(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (v BLOB, r REAL)").unwrap();
            conn.execute(
                &Cx::for_testing(),
                "INSERT INTO t (v, r) VALUES (?, ?)",
                &[Value::Blob(vec![1, 2, 3]), Value::Real(1.5)],
            )
            .unwrap();
        }
        let conn = SqliteConnection::open_file(&path).unwrap();
        let rows = conn.query(&Cx::for_testing(), "SELECT v, r FROM t", &[]).unwrap();
        assert_eq!(rows[0].values(), &[Value::Blob(vec![1, 2, 3]), Value::Real(1.5)]);
    }
}
