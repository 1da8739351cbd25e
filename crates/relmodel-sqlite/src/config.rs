//! Connection configuration.

use crate::connection::SqliteConnection;
use crate::error::map_error;
use relmodel_core::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to open a [`SqliteConnection`].
///
/// # Example
///
/// ```ignore
/// let conn = SqliteConfig::file("app.db")
///     .busy_timeout(Duration::from_secs(2))
///     .foreign_keys(true)
///     .open()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,
    /// Enforce `REFERENCES` clauses.
    pub foreign_keys: bool,
    /// VM instructions between cancellation checks of a running statement.
    /// Values below 1 are treated as 1 when opening.
    pub progress_ops: i32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            progress_ops: 1000,
        }
    }
}

impl SqliteConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Check for cancellation every `ops` VM instructions. Values below 1
    /// are raised to 1.
    #[must_use]
    pub fn progress_ops(mut self, ops: i32) -> Self {
        self.progress_ops = ops.max(1);
        self
    }

    pub fn open(&self) -> Result<SqliteConnection> {
        let conn = match &self.path {
            Some(path) => rusqlite::Connection::open(path),
            None => rusqlite::Connection::open_in_memory(),
        }
        .map_err(|e| map_error(e, None))?;

        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| map_error(e, None))?;
        let pragma = if self.foreign_keys {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        conn.execute_batch(pragma).map_err(|e| map_error(e, None))?;

        tracing::debug!(
            path = ?self.path,
            foreign_keys = self.foreign_keys,
            "Opened SQLite connection"
        );
        Ok(SqliteConnection::new(conn, self.progress_ops.max(1)))
    }
}
