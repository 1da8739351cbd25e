//! Database connection trait and the per-call context token.
//!
//! Every public operation takes a [`Cx`] first. It carries an optional
//! deadline and a shared cancellation flag; drivers check it between
//! statements and while a statement is running.

use crate::error::{Error, QueryError, QueryErrorKind, Result};
use crate::row::Row;
use crate::value::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// Cx
// ============================================================================

/// Cancellation and deadline token for one logical operation.
///
/// Cloning a `Cx` shares its cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Cx {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Cx {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancelled: Arc::default(),
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    /// Derive a context sharing this one's cancellation flag, whose deadline
    /// is the earlier of the parent's and `timeout` from now.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.and_then(|t| Instant::now().checked_add(t));
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            deadline,
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// A handle that can cancel this context from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with a cancellation error if this context is done.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Query(QueryError::new(
                QueryErrorKind::Cancelled,
                "operation cancelled",
            )));
        }
        if self.is_expired() {
            return Err(Error::Query(QueryError::new(
                QueryErrorKind::Timeout,
                "operation timed out",
            )));
        }
        Ok(())
    }

    /// A context for tests: no deadline, never cancelled unless asked.
    pub fn for_testing() -> Self {
        Self::new()
    }
}

/// Cancels the `Cx` it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Row id produced by this statement, or 0 when it inserted nothing.
    pub last_insert_id: i64,
}

/// A database connection.
///
/// Implementations must report `last_insert_id` only for rows inserted by
/// the statement itself. An upsert that took its update path reports 0.
pub trait Connection {
    /// Run a statement that returns rows.
    fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement that does not return rows.
    fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<ExecResult>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(cx, sql, params)
    }

    fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Result<ExecResult> {
        (**self).execute(cx, sql, params)
    }
}
