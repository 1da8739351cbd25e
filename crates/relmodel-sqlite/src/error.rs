//! Mapping from `rusqlite` failures to relmodel errors.

use relmodel_core::{ConstraintKind, Cx, Error, QueryError, QueryErrorKind};
use rusqlite::ErrorCode;

/// Classify a driver failure.
///
/// `cx` is the token the statement ran under; an interrupted statement is
/// reported as cancelled or timed out depending on its state.
pub fn map_error(err: rusqlite::Error, cx: Option<&Cx>) -> Error {
    let (kind, code, message) = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let kind = if failure.code == ErrorCode::OperationInterrupted {
                match cx {
                    Some(cx) if cx.is_cancelled() => QueryErrorKind::Cancelled,
                    _ => QueryErrorKind::Timeout,
                }
            } else {
                ConstraintKind::from_extended_code(failure.extended_code)
                    .map_or(QueryErrorKind::Database, QueryErrorKind::Constraint)
            };
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            (kind, Some(failure.extended_code), message)
        }
        other => (QueryErrorKind::Database, None, other.to_string()),
    };

    tracing::debug!(kind = ?kind, code = ?code, message = %message, "SQLite error");
    let mut query = QueryError::new(kind, message);
    query.code = code;
    query.source = Some(Box::new(err));
    Error::Query(query)
}
