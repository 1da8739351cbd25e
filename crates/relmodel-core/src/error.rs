//! Error taxonomy shared by every relmodel crate.
//!
//! - [`Error::Config`]: malformed or incomplete tag/relation configuration,
//!   detected while describing a model and before any SQL is built.
//! - [`Error::Type`]: a field's declared kind does not match its Rust shape, or
//!   a stored value cannot be converted into the field's type.
//! - [`Error::Query`]: the driver rejected a statement. Carries the exact SQL
//!   and parameters, plus a [`QueryErrorKind`] that sub-classifies constraint
//!   violations, cancellation and timeouts.
//! - [`Error::NotFound`]: an update or delete affected zero rows.

use crate::value::Value;
use std::fmt;

/// Result alias used throughout relmodel.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Invalid model or relation configuration.
    Config(ConfigError),
    /// Relation kind/shape mismatch or value conversion failure.
    Type(TypeError),
    /// Statement execution failure.
    Query(QueryError),
    /// Update or delete matched no rows.
    NotFound(NotFoundError),
    /// Anything else (internal invariant breaks).
    Custom(String),
}

impl Error {
    /// Shorthand for a configuration error on a model.
    pub fn config(model: &str, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            model: model.to_string(),
            field: None,
            message: message.into(),
        })
    }

    /// Shorthand for a configuration error on a specific field.
    pub fn config_field(model: &str, field: &str, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            model: model.to_string(),
            field: Some(field.to_string()),
            message: message.into(),
        })
    }

    /// Whether this is the distinguished not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Constraint classification, when the driver reported a constraint failure.
    pub fn constraint(&self) -> Option<ConstraintKind> {
        match self {
            Error::Query(QueryError {
                kind: QueryErrorKind::Constraint(kind),
                ..
            }) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.constraint() == Some(ConstraintKind::Unique)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.constraint() == Some(ConstraintKind::ForeignKey)
    }

    pub fn is_not_null_violation(&self) -> bool {
        self.constraint() == Some(ConstraintKind::NotNull)
    }

    /// Whether the call was aborted by its `Cx` (cancel or deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Query(QueryError {
                kind: QueryErrorKind::Cancelled | QueryErrorKind::Timeout,
                ..
            })
        )
    }

    /// Attach the statement that produced this error, if it is a query error
    /// that does not carry one yet.
    #[must_use]
    pub fn with_statement(self, sql: &str, params: &[Value]) -> Self {
        match self {
            Error::Query(mut err) => {
                if err.sql.is_none() {
                    err.sql = Some(sql.to_string());
                    err.params = params.to_vec();
                }
                Error::Query(err)
            }
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "{e}"),
            Error::Type(e) => write!(f, "{e}"),
            Error::Query(e) => write!(f, "{e}"),
            Error::NotFound(e) => write!(f, "{e}"),
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<TypeError> for Error {
    fn from(e: TypeError) -> Self {
        Error::Type(e)
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::Query(e)
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Malformed or incomplete model configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Rust type name of the model.
    pub model: String,
    /// Offending field, if the problem is field-local.
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "invalid configuration for {}.{}: {}",
                self.model, field, self.message
            ),
            None => write!(f, "invalid configuration for {}: {}", self.model, self.message),
        }
    }
}

// ============================================================================
// Type errors
// ============================================================================

/// A field's shape does not match what its tag or a stored value requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    /// Model name, empty when raised below the model layer.
    pub model: String,
    /// Field name, empty when raised below the model layer.
    pub field: String,
    /// What the field required.
    pub expected: String,
    /// What was actually found.
    pub found: String,
}

impl TypeError {
    /// A conversion failure with no location yet.
    pub fn conversion(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            field: String::new(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Fill in where the error happened.
    #[must_use]
    pub fn at(mut self, model: &str, field: &str) -> Self {
        self.model = model.to_string();
        self.field = field.to_string();
        self
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "type mismatch: expected {}, found {}", self.expected, self.found)
        } else {
            write!(
                f,
                "type mismatch on {}.{}: expected {}, found {}",
                self.model, self.field, self.expected, self.found
            )
        }
    }
}

// ============================================================================
// Query errors
// ============================================================================

/// Kind of constraint a failed statement violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// UNIQUE or PRIMARY KEY
    Unique,
    ForeignKey,
    NotNull,
    /// CHECK, trigger or other constraint failures
    Other,
}

impl ConstraintKind {
    /// Classify an SQLite extended result code.
    ///
    /// Returns `None` when the primary code is not `SQLITE_CONSTRAINT` (19).
    pub const fn from_extended_code(code: i32) -> Option<Self> {
        if code & 0xff != 19 {
            return None;
        }
        Some(match code {
            2067 | 1555 => ConstraintKind::Unique,
            787 => ConstraintKind::ForeignKey,
            1299 => ConstraintKind::NotNull,
            _ => ConstraintKind::Other,
        })
    }
}

/// Coarse classification of a statement failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Any driver failure without a finer classification.
    Database,
    /// A constraint violation.
    Constraint(ConstraintKind),
    /// The `Cx` was cancelled.
    Cancelled,
    /// The `Cx` deadline passed.
    Timeout,
}

/// A statement failure with everything needed to reproduce it.
#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    /// Driver result code (SQLite extended code), if any.
    pub code: Option<i32>,
    /// The statement text.
    pub sql: Option<String>,
    /// Bound parameters, in order.
    pub params: Vec<Value>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// A query error with only a kind and message.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            sql: None,
            params: Vec::new(),
            source: None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(sql) = &self.sql {
            write!(f, " (query: {sql}; args: [")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str("])")?;
        }
        Ok(())
    }
}

// ============================================================================
// Not found
// ============================================================================

/// An update or delete addressed a row that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    pub table: String,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no rows affected in {}", self.table)
    }
}
