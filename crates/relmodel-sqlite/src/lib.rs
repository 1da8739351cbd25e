//! SQLite driver for relmodel.
//!
//! Implements [`relmodel_core::Connection`] on top of `rusqlite` with the
//! bundled SQLite library, so `INSERT ... ON CONFLICT ... DO UPDATE` with
//! several conflict targets is always available.
//!
//! - Parameters and results convert between [`relmodel_core::Value`] and
//!   SQLite's storage classes.
//! - Failures carry SQLite's extended result code; constraint failures are
//!   classified as unique, foreign-key or not-null violations.
//! - A progress handler interrupts a running statement when the caller's
//!   `Cx` is cancelled or past its deadline.

pub mod config;
pub mod connection;
pub mod error;
pub mod types;

pub use config::SqliteConfig;
pub use connection::SqliteConnection;
