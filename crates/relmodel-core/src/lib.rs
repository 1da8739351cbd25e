//! Core types and traits for relmodel.
//!
//! `relmodel-core` is the **foundation layer** of the workspace. It defines
//! the record contract, the introspector and the data types every other crate
//! builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Model`/`Table` are implemented by records declared
//!   with [`model!`]; `Connection` is implemented by database drivers.
//! - **Introspection**: the tag parser and [`ModelDescriptor`] turn a record
//!   type's declared fields into column and relation metadata, once per type.
//! - **Data model**: `Value` and `Row` carry statement parameters and results.
//! - **Cancellation**: `Cx` carries a deadline and a cancel flag into every
//!   operation.
//!
//! # Who Uses This Crate
//!
//! - `relmodel-query` renders SQL from `ModelDescriptor` metadata.
//! - `relmodel-session` loads and reconciles relations through `Connection`.
//! - `relmodel-sqlite` implements `Connection` on top of SQLite.
//!
//! Most applications should use the `relmodel` facade.

pub mod connection;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod model;
pub mod relationship;
pub mod row;
pub mod tag;
pub mod value;

pub use connection::{CancelHandle, Connection, Cx, ExecResult};
pub use descriptor::ModelDescriptor;
pub use error::{
    ConfigError, ConstraintKind, Error, NotFoundError, QueryError, QueryErrorKind, Result,
    TypeError,
};
pub use field::{FieldDescriptor, FieldKind};
pub use identifiers::{is_valid_identifier, is_valid_identifier_list, to_snake_case};
pub use model::{FieldDef, FieldShape, FieldType, FieldValue, Model, ModelSchema, ScalarValue, Table};
pub use relationship::{
    Junction, JunctionCondition, KeyColumn, Related, RelatedMany, RelationInfo, RelationKind,
};
pub use row::Row;
pub use tag::Tag;
pub use value::Value;
