//! Relation-aware record mapping for embedded SQLite databases.
//!
//! Declare record types with [`model!`], tag their fields, and read or write
//! whole aggregates: `has_one`, `has_many` and `many_to_many` relations are
//! loaded to a bounded depth on reads and reconciled on writes.
//!
//! # Example
//!
//! ```ignore
//! use relmodel::prelude::*;
//!
//! model! {
//!     #[table = "author"]
//!     #[derive(Debug, Default, Clone)]
//!     pub struct Author {
//!         #[orm = "primary,ref=author_id"]
//!         pub id: i64,
//!         #[orm = "unique"]
//!         pub name: String,
//!         #[orm = "many_to_many,table=author_tag"]
//!         pub tags: RelatedMany<Tag>,
//!     }
//! }
//!
//! let conn = SqliteConnection::open_memory()?;
//! let cx = Cx::new();
//! upsert(&cx, &conn, &mut author)?;
//! let authors: Vec<Author> = query_many(&cx, &conn, &Options::default())?;
//! ```
//!
//! # Crates
//!
//! - `relmodel-core`: record contract, introspection, values, errors
//! - `relmodel-query`: options and statement builders
//! - `relmodel-session`: reads, writes, relation loading and synchronization
//! - `relmodel-sqlite`: the SQLite driver (feature `sqlite`, on by default)

pub use relmodel_core::model;
pub use relmodel_core::{
    CancelHandle, ConfigError, Connection, ConstraintKind, Cx, Error, ExecResult, FieldDef,
    FieldDescriptor, FieldKind, FieldShape, FieldType, FieldValue, Junction, JunctionCondition,
    KeyColumn, Model, ModelDescriptor, ModelSchema, NotFoundError, QueryError, QueryErrorKind,
    Related, RelatedMany, RelationInfo, RelationKind, Result, Row, ScalarValue, Table, Tag,
    TypeError, Value,
};
pub use relmodel_query::{
    Cond, DEFAULT_RELATION_DEPTH, DEFAULT_TIMEOUT, Divider, Operator, Options, OrderBy,
    RelatedFilter, Where,
};
pub use relmodel_session::{
    ResolutionGuard, SaveMode, count, delete, insert, query_into, query_many, query_one, update,
    update_deep, upsert,
};
#[cfg(feature = "sqlite")]
pub use relmodel_sqlite::{SqliteConfig, SqliteConnection};

pub use relmodel_query as query;
pub use relmodel_session as session;
#[cfg(feature = "sqlite")]
pub use relmodel_sqlite as sqlite;

/// Everything needed to declare records and run operations.
pub mod prelude {
    pub use crate::model;
    pub use crate::{
        Cond, Connection, Cx, Divider, Error, Model, Operator, Options, OrderBy, Related,
        RelatedMany, Result, Table, Value, Where, count, delete, insert, query_into, query_many,
        query_one, update, update_deep, upsert,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteConfig, SqliteConnection};
}
