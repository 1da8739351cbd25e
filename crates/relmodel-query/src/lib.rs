//! SQL rendering for relmodel.
//!
//! `relmodel-query` turns [`ModelDescriptor`](relmodel_core::ModelDescriptor)
//! metadata and per-call [`Options`] into parameterized statements for the
//! embedded SQLite dialect. It never executes anything; `relmodel-session`
//! feeds the rendered `(sql, params)` pairs to a `Connection`.
//!
//! # Statements
//!
//! - [`SelectBuilder`] / [`CountBuilder`]: filtered, ordered, paged reads
//! - [`InsertBuilder`]: plain insert or upsert on key and unique conflicts
//! - [`UpdateBuilder`] / [`DeleteBuilder`]: writes keyed by primary key
//! - [`IdentityLookupBuilder`]: find the key of a row upserted by update
//! - [`junction_select`], [`junction_insert`], [`junction_delete`]:
//!   many-to-many link rows
//!
//! Every identifier that reaches SQL text is either taken from a validated
//! descriptor or checked against `[A-Za-z_][A-Za-z0-9_]*` here; values are
//! always bound as parameters.

pub mod builder;
pub mod clause;
pub mod options;

pub use builder::{
    CountBuilder, DeleteBuilder, IdentityLookupBuilder, InsertBuilder, SelectBuilder,
    UpdateBuilder, insert_bindings, junction_delete, junction_insert, junction_select,
    related_filter,
};
pub use clause::{Fragment, and_all, key_match, placeholders, render_where};
pub use options::{
    Cond, DEFAULT_RELATION_DEPTH, DEFAULT_TIMEOUT, Divider, Operator, Options, OrderBy,
    RelatedFilter, Where,
};
