//! Relation-aware reads and writes for relmodel.
//!
//! This crate drives the statements rendered by `relmodel-query` through a
//! [`Connection`] and keeps relation fields in step with the database.
//!
//! # Design Philosophy
//!
//! - **Synchronous**: every operation blocks the caller; there is no
//!   background work and no state shared between calls.
//! - **Per-call options**: relation depth, paging and timeout come from the
//!   [`Options`] value, never from globals.
//! - **Bounded traversal**: relation loading stops when the depth reaches
//!   zero, backed by a [`ResolutionGuard`] that refuses to revisit a record
//!   at the same depth.
//! - **No hidden transactions**: a failure part way through relation
//!   synchronization leaves earlier statements applied. Wrap calls in a
//!   transaction when atomicity matters.
//!
//! # Example
//!
//! ```ignore
//! let cx = Cx::new();
//!
//! // Insert or update, then reconcile collection relations
//! upsert(&cx, &conn, &mut author)?;
//!
//! // Load with one hop of relations (the default)
//! let authors: Vec<Author> = query_many(&cx, &conn, &Options::default())?;
//!
//! // Remove by primary key
//! delete(&cx, &conn, &author)?;
//! ```

pub mod guard;
pub mod loader;
pub mod sync;

mod exec;

pub use guard::ResolutionGuard;
pub use sync::SaveMode;

use relmodel_core::{Connection, Cx, Error, Model, Result, Table};
use relmodel_query::{CountBuilder, DeleteBuilder, Options, SelectBuilder};

// ============================================================================
// Reads
// ============================================================================

/// First record matching `options`, with relations loaded.
#[tracing::instrument(level = "debug", skip(cx, conn, options), fields(table = M::table_schema().table))]
pub fn query_one<M: Table, C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    options: &Options,
) -> Result<Option<M>> {
    let mut record = M::default();
    if query_into(cx, conn, options, &mut record)? {
        Ok(Some(record))
    } else {
        Ok(None)
    }
}

/// Fill `record` from the first row matching `options`.
///
/// Returns `false`, leaving `record` untouched, when nothing matches.
#[tracing::instrument(level = "debug", skip(cx, conn, options, record), fields(table = M::table_schema().table))]
pub fn query_into<M: Table, C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    options: &Options,
    record: &mut M,
) -> Result<bool> {
    let d = M::descriptor()?;
    let cx = cx.child(options.timeout);
    let select = SelectBuilder::new(d, options).first();
    let (sql, params) = select.build()?;
    let Some(row) = exec::fetch(&cx, conn, &sql, &params)?.into_iter().next() else {
        return Ok(false);
    };
    exec::hydrate(d, record, &select.fields(), row)?;

    let mut guard = ResolutionGuard::new();
    loader::load_relations(&cx, conn, d, record, options.relation_depth, &mut guard)?;
    Ok(true)
}

/// Every record matching `options`, with relations loaded.
#[tracing::instrument(level = "debug", skip(cx, conn, options), fields(table = M::table_schema().table))]
pub fn query_many<M: Table, C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    options: &Options,
) -> Result<Vec<M>> {
    let d = M::descriptor()?;
    let cx = cx.child(options.timeout);
    let mut guard = ResolutionGuard::new();
    let records = loader::select_records(&cx, conn, d, options, &mut guard)?;
    tracing::debug!(count = records.len(), "Loaded records");
    records.into_iter().map(into_concrete::<M>).collect()
}

/// Number of records matching the filters of `options`.
///
/// Paging, ordering and projection are ignored.
#[tracing::instrument(level = "debug", skip(cx, conn, options), fields(table = M::table_schema().table))]
pub fn count<M: Table, C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    options: &Options,
) -> Result<i64> {
    let d = M::descriptor()?;
    let cx = cx.child(options.timeout);
    let (sql, params) = CountBuilder::new(d, options).build()?;
    exec::scalar_count(&exec::fetch(&cx, conn, &sql, &params)?)
}

fn into_concrete<M: Table>(record: Box<dyn Model>) -> Result<M> {
    record.downcast::<M>().map(|record| *record).map_err(|_| {
        Error::Custom(format!(
            "loaded record is not a {}",
            M::table_schema().type_name
        ))
    })
}

// ============================================================================
// Writes
// ============================================================================

/// Insert `record`, or update the row it conflicts with on its primary key
/// or a unique column, then reconcile its relations.
///
/// Unset primary keys are filled with the identity of the written row.
#[tracing::instrument(level = "debug", skip(cx, conn, record), fields(table = M::table_schema().table))]
pub fn upsert<M: Table, C: Connection + ?Sized>(cx: &Cx, conn: &C, record: &mut M) -> Result<()> {
    let d = M::descriptor()?;
    sync::save(cx, conn, d, record, SaveMode::Upsert, 0)?;
    tracing::info!(model = d.model_name(), "Upserted record");
    Ok(())
}

/// Like [`upsert`], but a key or unique conflict fails with a constraint
/// violation instead of updating.
#[tracing::instrument(level = "debug", skip(cx, conn, record), fields(table = M::table_schema().table))]
pub fn insert<M: Table, C: Connection + ?Sized>(cx: &Cx, conn: &C, record: &mut M) -> Result<()> {
    let d = M::descriptor()?;
    sync::save(cx, conn, d, record, SaveMode::Insert, 0)?;
    tracing::info!(model = d.model_name(), "Inserted record");
    Ok(())
}

/// Update `record`'s row by primary key. Relations are not touched.
///
/// Fails with [`Error::NotFound`] when no row has that key.
#[tracing::instrument(level = "debug", skip(cx, conn, record), fields(table = M::table_schema().table))]
pub fn update<M: Table, C: Connection + ?Sized>(cx: &Cx, conn: &C, record: &M) -> Result<()> {
    let d = M::descriptor()?;
    sync::update_row(cx, conn, d, record)?;
    tracing::info!(model = d.model_name(), "Updated record");
    Ok(())
}

/// Update `record`'s row, then reconcile its relations the way [`upsert`]
/// does.
#[tracing::instrument(level = "debug", skip(cx, conn, record), fields(table = M::table_schema().table))]
pub fn update_deep<M: Table, C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    record: &mut M,
) -> Result<()> {
    let d = M::descriptor()?;
    sync::save_prerequisites(cx, conn, d, record, 0)?;
    sync::update_row(cx, conn, d, record)?;
    sync::sync_collections(cx, conn, d, record)?;
    tracing::info!(model = d.model_name(), "Updated record and relations");
    Ok(())
}

/// Delete `record`'s row by primary key.
///
/// Records without a primary key, or with a zero key, are refused before
/// any statement runs. No matching row is [`Error::NotFound`].
#[tracing::instrument(level = "debug", skip(cx, conn, record), fields(table = M::table_schema().table))]
pub fn delete<M: Table, C: Connection + ?Sized>(cx: &Cx, conn: &C, record: &M) -> Result<()> {
    let d = M::descriptor()?;
    let (sql, params) = DeleteBuilder::new(d, record).build()?;
    let result = exec::execute(cx, conn, &sql, &params)?;
    if result.rows_affected == 0 {
        return Err(sync::not_found(d));
    }
    tracing::info!(model = d.model_name(), "Deleted record");
    Ok(())
}

#[cfg(test)]
mod mock;
