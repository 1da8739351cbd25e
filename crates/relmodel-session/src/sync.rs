//! Relation synchronizer (write path).
//!
//! A save runs in three steps:
//!
//! 1. unsaved `has_one` records are saved first so their keys can be written
//!    into this row;
//! 2. the row itself is inserted or upserted and its identity resolved;
//! 3. on the top-level record only, collection relations are reconciled.
//!
//! Records saved on behalf of a relation are written once and never have
//! their own collections reconciled.

use crate::exec::{execute, fetch, scalar_count};
use crate::loader::slot_of;
use relmodel_core::{
    Connection, Cx, Error, ExecResult, FieldDescriptor, Junction, Model, ModelDescriptor,
    NotFoundError, QueryError, QueryErrorKind, RelationInfo, RelationKind, Result, Value,
};
use relmodel_query::{
    IdentityLookupBuilder, InsertBuilder, UpdateBuilder, junction_delete, junction_insert,
    junction_select,
};

/// How the row itself is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Update the existing row on a key or unique conflict.
    Upsert,
    /// Let conflicts surface as constraint violations.
    Insert,
}

/// Save `record` and, when `hop` is 0, reconcile its collection relations.
pub fn save<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    mode: SaveMode,
    hop: u32,
) -> Result<()> {
    save_prerequisites(cx, conn, d, record, hop)?;
    write_row(cx, conn, d, record, mode)?;
    if hop == 0 {
        sync_collections(cx, conn, d, record)?;
    }
    Ok(())
}

/// Save loaded `has_one` records that have no identity yet.
///
/// Records that already have one are left untouched.
pub fn save_prerequisites<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    hop: u32,
) -> Result<()> {
    for (field, info) in d.relations() {
        if !matches!(info.kind, RelationKind::HasOne) {
            continue;
        }
        let target = info.target.describe()?;
        let Some(nested) = slot_of(d, record, field)?.related_mut() else {
            continue;
        };
        if target.identity_is_set(&*nested)? {
            tracing::trace!(field = field.name, "Related record already saved");
            continue;
        }
        save(cx, conn, target, nested, SaveMode::Upsert, hop + 1)?;
    }
    Ok(())
}

fn write_row<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    mode: SaveMode,
) -> Result<()> {
    let had_identity = d.identity_is_set(&*record)?;
    let (sql, params) = {
        let builder = InsertBuilder::new(d, &*record);
        match mode {
            SaveMode::Upsert => builder.on_conflict_do_update().build()?,
            SaveMode::Insert => builder.build()?,
        }
    };
    let result = execute(cx, conn, &sql, &params)?;
    if had_identity || !d.has_primary_key() {
        return Ok(());
    }
    resolve_identity(cx, conn, d, record, result.last_insert_id)
}

/// Write the database-assigned identity back into unset key fields.
///
/// A row id is only trusted for a single unset integer key. Otherwise, and
/// whenever the statement took its update path, the row is looked up by its
/// own column values.
fn resolve_identity<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    last_insert_id: i64,
) -> Result<()> {
    let mut unset = Vec::new();
    for key in d.primary_keys() {
        let value = d.value_of(&*record, key)?;
        if value.is_zero() {
            unset.push((key, value));
        }
    }

    if last_insert_id != 0 {
        if let [(key, Value::Integer(_) | Value::Null)] = unset.as_slice() {
            tracing::trace!(field = key.name, id = last_insert_id, "Using row id");
            return d.set_value(record, key, Value::Integer(last_insert_id));
        }
    }

    let Some((sql, params)) = IdentityLookupBuilder::new(d, &*record).build()? else {
        return Ok(());
    };
    let Some(row) = fetch(cx, conn, &sql, &params)?.into_iter().next() else {
        tracing::debug!(table = d.table(), "Saved row not found by its values");
        return Ok(());
    };
    let keys: Vec<&FieldDescriptor> = d.primary_keys().collect();
    for (key, value) in keys.into_iter().zip(row.into_values()) {
        if unset.iter().any(|(k, _)| k.name == key.name) {
            d.set_value(record, key, value)?;
        }
    }
    Ok(())
}

/// Reconcile every `has_many` and `many_to_many` field of `record`.
pub fn sync_collections<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
) -> Result<()> {
    for (field, info) in d.relations() {
        match &info.kind {
            RelationKind::HasOne => {}
            RelationKind::HasMany { back_field, .. } => {
                sync_has_many(cx, conn, d, record, field, info, back_field)?;
            }
            RelationKind::ManyToMany(junction) => {
                sync_many_to_many(cx, conn, d, record, field, info, junction)?;
            }
        }
    }
    Ok(())
}

/// Save collection elements without an identity, pointing their
/// back-reference at `record`. Elements with an identity are skipped.
fn sync_has_many<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    field: &FieldDescriptor,
    info: &RelationInfo,
    back_field: &str,
) -> Result<()> {
    let parent_key = d.identity(&*record)?.into_iter().next().unwrap_or(Value::Null);
    let target = info.target.describe()?;
    let back = target.field(back_field).ok_or_else(|| {
        Error::config_field(target.model_name(), back_field, "back-reference field vanished")
    })?;

    let mut saved = 0usize;
    for child in slot_of(d, record, field)?.related_many_mut() {
        if target.identity_is_set(&*child)? {
            continue;
        }
        if parent_key.is_zero() {
            return Err(Error::Custom(format!(
                "cannot save {}.{} before {} has an identity",
                d.model_name(),
                field.name,
                d.model_name()
            )));
        }
        target.set_value(&mut *child, back, parent_key.clone())?;
        save(cx, conn, target, child, SaveMode::Upsert, 1)?;
        saved += 1;
    }
    tracing::debug!(field = field.name, saved = saved, "Synchronized has_many");
    Ok(())
}

/// Make the junction rows for `record` match the collection's identities.
fn sync_many_to_many<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    field: &FieldDescriptor,
    info: &RelationInfo,
    junction: &Junction,
) -> Result<()> {
    let parent = d.identity(&*record)?;
    if parent.is_empty() || parent.iter().any(Value::is_zero) {
        return Err(Error::Custom(format!(
            "cannot link {}.{} before {} has an identity",
            d.model_name(),
            field.name,
            d.model_name()
        )));
    }
    let target = info.target.describe()?;

    let mut desired: Vec<Vec<Value>> = Vec::new();
    for item in slot_of(d, record, field)?.related_many_mut() {
        if !target.identity_is_set(&*item)? {
            save(cx, conn, target, &mut *item, SaveMode::Upsert, 1)?;
        }
        let identity = target.identity(&*item)?;
        if !desired.contains(&identity) {
            desired.push(identity);
        }
    }

    let (sql, params) = junction_select(junction, &parent)?;
    let mut stored: Vec<Vec<Value>> = Vec::new();
    for row in fetch(cx, conn, &sql, &params)? {
        let identity: Vec<Value> = row.into_values().into_iter().map(Value::normalized).collect();
        if !stored.contains(&identity) {
            stored.push(identity);
        }
    }

    let mut inserted = 0usize;
    for identity in desired.iter().filter(|id| !stored.contains(id)) {
        let (sql, params) = junction_insert(junction, &parent, identity)?;
        let result = execute(cx, conn, &sql, &params)?;
        ensure_affected(result, &sql, &params)?;
        inserted += 1;
    }

    let mut deleted = 0usize;
    for identity in stored.iter().filter(|id| !desired.contains(id)) {
        let (sql, params) = junction_delete(junction, &parent, identity)?;
        let result = execute(cx, conn, &sql, &params)?;
        ensure_affected(result, &sql, &params)?;
        deleted += 1;
    }

    tracing::debug!(
        field = field.name,
        junction = %junction.table,
        inserted = inserted,
        deleted = deleted,
        kept = desired.len() - inserted,
        "Synchronized many_to_many"
    );
    Ok(())
}

fn ensure_affected(result: ExecResult, sql: &str, params: &[Value]) -> Result<()> {
    if result.rows_affected > 0 {
        return Ok(());
    }
    Err(Error::Query(QueryError::new(
        QueryErrorKind::Database,
        "junction statement affected no rows",
    ))
    .with_statement(sql, params))
}

/// Update `record`'s row by primary key.
///
/// A record with nothing but key columns is checked for existence instead.
pub fn update_row<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &dyn Model,
) -> Result<()> {
    let builder = UpdateBuilder::new(d, record);
    let found = match builder.build()? {
        Some((sql, params)) => execute(cx, conn, &sql, &params)?.rows_affected > 0,
        None => {
            let (sql, params) = builder.build_exists()?;
            scalar_count(&fetch(cx, conn, &sql, &params)?)? > 0
        }
    };
    if found { Ok(()) } else { Err(not_found(d)) }
}

pub(crate) fn not_found(d: &ModelDescriptor) -> Error {
    Error::NotFound(NotFoundError {
        table: d.table().to_string(),
    })
}
