//! Relation loader (read path).
//!
//! Selects records of one type and fills their relation fields, hop by hop,
//! until the remaining depth reaches zero:
//!
//! - `has_one`: a zero foreign key leaves the slot empty; otherwise the
//!   target is selected by primary key.
//! - `has_many`: targets whose back-reference column holds the parent's key.
//! - `many_to_many`: target keys are read from the junction table first; no
//!   links means an empty collection and no target query.

use crate::exec::{fetch, hydrate};
use crate::guard::ResolutionGuard;
use relmodel_core::{
    Connection, Cx, Error, FieldDescriptor, FieldValue, Model, ModelDescriptor, RelationInfo,
    RelationKind, Result, Value,
};
use relmodel_query::{Cond, Options, SelectBuilder, Where, junction_select};

/// Select records of `d`'s type and load their relations to
/// `options.relation_depth`.
pub fn select_records<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    options: &Options,
    guard: &mut ResolutionGuard,
) -> Result<Vec<Box<dyn Model>>> {
    let select = SelectBuilder::new(d, options);
    let (sql, params) = select.build()?;
    let fields = select.fields();
    let rows = fetch(cx, conn, &sql, &params)?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut record = d.schema.create();
        hydrate(d, record.as_mut(), &fields, row)?;
        load_relations(cx, conn, d, record.as_mut(), options.relation_depth, guard)?;
        records.push(record);
    }
    Ok(records)
}

/// Fill every relation field of `record`, recursing with `depth - 1`.
pub fn load_relations<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    depth: u32,
    guard: &mut ResolutionGuard,
) -> Result<()> {
    if depth == 0 || d.relations().next().is_none() {
        return Ok(());
    }
    let identity = d.identity(record)?;
    guard.enter(d.table(), &identity, depth)?;
    let result = load_each(cx, conn, d, record, &identity, depth, guard);
    guard.leave(d.table(), &identity, depth);
    result
}

fn load_each<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    d: &ModelDescriptor,
    record: &mut dyn Model,
    identity: &[Value],
    depth: u32,
    guard: &mut ResolutionGuard,
) -> Result<()> {
    for (field, info) in d.relations() {
        let target = info.target.describe()?;
        let child = Options::bare().with_depth(depth - 1);
        tracing::trace!(
            model = d.model_name(),
            field = field.name,
            relation = info.kind.name(),
            depth = depth,
            "Loading relation"
        );

        match &info.kind {
            RelationKind::HasOne => {
                let key = d.value_of(record, field)?;
                if key.is_zero() {
                    continue;
                }
                let options = child.with_where(target_key_filter(info, vec![key]));
                let found = select_records(cx, conn, target, &options, guard)?
                    .into_iter()
                    .next();
                if let Some(found) = found {
                    assign_one(d, record, field, found)?;
                }
            }
            RelationKind::HasMany { back_column, .. } => {
                let records = if identity.iter().all(Value::is_zero) {
                    Vec::new()
                } else {
                    let filter =
                        Where::new().with(back_column.as_str(), Cond::List(identity.to_vec()));
                    select_records(cx, conn, target, &child.with_where(filter), guard)?
                };
                assign_many(d, record, field, records)?;
            }
            RelationKind::ManyToMany(junction) => {
                let (sql, params) = junction_select(junction, identity)?;
                let keys: Vec<Value> = fetch(cx, conn, &sql, &params)?
                    .into_iter()
                    .flat_map(|row| row.into_values())
                    .map(Value::normalized)
                    .collect();
                let records = if keys.is_empty() {
                    Vec::new()
                } else {
                    let options = child.with_where(target_key_filter(info, keys));
                    select_records(cx, conn, target, &options, guard)?
                };
                assign_many(d, record, field, records)?;
            }
        }
    }
    Ok(())
}

/// `key IN (...)`, or a tuple match over `a,b` for composite target keys.
fn target_key_filter(info: &RelationInfo, keys: Vec<Value>) -> Where {
    let columns: Vec<&str> = info.target_keys.iter().map(|k| k.column.as_str()).collect();
    Where::new().with(columns.join(","), Cond::List(keys))
}

fn assign_one(
    d: &ModelDescriptor,
    record: &mut dyn Model,
    field: &FieldDescriptor,
    found: Box<dyn Model>,
) -> Result<()> {
    let slot = slot_of(d, record, field)?;
    if slot.set_related(Some(found)) {
        Ok(())
    } else {
        Err(mismatch(d, field))
    }
}

fn assign_many(
    d: &ModelDescriptor,
    record: &mut dyn Model,
    field: &FieldDescriptor,
    records: Vec<Box<dyn Model>>,
) -> Result<()> {
    let slot = slot_of(d, record, field)?;
    if slot.set_related_many(records) {
        Ok(())
    } else {
        Err(mismatch(d, field))
    }
}

pub(crate) fn slot_of<'r>(
    d: &ModelDescriptor,
    record: &'r mut dyn Model,
    field: &FieldDescriptor,
) -> Result<&'r mut dyn FieldValue> {
    record.field_mut(field.name).ok_or_else(|| {
        Error::Custom(format!(
            "record of type {} does not expose field {}",
            d.model_name(),
            field.name
        ))
    })
}

fn mismatch(d: &ModelDescriptor, field: &FieldDescriptor) -> Error {
    Error::Custom(format!(
        "{}.{} rejected records of its declared target type",
        d.model_name(),
        field.name
    ))
}
