//! Statement execution with cancellation checks and error context.

use relmodel_core::{Connection, Cx, Error, ExecResult, FieldDescriptor, Model, ModelDescriptor, Result, Row, Value};

pub(crate) fn fetch<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>> {
    cx.checkpoint()?;
    tracing::debug!(sql = %sql, params = params.len(), "Executing query");
    conn.query(cx, sql, params)
        .map_err(|e| e.with_statement(sql, params))
}

pub(crate) fn execute<C: Connection + ?Sized>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
) -> Result<ExecResult> {
    cx.checkpoint()?;
    tracing::debug!(sql = %sql, params = params.len(), "Executing statement");
    let result = conn
        .execute(cx, sql, params)
        .map_err(|e| e.with_statement(sql, params))?;
    tracing::trace!(
        rows_affected = result.rows_affected,
        last_insert_id = result.last_insert_id,
        "Statement done"
    );
    Ok(result)
}

/// Copy one row into `record`, column by column.
pub(crate) fn hydrate(
    d: &ModelDescriptor,
    record: &mut dyn Model,
    fields: &[&FieldDescriptor],
    row: Row,
) -> Result<()> {
    for (field, value) in fields.iter().zip(row.into_values()) {
        d.set_value(record, field, value)?;
    }
    Ok(())
}

/// Single integer result of a `COUNT(*)` query.
pub(crate) fn scalar_count(rows: &[Row]) -> Result<i64> {
    rows.first()
        .and_then(|row| row.get(0))
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Custom("count query returned no integer".to_string()))
}
