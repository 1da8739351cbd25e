//! Statement builders.
//!
//! Each builder renders one parameterized statement for the embedded SQLite
//! dialect from a [`ModelDescriptor`] and, for writes, the record being
//! written. Builders never touch a connection.

use crate::clause::{Fragment, and_all, key_match, placeholders, render_where};
use crate::options::{Options, RelatedFilter};
use relmodel_core::{
    Error, FieldDescriptor, FieldKind, Junction, Model, ModelDescriptor, RelationKind, Result,
    Value, is_valid_identifier,
};

// ============================================================================
// SELECT / COUNT
// ============================================================================

/// SELECT query builder.
///
/// # Example
///
/// ```ignore
/// let select = SelectBuilder::new(descriptor, &options);
/// let (sql, params) = select.build()?;
/// let fields = select.fields(); // one per selected column, in order
/// ```
#[derive(Debug)]
pub struct SelectBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    options: &'a Options,
    first_only: bool,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, options: &'a Options) -> Self {
        Self {
            descriptor,
            options,
            first_only: false,
        }
    }

    /// Render `LIMIT 1` in place of the options' limit.
    ///
    /// `IN` lists are still capped by the options' limit, not by this one.
    pub fn first(mut self) -> Self {
        self.first_only = true;
        self
    }

    /// Fields read by this query, in column order.
    ///
    /// Primary keys are always included, whatever the allow-list says.
    pub fn fields(&self) -> Vec<&'a FieldDescriptor> {
        let allow = &self.options.columns;
        self.descriptor
            .columns()
            .filter(|f| {
                allow.is_empty()
                    || f.is_primary()
                    || allow
                        .iter()
                        .any(|c| c == &f.column_name || c.as_str() == f.name)
            })
            .collect()
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let d = self.descriptor;
        let fields = self.fields();
        let columns = if fields.is_empty() {
            // Every field is a collection relation; select the rowid so the
            // row count still drives how many records come back.
            "rowid".to_string()
        } else {
            fields
                .iter()
                .map(|f| f.column_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, d.table());
        let mut params = Vec::new();

        if let Some(filter) = where_clause(d, self.options)? {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            params.extend(filter.params);
        }

        if let Some(order) = &self.options.order_by {
            if !is_valid_identifier(&order.field) {
                return Err(Error::config(
                    d.model_name(),
                    format!("order field {:?} is not a valid column name", order.field),
                ));
            }
            let direction = match order.order.to_ascii_lowercase().as_str() {
                "" | "asc" => "ASC",
                "desc" => "DESC",
                other => {
                    return Err(Error::config(
                        d.model_name(),
                        format!("order direction {other:?} must be asc or desc"),
                    ));
                }
            };
            sql.push_str(&format!(" ORDER BY {} {}", order.field, direction));
        }

        let limit = if self.first_only { 1 } else { self.options.limit };
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
            if self.options.limit > 0 && self.options.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", self.options.offset));
            }
        }

        tracing::trace!(table = d.table(), sql = %sql, params = params.len(), "Built select");
        Ok((sql, params))
    }
}

/// COUNT query builder. Honors filters and related filters only.
#[derive(Debug)]
pub struct CountBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    options: &'a Options,
}

impl<'a> CountBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, options: &'a Options) -> Self {
        Self {
            descriptor,
            options,
        }
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.descriptor.table());
        let mut params = Vec::new();
        if let Some(filter) = where_clause(self.descriptor, self.options)? {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            params.extend(filter.params);
        }
        Ok((sql, params))
    }
}

/// User predicates AND-ed with every related filter.
fn where_clause(d: &ModelDescriptor, options: &Options) -> Result<Option<Fragment>> {
    let mut parts = Vec::new();
    if let Some(filter) = render_where(d.model_name(), &options.filter, options.divider, options.limit)?
    {
        parts.push(filter);
    }
    for related in &options.related {
        parts.push(related_filter(d, related)?);
    }
    Ok(and_all(parts))
}

/// Render a filter that keeps rows linked to `filter.keys` through a relation.
pub fn related_filter(d: &ModelDescriptor, filter: &RelatedFilter) -> Result<Fragment> {
    let model = d.model_name();
    let field = d.field(&filter.field).ok_or_else(|| {
        Error::config(model, format!("unknown relation field {:?}", filter.field))
    })?;
    let info = field.relation().ok_or_else(|| {
        Error::config_field(model, field.name, "related-to filter on a non-relation field")
    })?;
    let target_columns: Vec<&str> = info.target_keys.iter().map(|k| k.column.as_str()).collect();
    let primary: Vec<&str> = d.primary_keys().map(|f| f.column_name.as_str()).collect();

    match &info.kind {
        RelationKind::HasOne => key_match(model, &[field.column_name.as_str()], &filter.keys),
        RelationKind::HasMany { back_column, .. } => {
            let Some(pk) = primary.first() else {
                return Err(Error::config(model, "has_many filter needs a primary key"));
            };
            let inner = key_match(model, &target_columns, &filter.keys)?;
            Ok(Fragment::new(
                format!(
                    "{} IN (SELECT {} FROM {} WHERE {})",
                    pk, back_column, info.target.table, inner.sql
                ),
                inner.params,
            ))
        }
        RelationKind::ManyToMany(junction) => {
            let junction_targets: Vec<&str> =
                junction.target_columns.iter().map(String::as_str).collect();
            let matched = key_match(model, &junction_targets, &filter.keys)?;
            let mut parts = vec![matched];
            if let Some(cond) = &junction.condition {
                parts.push(Fragment::new(
                    format!("{} = ?", cond.column),
                    vec![cond.value.clone()],
                ));
            }
            let inner = and_all(parts).unwrap_or_default();
            Ok(Fragment::new(
                format!(
                    "{} IN (SELECT {} FROM {} WHERE {})",
                    tuple(&primary),
                    junction.parent_columns.join(", "),
                    junction.table,
                    inner.sql
                ),
                inner.params,
            ))
        }
    }
}

/// `a` or `(a, b)`.
fn tuple(columns: &[&str]) -> String {
    match columns {
        [single] => (*single).to_string(),
        _ => format!("({})", columns.join(", ")),
    }
}

// ============================================================================
// INSERT / UPSERT
// ============================================================================

/// Columns written when inserting `record`, with their values.
///
/// Primary keys are only written when non-zero, so the database assigns
/// identities for new rows. A zero `has_one` key is written as NULL.
pub fn insert_bindings<'d>(
    d: &'d ModelDescriptor,
    record: &dyn Model,
) -> Result<Vec<(&'d FieldDescriptor, Value)>> {
    let mut out = Vec::new();
    for field in d.columns() {
        let value = d.value_of(record, field)?;
        match &field.kind {
            FieldKind::Primary { .. } => {
                if !value.is_zero() {
                    out.push((field, value));
                }
            }
            FieldKind::Relation(_) => {
                let value = if value.is_zero() { Value::Null } else { value };
                out.push((field, value));
            }
            FieldKind::Regular => out.push((field, value)),
            FieldKind::Omitted => {}
        }
    }
    Ok(out)
}

/// INSERT query builder.
///
/// # Example
///
/// ```ignore
/// // Plain insert, conflicts surface as constraint violations
/// let (sql, params) = InsertBuilder::new(descriptor, &record).build()?;
///
/// // Upsert on the primary key and every unique column
/// let (sql, params) = InsertBuilder::new(descriptor, &record)
///     .on_conflict_do_update()
///     .build()?;
/// ```
pub struct InsertBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    record: &'a dyn Model,
    update_on_conflict: bool,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a dyn Model) -> Self {
        Self {
            descriptor,
            record,
            update_on_conflict: false,
        }
    }

    /// Update the existing row when the primary key or a unique column
    /// conflicts.
    ///
    /// One `ON CONFLICT` clause is emitted per conflict target: the primary
    /// key (when it is written) and each written unique column. Without any
    /// target the statement stays a plain insert.
    #[must_use]
    pub fn on_conflict_do_update(mut self) -> Self {
        self.update_on_conflict = true;
        self
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let d = self.descriptor;
        let bindings = insert_bindings(d, self.record)?;
        if bindings.is_empty() {
            return Ok((format!("INSERT INTO {} DEFAULT VALUES", d.table()), Vec::new()));
        }

        let columns: Vec<&str> = bindings.iter().map(|(f, _)| f.column_name.as_str()).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            d.table(),
            columns.join(", "),
            placeholders(columns.len())
        );
        let params: Vec<Value> = bindings.iter().map(|(_, v)| v.clone()).collect();

        if self.update_on_conflict {
            let mut targets = Vec::new();
            let primary: Vec<&str> = d.primary_keys().map(|f| f.column_name.as_str()).collect();
            let primary_written = bindings.iter().filter(|(f, _)| f.is_primary()).count();
            if !primary.is_empty() && primary_written == primary.len() {
                targets.push(primary.join(", "));
            }
            for (field, _) in &bindings {
                if field.unique && !field.is_primary() {
                    targets.push(field.column_name.clone());
                }
            }

            let updates: Vec<String> = bindings
                .iter()
                .filter(|(f, _)| !f.is_primary())
                .map(|(f, _)| format!("{0} = excluded.{0}", f.column_name))
                .collect();

            for target in targets {
                if updates.is_empty() {
                    sql.push_str(&format!(" ON CONFLICT ({target}) DO NOTHING"));
                } else {
                    sql.push_str(&format!(
                        " ON CONFLICT ({target}) DO UPDATE SET {}",
                        updates.join(", ")
                    ));
                }
            }
        }

        Ok((sql, params))
    }
}

/// Finds the identity of a row just upserted through its update path.
///
/// Matches on the written unique columns when there are any, otherwise on
/// every written non-key column, using `IS` so NULLs compare equal.
pub struct IdentityLookupBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    record: &'a dyn Model,
}

impl<'a> IdentityLookupBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a dyn Model) -> Self {
        Self { descriptor, record }
    }

    /// `None` when the record has no primary key or nothing to match on.
    pub fn build(&self) -> Result<Option<(String, Vec<Value>)>> {
        let d = self.descriptor;
        let primary: Vec<&str> = d.primary_keys().map(|f| f.column_name.as_str()).collect();
        if primary.is_empty() {
            return Ok(None);
        }
        let bindings: Vec<_> = insert_bindings(d, self.record)?
            .into_iter()
            .filter(|(f, _)| !f.is_primary())
            .collect();
        let unique: Vec<_> = bindings.iter().filter(|(f, _)| f.unique).cloned().collect();
        let matched = if unique.is_empty() { bindings } else { unique };
        if matched.is_empty() {
            return Ok(None);
        }

        let conditions: Vec<String> = matched
            .iter()
            .map(|(f, _)| format!("{} IS ?", f.column_name))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            primary.join(", "),
            d.table(),
            conditions.join(" AND ")
        );
        Ok(Some((sql, matched.into_iter().map(|(_, v)| v).collect())))
    }
}

// ============================================================================
// UPDATE / DELETE
// ============================================================================

/// `pk1 = ? AND pk2 = ?` over the record's primary key.
fn primary_match(d: &ModelDescriptor, record: &dyn Model, require_set: bool) -> Result<Fragment> {
    let model = d.model_name();
    let keys: Vec<&FieldDescriptor> = d.primary_keys().collect();
    if keys.is_empty() {
        return Err(Error::config(model, "model does not have a primary key"));
    }
    let mut conditions = Vec::with_capacity(keys.len());
    let mut params = Vec::with_capacity(keys.len());
    for key in keys {
        let value = d.value_of(record, key)?;
        if require_set && value.is_zero() {
            return Err(Error::config_field(
                model,
                key.name,
                "primary key has zero value",
            ));
        }
        conditions.push(format!("{} = ?", key.column_name));
        params.push(value);
    }
    Ok(Fragment::new(conditions.join(" AND "), params))
}

/// UPDATE query builder, keyed by the record's primary key.
pub struct UpdateBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    record: &'a dyn Model,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a dyn Model) -> Self {
        Self { descriptor, record }
    }

    /// `None` when the record has no column besides its key.
    pub fn build(&self) -> Result<Option<(String, Vec<Value>)>> {
        let d = self.descriptor;
        let key = primary_match(d, self.record, false)?;
        let bindings: Vec<_> = insert_bindings(d, self.record)?
            .into_iter()
            .filter(|(f, _)| !f.is_primary())
            .collect();
        if bindings.is_empty() {
            return Ok(None);
        }
        let sets: Vec<String> = bindings
            .iter()
            .map(|(f, _)| format!("{} = ?", f.column_name))
            .collect();
        let mut params: Vec<Value> = bindings.into_iter().map(|(_, v)| v).collect();
        params.extend(key.params);
        let sql = format!("UPDATE {} SET {} WHERE {}", d.table(), sets.join(", "), key.sql);
        Ok(Some((sql, params)))
    }

    /// `SELECT COUNT(*)` by primary key, used when there is nothing to set.
    pub fn build_exists(&self) -> Result<(String, Vec<Value>)> {
        let d = self.descriptor;
        let key = primary_match(d, self.record, false)?;
        Ok((
            format!("SELECT COUNT(*) FROM {} WHERE {}", d.table(), key.sql),
            key.params,
        ))
    }
}

/// DELETE query builder, keyed by the record's primary key.
///
/// Refuses records without a primary key or with a zero key value.
pub struct DeleteBuilder<'a> {
    descriptor: &'a ModelDescriptor,
    record: &'a dyn Model,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a dyn Model) -> Self {
        Self { descriptor, record }
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let key = primary_match(self.descriptor, self.record, true)?;
        Ok((
            format!("DELETE FROM {} WHERE {}", self.descriptor.table(), key.sql),
            key.params,
        ))
    }
}

// ============================================================================
// Junction tables
// ============================================================================

fn check_arity(junction: &Junction, columns: &[String], values: &[Value]) -> Result<()> {
    if columns.len() == values.len() {
        Ok(())
    } else {
        Err(Error::config(
            &junction.table,
            format!(
                "junction expects {} key values for ({}), got {}",
                columns.len(),
                columns.join(", "),
                values.len()
            ),
        ))
    }
}

fn junction_scope(junction: &Junction, parent: &[Value]) -> Result<Fragment> {
    check_arity(junction, &junction.parent_columns, parent)?;
    let mut conditions: Vec<String> = junction
        .parent_columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect();
    let mut params: Vec<Value> = parent.iter().cloned().map(Value::normalized).collect();
    if let Some(cond) = &junction.condition {
        conditions.push(format!("{} = ?", cond.column));
        params.push(cond.value.clone());
    }
    Ok(Fragment::new(conditions.join(" AND "), params))
}

/// Target identities linked to `parent`.
pub fn junction_select(junction: &Junction, parent: &[Value]) -> Result<(String, Vec<Value>)> {
    let scope = junction_scope(junction, parent)?;
    Ok((
        format!(
            "SELECT {} FROM {} WHERE {}",
            junction.target_columns.join(", "),
            junction.table,
            scope.sql
        ),
        scope.params,
    ))
}

/// Link `parent` to `target`, writing the static condition value if any.
pub fn junction_insert(
    junction: &Junction,
    parent: &[Value],
    target: &[Value],
) -> Result<(String, Vec<Value>)> {
    check_arity(junction, &junction.parent_columns, parent)?;
    check_arity(junction, &junction.target_columns, target)?;
    let mut columns: Vec<&str> = junction.target_columns.iter().map(String::as_str).collect();
    let mut params: Vec<Value> = target.iter().cloned().map(Value::normalized).collect();
    if let Some(cond) = &junction.condition {
        columns.push(&cond.column);
        params.push(cond.value.clone());
    }
    columns.extend(junction.parent_columns.iter().map(String::as_str));
    params.extend(parent.iter().cloned().map(Value::normalized));
    Ok((
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            junction.table,
            columns.join(", "),
            placeholders(columns.len())
        ),
        params,
    ))
}

/// Unlink `target` from `parent`.
pub fn junction_delete(
    junction: &Junction,
    parent: &[Value],
    target: &[Value],
) -> Result<(String, Vec<Value>)> {
    check_arity(junction, &junction.target_columns, target)?;
    let scope = junction_scope(junction, parent)?;
    let mut conditions: Vec<String> = junction
        .target_columns
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect();
    conditions.push(scope.sql);
    let mut params: Vec<Value> = target.iter().cloned().map(Value::normalized).collect();
    params.extend(scope.params);
    Ok((
        format!(
            "DELETE FROM {} WHERE {}",
            junction.table,
            conditions.join(" AND ")
        ),
        params,
    ))
}
