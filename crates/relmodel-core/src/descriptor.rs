//! Model introspection.
//!
//! [`ModelDescriptor::build`] walks a record type's declared fields in order
//! and classifies each one. Tag keywords are checked in priority order:
//! `many_to_many`, `has_many`, `has_one`, `primary`, otherwise a regular
//! column. Private fields and fields tagged `-` are omitted.
//!
//! Relation targets are inspected through their static field list rather
//! than their own descriptor, so self-referencing and mutually referencing
//! record types describe without recursion.

use crate::error::{Error, Result, TypeError};
use crate::field::{FieldDescriptor, FieldKind};
use crate::identifiers::is_valid_identifier;
use crate::model::{FieldDef, FieldShape, Model, ModelSchema};
use crate::relationship::{Junction, JunctionCondition, KeyColumn, RelationInfo, RelationKind};
use crate::tag::keys;
use crate::value::Value;

/// Parsed mapping of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub schema: &'static ModelSchema,
    /// Every declared field, in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    /// Classify every field of `schema`.
    pub fn build(schema: &'static ModelSchema) -> Result<Self> {
        let model = schema.type_name;
        if !is_valid_identifier(schema.table) {
            return Err(Error::config(
                model,
                format!("table name {:?} is not a valid identifier", schema.table),
            ));
        }

        let mut fields = Vec::with_capacity(schema.fields.len());
        for def in schema.fields {
            let column_name = def.column();
            if def.is_omitted() {
                fields.push(FieldDescriptor {
                    name: def.name,
                    column_name,
                    kind: FieldKind::Omitted,
                    unique: false,
                });
                continue;
            }
            ensure_identifier(model, def.name, "column", &column_name)?;

            let tag = def.tag();
            let kind = if tag.has(keys::MANY_TO_MANY) {
                expect_shape(model, def, FieldShape::Many)?;
                FieldKind::Relation(many_to_many(schema, def)?)
            } else if tag.has(keys::HAS_MANY) {
                expect_shape(model, def, FieldShape::Many)?;
                FieldKind::Relation(has_many(schema, def)?)
            } else if tag.has(keys::HAS_ONE) {
                expect_shape(model, def, FieldShape::One)?;
                FieldKind::Relation(has_one(schema, def)?)
            } else {
                expect_shape(model, def, FieldShape::Scalar)?;
                if tag.has(keys::PRIMARY) {
                    let reference = tag.get(keys::REFERENCE).map(str::to_string);
                    if let Some(r) = &reference {
                        ensure_identifier(model, def.name, "ref", r)?;
                    }
                    FieldKind::Primary { reference }
                } else {
                    FieldKind::Regular
                }
            };

            fields.push(FieldDescriptor {
                name: def.name,
                column_name,
                kind,
                unique: tag.has(keys::UNIQUE),
            });
        }

        tracing::debug!(
            model = model,
            table = schema.table,
            fields = fields.len(),
            "Described model"
        );

        Ok(Self { schema, fields })
    }

    pub fn table(&self) -> &'static str {
        self.schema.table
    }

    pub fn model_name(&self) -> &'static str {
        self.schema.type_name
    }

    /// Field by Rust name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary key fields, in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_primary())
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_keys().next().is_some()
    }

    /// Fields stored in this table's own columns.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_column())
    }

    /// Relation fields with their parsed relation.
    pub fn relations(&self) -> impl Iterator<Item = (&FieldDescriptor, &RelationInfo)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation().map(|info| (f, info)))
    }

    /// Current column value of a field.
    pub fn value_of(&self, record: &dyn Model, field: &FieldDescriptor) -> Result<Value> {
        record
            .field(field.name)
            .map(|f| f.to_value().normalized())
            .ok_or_else(|| self.missing_field(field.name))
    }

    /// Store a column value into a field.
    pub fn set_value(
        &self,
        record: &mut dyn Model,
        field: &FieldDescriptor,
        value: Value,
    ) -> Result<()> {
        let slot = record
            .field_mut(field.name)
            .ok_or_else(|| self.missing_field(field.name))?;
        slot.set_value(value)
            .map_err(|e| Error::Type(e.at(self.model_name(), field.name)))
    }

    /// Primary key values of `record`, in key order.
    pub fn identity(&self, record: &dyn Model) -> Result<Vec<Value>> {
        self.primary_keys()
            .map(|f| self.value_of(record, f))
            .collect()
    }

    /// Whether every primary key field of `record` holds a non-zero value.
    ///
    /// `false` for records without a primary key.
    pub fn identity_is_set(&self, record: &dyn Model) -> Result<bool> {
        let identity = self.identity(record)?;
        Ok(!identity.is_empty() && identity.iter().all(|v| !v.is_zero()))
    }

    fn missing_field(&self, name: &str) -> Error {
        Error::Custom(format!(
            "record of type {} does not expose field {}",
            self.model_name(),
            name
        ))
    }
}

// ============================================================================
// Classification helpers
// ============================================================================

fn ensure_identifier(model: &str, field: &str, what: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::config_field(
            model,
            field,
            format!("{what} {name:?} is not a valid identifier"),
        ))
    }
}

fn expect_shape(model: &str, def: &FieldDef, expected: FieldShape) -> Result<()> {
    if def.shape == expected {
        return Ok(());
    }
    let expected = match expected {
        FieldShape::Scalar => "a scalar value (relation slots need a relation keyword)",
        other => other.describe(),
    };
    Err(Error::Type(TypeError {
        model: model.to_string(),
        field: def.name.to_string(),
        expected: expected.to_string(),
        found: def.shape.describe().to_string(),
    }))
}

fn target_of(model: &str, def: &FieldDef) -> Result<&'static ModelSchema> {
    (def.target)().ok_or_else(|| {
        Error::config_field(model, def.name, "relation field has no target record type")
    })
}

/// Primary key columns of a target, read straight from its field list.
fn target_keys(target: &'static ModelSchema) -> Result<Vec<KeyColumn>> {
    target
        .primary_fields()
        .map(|f| {
            let column = f.column();
            ensure_identifier(target.type_name, f.name, "column", &column)?;
            let reference = f.tag().get(keys::REFERENCE).map(str::to_string);
            if let Some(r) = &reference {
                ensure_identifier(target.type_name, f.name, "ref", r)?;
            }
            Ok(KeyColumn {
                field: f.name,
                column,
                reference,
            })
        })
        .collect()
}

fn has_one(schema: &'static ModelSchema, def: &FieldDef) -> Result<RelationInfo> {
    let target = target_of(schema.type_name, def)?;
    let keys = target_keys(target)?;
    if keys.len() != 1 {
        return Err(Error::config_field(
            schema.type_name,
            def.name,
            format!(
                "has_one target {} must have exactly one primary field, found {}",
                target.type_name,
                keys.len()
            ),
        ));
    }
    Ok(RelationInfo {
        kind: RelationKind::HasOne,
        target,
        target_keys: keys,
    })
}

fn has_many(schema: &'static ModelSchema, def: &FieldDef) -> Result<RelationInfo> {
    let model = schema.type_name;
    let target = target_of(model, def)?;
    // The back-reference is a single foreign-key column.
    let parent_keys = schema.primary_fields().count();
    if parent_keys != 1 {
        return Err(Error::config_field(
            model,
            def.name,
            format!("has_many requires a single-column parent primary key, found {parent_keys}"),
        ));
    }

    let parent_type = schema.type_id();
    let back = target
        .fields
        .iter()
        .find(|f| {
            !f.is_omitted()
                && f.shape == FieldShape::One
                && (f.target)().is_some_and(|s| s.type_id() == parent_type)
        })
        .ok_or_else(|| {
            Error::config_field(
                model,
                def.name,
                format!(
                    "has_many target {} has no field of type Related<{}>",
                    target.type_name, model
                ),
            )
        })?;
    let back_column = back.column();
    ensure_identifier(target.type_name, back.name, "column", &back_column)?;

    Ok(RelationInfo {
        kind: RelationKind::HasMany {
            back_field: back.name,
            back_column,
        },
        target,
        target_keys: target_keys(target)?,
    })
}

fn many_to_many(schema: &'static ModelSchema, def: &FieldDef) -> Result<RelationInfo> {
    let model = schema.type_name;
    let tag = def.tag();
    let target = target_of(model, def)?;

    let table = tag.get(keys::TABLE).ok_or_else(|| {
        Error::config_field(model, def.name, "many_to_many requires a junction table (table=)")
    })?;
    ensure_identifier(model, def.name, "junction table", table)?;

    let parent_keys: Vec<&FieldDef> = schema.primary_fields().collect();
    if parent_keys.is_empty() {
        return Err(Error::config_field(
            model,
            def.name,
            "many_to_many requires the parent to have a primary key",
        ));
    }
    let parent_columns = match tag.get(keys::FIELD) {
        Some(column) => {
            if parent_keys.len() != 1 {
                return Err(Error::config_field(
                    model,
                    def.name,
                    "field= only applies to single-column keys; use ref= on each primary field",
                ));
            }
            ensure_identifier(model, def.name, "field", column)?;
            vec![column.to_string()]
        }
        None => parent_keys
            .iter()
            .map(|pk| {
                let reference = pk.tag().get(keys::REFERENCE).ok_or_else(|| {
                    Error::config_field(
                        model,
                        def.name,
                        format!(
                            "no junction column for parent key {}: set field= or ref= on it",
                            pk.name
                        ),
                    )
                })?;
                ensure_identifier(model, pk.name, "ref", reference)?;
                Ok(reference.to_string())
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let keys = target_keys(target)?;
    if keys.is_empty() {
        return Err(Error::config_field(
            model,
            def.name,
            format!("many_to_many target {} has no primary key", target.type_name),
        ));
    }
    let target_columns = keys
        .iter()
        .map(|k| {
            k.reference.clone().ok_or_else(|| {
                Error::config_field(
                    model,
                    def.name,
                    format!(
                        "target key {}.{} has no ref= junction column",
                        target.type_name, k.field
                    ),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let condition = match tag.get(keys::CONDITION) {
        Some(text) => Some(parse_condition(model, def.name, text)?),
        None => None,
    };

    Ok(RelationInfo {
        kind: RelationKind::ManyToMany(Junction {
            table: table.to_string(),
            parent_columns,
            target_columns,
            condition,
        }),
        target,
        target_keys: keys,
    })
}

/// Parse `column=value`. Quoted values are text, anything else must be an
/// integer.
fn parse_condition(model: &str, field: &str, text: &str) -> Result<JunctionCondition> {
    let Some((column, raw)) = text.split_once('=') else {
        return Err(Error::config_field(
            model,
            field,
            format!("condition {text:?} must have the form column=value"),
        ));
    };
    let column = column.trim();
    let raw = raw.trim();
    ensure_identifier(model, field, "condition column", column)?;
    if raw.is_empty() {
        return Err(Error::config_field(
            model,
            field,
            format!("condition on {column} has no value"),
        ));
    }

    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    let value = if quoted {
        Value::Text(raw[1..raw.len() - 1].to_string())
    } else {
        raw.parse::<i64>().map(Value::Integer).map_err(|_| {
            Error::config_field(
                model,
                field,
                format!("condition value {raw:?} is neither quoted text nor an integer"),
            )
        })?
    };
    Ok(JunctionCondition {
        column: column.to_string(),
        value,
    })
}
