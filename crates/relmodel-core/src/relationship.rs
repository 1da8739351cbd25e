//! Relation metadata and the relation slot types used in record fields.
//!
//! A record refers to other records through two slot types:
//!
//! - [`Related<M>`]: one related record plus the foreign key stored in this
//!   record's own table (`has_one`).
//! - [`RelatedMany<M>`]: a collection of related records, linked either by a
//!   back-reference column on the target table (`has_many`) or through a
//!   junction table (`many_to_many`).
//!
//! The introspector turns tags on those fields into a closed [`RelationKind`].

use crate::error::TypeError;
use crate::model::{FieldShape, FieldType, FieldValue, Model, ModelSchema, Table};
use crate::value::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};

// ============================================================================
// Metadata
// ============================================================================

/// A primary key column of a relation's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    /// Rust field name on the target.
    pub field: &'static str,
    /// Column in the target table.
    pub column: String,
    /// Junction column holding this key (`ref=`), if declared.
    pub reference: Option<String>,
}

/// Static condition that scopes a junction table (`condition:col=value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionCondition {
    pub column: String,
    pub value: Value,
}

/// A many-to-many junction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    /// Junction columns holding the parent's primary key, in key order.
    pub parent_columns: Vec<String>,
    /// Junction columns holding the target's primary key, in key order.
    pub target_columns: Vec<String>,
    pub condition: Option<JunctionCondition>,
}

/// How a relation field is linked to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// This record's column holds the target's primary key.
    HasOne,
    /// Target rows point back at this record through `back_column`.
    HasMany {
        /// Target field holding the back-reference.
        back_field: &'static str,
        back_column: String,
    },
    /// Rows of a junction table link this record to targets.
    ManyToMany(Junction),
}

impl RelationKind {
    pub const fn name(&self) -> &'static str {
        match self {
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany { .. } => "has_many",
            RelationKind::ManyToMany(_) => "many_to_many",
        }
    }
}

/// Parsed relation of one field.
#[derive(Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub kind: RelationKind,
    pub target: &'static ModelSchema,
    /// Target primary key columns, in declaration order.
    pub target_keys: Vec<KeyColumn>,
}

impl fmt::Debug for RelationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationInfo")
            .field("kind", &self.kind)
            .field("target", &self.target.type_name)
            .field("target_keys", &self.target_keys)
            .finish()
    }
}

// ============================================================================
// Related<M>
// ============================================================================

/// A single related record, with the foreign key that points at it.
///
/// The key is what gets written to this record's column. Once a record is
/// attached, its own primary key takes precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct Related<M> {
    key: Value,
    value: Option<Box<M>>,
}

impl<M> Default for Related<M> {
    fn default() -> Self {
        Self {
            key: Value::Null,
            value: None,
        }
    }
}

impl<M: Table> Related<M> {
    /// A slot holding a record.
    pub fn new(record: M) -> Self {
        Self {
            key: Value::Null,
            value: Some(Box::new(record)),
        }
    }

    /// A slot holding only a foreign key.
    pub fn from_key(key: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn get(&self) -> Option<&M> {
        self.value.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut M> {
        self.value.as_deref_mut()
    }

    pub fn set(&mut self, record: M) {
        self.value = Some(Box::new(record));
    }

    /// Drop both the record and the key.
    pub fn clear(&mut self) {
        self.key = Value::Null;
        self.value = None;
    }

    pub fn take(&mut self) -> Option<M> {
        self.value.take().map(|b| *b)
    }

    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    /// The foreign key value.
    pub fn key(&self) -> Value {
        if let Some(record) = &self.value {
            if let Some(pk) = M::table_schema().primary_fields().next() {
                if let Some(field) = record.field(pk.name) {
                    let value = field.to_value();
                    if !value.is_zero() {
                        return value;
                    }
                }
            }
        }
        self.key.clone()
    }
}

impl<M: Table> FieldValue for Related<M> {
    fn shape(&self) -> FieldShape {
        FieldShape::One
    }

    fn to_value(&self) -> Value {
        self.key()
    }

    fn set_value(&mut self, value: Value) -> Result<(), TypeError> {
        self.key = value.normalized();
        self.value = None;
        Ok(())
    }

    fn related(&self) -> Option<&dyn Model> {
        self.value.as_deref().map(|m| m as &dyn Model)
    }

    fn related_mut(&mut self) -> Option<&mut dyn Model> {
        self.value.as_deref_mut().map(|m| m as &mut dyn Model)
    }

    fn set_related(&mut self, record: Option<Box<dyn Model>>) -> bool {
        match record {
            None => {
                self.value = None;
                true
            }
            Some(record) => match record.downcast::<M>() {
                Ok(record) => {
                    self.value = Some(record);
                    true
                }
                Err(_) => false,
            },
        }
    }
}

impl<M: Table> FieldType for Related<M> {
    const SHAPE: FieldShape = FieldShape::One;

    fn target() -> Option<&'static ModelSchema> {
        Some(M::table_schema())
    }
}

// ============================================================================
// RelatedMany<M>
// ============================================================================

/// A collection of related records.
///
/// Dereferences to `Vec<M>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedMany<M> {
    items: Vec<M>,
}

impl<M> Default for RelatedMany<M> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<M> RelatedMany<M> {
    pub fn new(items: Vec<M>) -> Self {
        Self { items }
    }

    pub fn into_vec(self) -> Vec<M> {
        self.items
    }
}

impl<M> Deref for RelatedMany<M> {
    type Target = Vec<M>;

    fn deref(&self) -> &Vec<M> {
        &self.items
    }
}

impl<M> DerefMut for RelatedMany<M> {
    fn deref_mut(&mut self) -> &mut Vec<M> {
        &mut self.items
    }
}

impl<M> From<Vec<M>> for RelatedMany<M> {
    fn from(items: Vec<M>) -> Self {
        Self { items }
    }
}

impl<M> FromIterator<M> for RelatedMany<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<M> IntoIterator for RelatedMany<M> {
    type Item = M;
    type IntoIter = std::vec::IntoIter<M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, M> IntoIterator for &'a RelatedMany<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<M: Table> FieldValue for RelatedMany<M> {
    fn shape(&self) -> FieldShape {
        FieldShape::Many
    }

    fn to_value(&self) -> Value {
        Value::Null
    }

    fn set_value(&mut self, value: Value) -> Result<(), TypeError> {
        Err(TypeError::conversion(
            "a column value",
            format!("collection relation receiving {}", value.type_name()),
        ))
    }

    fn related_many(&self) -> Vec<&dyn Model> {
        self.items.iter().map(|m| m as &dyn Model).collect()
    }

    fn related_many_mut(&mut self) -> Vec<&mut dyn Model> {
        self.items.iter_mut().map(|m| m as &mut dyn Model).collect()
    }

    fn set_related_many(&mut self, records: Vec<Box<dyn Model>>) -> bool {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            match record.downcast::<M>() {
                Ok(record) => items.push(*record),
                Err(_) => return false,
            }
        }
        self.items = items;
        true
    }
}

impl<M: Table> FieldType for RelatedMany<M> {
    const SHAPE: FieldShape = FieldShape::Many;

    fn target() -> Option<&'static ModelSchema> {
        Some(M::table_schema())
    }
}
