//! Parsed field metadata.

use crate::relationship::RelationInfo;

/// How a field takes part in mapping. A field has exactly one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain column.
    Regular,
    /// Part of the primary key.
    Primary {
        /// Junction column that holds this key (`ref=`).
        reference: Option<String>,
    },
    /// Not mapped (private field or `-` tag).
    Omitted,
    /// Relation to other records.
    Relation(RelationInfo),
}

/// Metadata about one field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name
    pub name: &'static str,
    /// Database column name
    pub column_name: String,
    pub kind: FieldKind,
    /// Whether the column has a unique constraint (`unique`)
    pub unique: bool,
}

impl FieldDescriptor {
    pub fn is_primary(&self) -> bool {
        matches!(self.kind, FieldKind::Primary { .. })
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self.kind, FieldKind::Omitted)
    }

    pub fn relation(&self) -> Option<&RelationInfo> {
        match &self.kind {
            FieldKind::Relation(info) => Some(info),
            _ => None,
        }
    }

    /// Whether this field is stored in a column of the record's own table.
    ///
    /// True for regular and primary fields and for `has_one` foreign keys.
    pub fn is_column(&self) -> bool {
        match &self.kind {
            FieldKind::Regular | FieldKind::Primary { .. } => true,
            FieldKind::Relation(info) => {
                matches!(info.kind, crate::relationship::RelationKind::HasOne)
            }
            FieldKind::Omitted => false,
        }
    }

    /// The `ref=` column of a primary field.
    pub fn reference(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Primary { reference } => reference.as_deref(),
            _ => None,
        }
    }
}
