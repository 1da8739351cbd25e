//! The `Model` trait, static record schemas and the `model!` declaration macro.
//!
//! Records are ordinary structs declared through [`model!`](crate::model).
//! The macro records each field's name, tag text, visibility and shape in a
//! static [`ModelSchema`], and implements by-name field access so the
//! introspector, loader and synchronizer can read and write fields without
//! knowing the concrete type.

use crate::descriptor::ModelDescriptor;
use crate::error::{Result, TypeError};
use crate::tag::{Tag, keys};
use crate::value::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// Shapes and field access
// ============================================================================

/// What a field holds, as far as relation mapping is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A plain column value.
    Scalar,
    /// A single related record (`Related<M>`).
    One,
    /// A collection of related records (`RelatedMany<M>`).
    Many,
}

impl FieldShape {
    pub const fn describe(self) -> &'static str {
        match self {
            FieldShape::Scalar => "scalar value",
            FieldShape::One => "Related<_>",
            FieldShape::Many => "RelatedMany<_>",
        }
    }
}

/// Dynamic access to one field of a record.
///
/// Scalars only implement the value methods. Relation slots also expose
/// their related records.
pub trait FieldValue {
    fn shape(&self) -> FieldShape;

    /// The value bound when this field is written to its column.
    fn to_value(&self) -> Value;

    /// Store a value read from the database.
    fn set_value(&mut self, value: Value) -> std::result::Result<(), TypeError>;

    fn related(&self) -> Option<&dyn Model> {
        None
    }

    fn related_mut(&mut self) -> Option<&mut dyn Model> {
        None
    }

    /// Replace the related record. Returns `false` if the record has the
    /// wrong type or this field is not a single relation.
    fn set_related(&mut self, _record: Option<Box<dyn Model>>) -> bool {
        false
    }

    fn related_many(&self) -> Vec<&dyn Model> {
        Vec::new()
    }

    fn related_many_mut(&mut self) -> Vec<&mut dyn Model> {
        Vec::new()
    }

    /// Replace the related collection. Returns `false` if any record has the
    /// wrong type or this field is not a collection relation.
    fn set_related_many(&mut self, _records: Vec<Box<dyn Model>>) -> bool {
        false
    }
}

/// Static facts about a field type, read by `model!`.
pub trait FieldType: FieldValue + Default + 'static {
    const SHAPE: FieldShape;

    /// Schema of the related record type, for relation slots.
    fn target() -> Option<&'static ModelSchema> {
        None
    }
}

// ============================================================================
// Model
// ============================================================================

/// A record type mapped to one table.
///
/// Implemented by [`model!`](crate::model); hand-written impls are possible
/// but must keep `field`/`field_mut` consistent with the schema.
pub trait Model: Any {
    /// The static schema of this record's type.
    fn schema(&self) -> &'static ModelSchema;

    /// Field by Rust name.
    fn field(&self, name: &str) -> Option<&dyn FieldValue>;

    /// Mutable field by Rust name.
    fn field_mut(&mut self, name: &str) -> Option<&mut dyn FieldValue>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// The table this record is stored in.
    fn table_name(&self) -> &'static str {
        self.schema().table
    }
}

impl dyn Model {
    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    pub fn downcast_mut<M: Model>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }

    /// Convert a boxed record back into its concrete type.
    pub fn downcast<M: Model>(self: Box<Self>) -> std::result::Result<Box<M>, Box<dyn Any>> {
        self.into_any().downcast::<M>()
    }
}

/// Type-level access to a record's schema.
pub trait Table: Model + Default {
    fn table_schema() -> &'static ModelSchema;

    /// Parsed descriptor of this record type.
    fn descriptor() -> Result<&'static ModelDescriptor> {
        Self::table_schema().describe()
    }
}

// ============================================================================
// Static schema
// ============================================================================

/// One field as written in the record declaration.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field name.
    pub name: &'static str,
    /// Raw tag text (`#[orm = "..."]`), empty when untagged.
    pub tag: &'static str,
    /// Whether the field is declared `pub`.
    pub public: bool,
    pub shape: FieldShape,
    /// Schema of the related record type, for relation slots.
    pub target: fn() -> Option<&'static ModelSchema>,
}

impl FieldDef {
    pub fn tag(&self) -> Tag<'static> {
        Tag::new(self.tag)
    }

    /// Whether this field is skipped entirely by the mapper.
    pub fn is_omitted(&self) -> bool {
        !self.public || self.tag().is_omitted()
    }

    /// Whether the tag names any relation kind.
    pub fn is_relation(&self) -> bool {
        let tag = self.tag();
        tag.has(keys::MANY_TO_MANY) || tag.has(keys::HAS_MANY) || tag.has(keys::HAS_ONE)
    }

    /// Whether this field is part of the record's primary key.
    pub fn is_primary(&self) -> bool {
        !self.is_omitted() && !self.is_relation() && self.tag().has(keys::PRIMARY)
    }

    /// Column name: `col=` override or the snake-cased field name.
    pub fn column(&self) -> String {
        match self.tag().get(keys::COLUMN) {
            Some(col) => col.to_string(),
            None => crate::identifiers::to_snake_case(self.name),
        }
    }
}

/// Static description of a record type, emitted by `model!`.
pub struct ModelSchema {
    pub table: &'static str,
    pub type_name: &'static str,
    pub fields: &'static [FieldDef],
    create: fn() -> Box<dyn Model>,
    type_id: fn() -> TypeId,
    descriptor: OnceLock<ModelDescriptor>,
}

impl ModelSchema {
    pub const fn new(
        table: &'static str,
        type_name: &'static str,
        fields: &'static [FieldDef],
        create: fn() -> Box<dyn Model>,
        type_id: fn() -> TypeId,
    ) -> Self {
        Self {
            table,
            type_name,
            fields,
            create,
            type_id,
            descriptor: OnceLock::new(),
        }
    }

    /// A fresh record of this type with every field at its default.
    pub fn create(&self) -> Box<dyn Model> {
        (self.create)()
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Parse this schema into a descriptor, once.
    ///
    /// Failed parses are not memoized; the error is returned on every call.
    pub fn describe(&'static self) -> Result<&'static ModelDescriptor> {
        if let Some(descriptor) = self.descriptor.get() {
            return Ok(descriptor);
        }
        let built = ModelDescriptor::build(self)?;
        Ok(self.descriptor.get_or_init(|| built))
    }

    /// Declared field by Rust name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary key fields, in declaration order.
    pub fn primary_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields.iter().filter(|f| f.is_primary())
    }
}

impl PartialEq for ModelSchema {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for ModelSchema {}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("table", &self.table)
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.iter().map(|d| d.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Whether a stringified visibility means the field is mapped.
///
/// Only plain `pub` counts; restricted visibilities are treated like private
/// fields.
pub const fn is_public(vis: &str) -> bool {
    let b = vis.as_bytes();
    b.len() == 3 && b[0] == b'p' && b[1] == b'u' && b[2] == b'b'
}

// ============================================================================
// Scalar fields
// ============================================================================

/// A Rust type stored in a single column.
pub trait ScalarValue: Sized {
    /// Name used in type mismatch messages.
    const TYPE_NAME: &'static str;

    fn to_value(&self) -> Value;

    /// Convert a stored value. NULL becomes the type's zero value.
    fn from_value(value: Value) -> std::result::Result<Self, TypeError>;
}

fn mismatch(expected: &str, found: &Value) -> TypeError {
    TypeError::conversion(expected, found.type_name())
}

fn integer_of(value: &Value, expected: &str) -> std::result::Result<i64, TypeError> {
    match value {
        Value::Null => Ok(0),
        Value::Integer(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        #[allow(clippy::cast_possible_truncation)]
        Value::Real(f) if f.fract() == 0.0 => Ok(*f as i64),
        Value::Text(s) => s.trim().parse().map_err(|_| mismatch(expected, value)),
        _ => Err(mismatch(expected, value)),
    }
}

macro_rules! scalar_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl ScalarValue for $t {
                const TYPE_NAME: &'static str = stringify!($t);

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
                    let i = integer_of(&value, Self::TYPE_NAME)?;
                    <$t>::try_from(i).map_err(|_| {
                        TypeError::conversion(Self::TYPE_NAME, format!("out of range integer {i}"))
                    })
                }
            }
        )*
    };
}

scalar_integer!(i64, i32, i16, i8, u32, u16, u8);

impl ScalarValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => integer_of(&other, Self::TYPE_NAME).map(|i| i != 0),
        }
    }
}

impl ScalarValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        match &value {
            Value::Null => Ok(0.0),
            Value::Real(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Text(s) => s.trim().parse().map_err(|_| mismatch(Self::TYPE_NAME, &value)),
            _ => Err(mismatch(Self::TYPE_NAME, &value)),
        }
    }
}

impl ScalarValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ScalarValue for String {
    const TYPE_NAME: &'static str = "String";

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) => Ok(s),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Real(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Blob(bytes) => String::from_utf8(bytes)
                .map_err(|_| TypeError::conversion(Self::TYPE_NAME, "non-utf8 blob")),
        }
    }
}

impl ScalarValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Blob(bytes) => Ok(bytes),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch(Self::TYPE_NAME, &other)),
        }
    }
}

impl<T: ScalarValue> ScalarValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ScalarValue::to_value)
    }

    fn from_value(value: Value) -> std::result::Result<Self, TypeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! scalar_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl FieldValue for $t {
                fn shape(&self) -> FieldShape {
                    FieldShape::Scalar
                }

                fn to_value(&self) -> Value {
                    ScalarValue::to_value(self)
                }

                fn set_value(&mut self, value: Value) -> std::result::Result<(), TypeError> {
                    *self = <$t as ScalarValue>::from_value(value)?;
                    Ok(())
                }
            }

            impl FieldType for $t {
                const SHAPE: FieldShape = FieldShape::Scalar;
            }
        )*
    };
}

scalar_field!(i64, i32, i16, i8, u32, u16, u8, bool, f64, f32, String, Vec<u8>);

impl<T: ScalarValue + 'static> FieldValue for Option<T> {
    fn shape(&self) -> FieldShape {
        FieldShape::Scalar
    }

    fn to_value(&self) -> Value {
        ScalarValue::to_value(self)
    }

    fn set_value(&mut self, value: Value) -> std::result::Result<(), TypeError> {
        *self = <Option<T> as ScalarValue>::from_value(value)?;
        Ok(())
    }
}

impl<T: ScalarValue + 'static> FieldType for Option<T> {
    const SHAPE: FieldShape = FieldShape::Scalar;
}

// ============================================================================
// Declaration macro
// ============================================================================

/// Declare a record type.
///
/// ```ignore
/// relmodel::model! {
///     #[table = "base_model"]
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Base {
///         #[orm = "primary,ref=base_id"]
///         pub id: i64,
///         #[orm = "unique"]
///         pub field: String,
///         #[orm = "many_to_many,table=mapping,field=base_id"]
///         pub others: RelatedMany<Other>,
///     }
/// }
/// ```
///
/// The struct must implement `Default`. Every field type must implement
/// [`FieldType`], including fields that are omitted from mapping.
#[macro_export]
macro_rules! model {
    (@tag) => { "" };
    (@tag $tag:literal) => { $tag };
    (
        $(#[doc = $sdoc:literal])*
        #[table = $table:literal]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[doc = $doc:literal])*
                $(#[orm = $tag:literal])?
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[doc = $sdoc])*
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[doc = $doc])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::Model for $name {
            fn schema(&self) -> &'static $crate::ModelSchema {
                <Self as $crate::Table>::table_schema()
            }

            #[allow(unused_variables)]
            fn field(&self, name: &str) -> ::std::option::Option<&dyn $crate::FieldValue> {
                $(
                    if name == stringify!($field) {
                        return ::std::option::Option::Some(&self.$field);
                    }
                )*
                ::std::option::Option::None
            }

            #[allow(unused_variables)]
            fn field_mut(
                &mut self,
                name: &str,
            ) -> ::std::option::Option<&mut dyn $crate::FieldValue> {
                $(
                    if name == stringify!($field) {
                        return ::std::option::Option::Some(&mut self.$field);
                    }
                )*
                ::std::option::Option::None
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }
        }

        impl $crate::Table for $name {
            fn table_schema() -> &'static $crate::ModelSchema {
                fn create() -> ::std::boxed::Box<dyn $crate::Model> {
                    ::std::boxed::Box::new(<$name as ::std::default::Default>::default())
                }

                fn type_id() -> ::std::any::TypeId {
                    ::std::any::TypeId::of::<$name>()
                }

                static SCHEMA: $crate::ModelSchema = $crate::ModelSchema::new(
                    $table,
                    stringify!($name),
                    &[
                        $(
                            $crate::FieldDef {
                                name: stringify!($field),
                                tag: $crate::model!(@tag $($tag)?),
                                public: $crate::model::is_public(stringify!($fvis)),
                                shape: <$fty as $crate::FieldType>::SHAPE,
                                target: <$fty as $crate::FieldType>::target,
                            },
                        )*
                    ],
                    create,
                    type_id,
                );
                &SCHEMA
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions() {
        assert_eq!(i64::from_value(Value::Integer(7)).unwrap(), 7);
        assert_eq!(i64::from_value(Value::Null).unwrap(), 0);
        assert_eq!(i32::from_value(Value::Text(" 12 ".into())).unwrap(), 12);
        assert_eq!(u8::from_value(Value::Real(3.0)).unwrap(), 3);
        assert!(u8::from_value(Value::Integer(300)).is_err());
        assert!(i64::from_value(Value::Blob(vec![1])).is_err());
    }

    #[test]
    fn test_option_keeps_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::Text("x".into())).unwrap(),
            Some("x".to_string())
        );
        assert_eq!(ScalarValue::to_value(&None::<i64>), Value::Null);
    }

    #[test]
    fn test_set_value_through_dyn() {
        let mut field = String::new();
        let dynamic: &mut dyn FieldValue = &mut field;
        dynamic.set_value(Value::Integer(5)).unwrap();
        assert_eq!(field, "5");

        let mut flag = false;
        (&mut flag as &mut dyn FieldValue)
            .set_value(Value::Integer(1))
            .unwrap();
        assert!(flag);
    }

    #[test]
    fn test_visibility() {
        assert!(is_public("pub"));
        assert!(!is_public(""));
        assert!(!is_public("pub(crate)"));
    }

    #[test]
    fn test_scalar_has_no_relations() {
        let mut v = 3_i64;
        assert!(v.related().is_none());
        assert!(!v.set_related(None));
        assert!(v.related_many_mut().is_empty());
    }
}
