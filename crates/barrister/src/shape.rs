//! Target shapes and typed values.
//!
//! A [`Shape`] says what Rust-side representation a conversion should
//! produce; a [`TypedValue`] is the produced value. Together they replace
//! runtime reflection: handlers describe their parameters as shapes, and
//! receive typed values that are guaranteed to conform to both the shape
//! and the IDL.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Bit width of an integer target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    /// Inclusive bounds of the width
    pub fn bounds(self) -> (i64, i64) {
        match self {
            IntWidth::I8 => (i8::MIN as i64, i8::MAX as i64),
            IntWidth::I16 => (i16::MIN as i64, i16::MAX as i64),
            IntWidth::I32 => (i32::MIN as i64, i32::MAX as i64),
            IntWidth::I64 => (i64::MIN, i64::MAX),
        }
    }
}

/// Precision of a floating point target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// The desired representation of a converted value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String,
    Int(IntWidth),
    Float(FloatWidth),
    Bool,
    /// Nullable wrapper; the only shape that can hold an absent value
    Optional(Box<Shape>),
    Array(Box<Shape>),
    Record(RecordShape),
    /// Whatever the IDL declares for the field, resolved level by level
    Schema,
    /// Untyped passthrough: the wire value is returned unconverted
    Any,
}

impl Shape {
    pub fn int() -> Self {
        Shape::Int(IntWidth::I64)
    }

    pub fn float() -> Self {
        Shape::Float(FloatWidth::F64)
    }

    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    pub fn array(element: Shape) -> Self {
        Shape::Array(Box::new(element))
    }

    pub fn record<N, I, M>(name: N, members: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (M, Shape)>,
        M: Into<String>,
    {
        Shape::Record(RecordShape::new(name, members))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Shape::Optional(_))
    }

    /// The value an absent optional member takes when converted into this
    /// shape.
    pub fn zero_value(&self) -> TypedValue {
        match self {
            Shape::String => TypedValue::String(String::new()),
            Shape::Int(_) => TypedValue::Int(0),
            Shape::Float(_) => TypedValue::Float(0.0),
            Shape::Bool => TypedValue::Bool(false),
            Shape::Optional(_) | Shape::Schema => TypedValue::Null,
            Shape::Array(_) => TypedValue::Array(Vec::new()),
            Shape::Record(record) => TypedValue::Record(Record {
                name: record.name.clone(),
                fields: record
                    .members
                    .iter()
                    .map(|(name, shape)| (name.clone(), shape.zero_value()))
                    .collect(),
            }),
            Shape::Any => TypedValue::Raw(Value::Null),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::String => write!(f, "string"),
            Shape::Int(width) => {
                let bits = match width {
                    IntWidth::I8 => 8,
                    IntWidth::I16 => 16,
                    IntWidth::I32 => 32,
                    IntWidth::I64 => 64,
                };
                write!(f, "i{}", bits)
            }
            Shape::Float(FloatWidth::F32) => write!(f, "f32"),
            Shape::Float(FloatWidth::F64) => write!(f, "f64"),
            Shape::Bool => write!(f, "bool"),
            Shape::Optional(inner) => write!(f, "Option<{}>", inner),
            Shape::Array(inner) => write!(f, "Vec<{}>", inner),
            Shape::Record(record) => write!(f, "record {}", record.name),
            Shape::Schema => write!(f, "schema"),
            Shape::Any => write!(f, "any"),
        }
    }
}

/// A record target: a name for diagnostics plus its named members.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    pub name: String,
    pub members: IndexMap<String, Shape>,
}

impl RecordShape {
    pub fn new<N, I, M>(name: N, members: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (M, Shape)>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(member, shape)| (member.into(), shape))
                .collect(),
        }
    }

    /// Find the member for an IDL field name: exact name first, then the
    /// capitalised variant.
    pub fn member(&self, field_name: &str) -> Option<(&String, &Shape)> {
        self.members.get_key_value(field_name).or_else(|| {
            self.members
                .get_key_value(crate::idl::capitalize(field_name).as_str())
        })
    }
}

/// A schema-conformant value produced by conversion
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<TypedValue>),
    Record(Record),
    /// Unconverted wire value (from `Shape::Any`)
    Raw(Value),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            TypedValue::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Back to an untyped wire value. Non-finite floats have no JSON
    /// representation and become `null`.
    pub fn into_json(self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Bool(b) => Value::Bool(b),
            TypedValue::Int(n) => Value::Number(n.into()),
            TypedValue::Float(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
            TypedValue::String(s) => Value::String(s),
            TypedValue::Array(items) => {
                Value::Array(items.into_iter().map(TypedValue::into_json).collect())
            }
            TypedValue::Record(record) => Value::Object(
                record
                    .fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect::<Map<String, Value>>(),
            ),
            TypedValue::Raw(value) => value,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(n: i64) -> Self {
        TypedValue::Int(n)
    }
}

impl From<i32> for TypedValue {
    fn from(n: i32) -> Self {
        TypedValue::Int(n.into())
    }
}

impl From<f64> for TypedValue {
    fn from(n: f64) -> Self {
        TypedValue::Float(n)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Bool(b)
    }
}

impl From<Record> for TypedValue {
    fn from(record: Record) -> Self {
        TypedValue::Record(record)
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(items: Vec<T>) -> Self {
        TypedValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(TypedValue::Null, Into::into)
    }
}

/// A converted struct value. Members are keyed by the target shape's
/// member names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: IndexMap<String, TypedValue>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with(mut self, member: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.fields.insert(member.into(), value.into());
        self
    }

    pub fn get(&self, member: &str) -> Option<&TypedValue> {
        self.fields.get(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_display() {
        let shape = Shape::optional(Shape::array(Shape::Int(IntWidth::I32)));
        assert_eq!(shape.to_string(), "Option<Vec<i32>>");
        assert_eq!(Shape::record("Person", Vec::<(String, Shape)>::new()).to_string(), "record Person");
    }

    #[test]
    fn test_record_member_lookup_tolerates_capitalised_name() {
        let record = RecordShape::new("NoNesting", [("A", Shape::String), ("b", Shape::int())]);
        assert_eq!(record.member("a").map(|(k, _)| k.as_str()), Some("A"));
        assert_eq!(record.member("b").map(|(k, _)| k.as_str()), Some("b"));
        assert!(record.member("c").is_none());
    }

    #[test]
    fn test_zero_value_of_record() {
        let shape = Shape::record(
            "NoNesting",
            [
                ("A", Shape::String),
                ("B", Shape::int()),
                ("E", Shape::array(Shape::String)),
                ("F", Shape::optional(Shape::Bool)),
            ],
        );
        let zero = shape.zero_value().into_json();
        assert_eq!(zero, json!({"A": "", "B": 0, "E": [], "F": null}));
    }

    #[test]
    fn test_into_json() {
        let value = TypedValue::from(vec![Some(1.5), None]);
        assert_eq!(value.into_json(), json!([1.5, null]));
        assert_eq!(TypedValue::Float(f64::NAN).into_json(), Value::Null);
    }
}
