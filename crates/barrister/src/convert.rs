//! # Schema-directed conversion
//!
//! Converts untyped wire values (`serde_json::Value`) into [`TypedValue`]s
//! that conform to an IDL [`Field`] and a desired [`Shape`]. Conversion is
//! recursive: arrays and structs spawn child conversions with an extended
//! path, so every failure points at the exact offending value.
//!
//! Policy, in order:
//! 1. `Shape::Schema` is resolved into the concrete shape the IDL implies.
//! 2. Null is accepted only for an optional field into an `Optional` shape.
//! 3. `Shape::Any` returns the value unconverted.
//! 4. Scalars, arrays and records are converted by desired kind; the
//!    primitive produced must agree with the field's declared type.
//! 5. Anything else is a [`TypeError`].
//!
//! The engine reads the schema, allocates only call-scoped state and never
//! panics on malformed input.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::idl::{Field, Idl, capitalize};
use crate::shape::{FloatWidth, Record, RecordShape, Shape, TypedValue};

/// Convert `value` against `field` into `desired`.
pub fn convert(
    idl: &Idl,
    field: &Field,
    desired: &Shape,
    value: &Value,
    path: &str,
) -> Result<TypedValue, TypeError> {
    Convert::new(idl, field, desired, value, path.to_string()).run()
}

/// Validate a typed value against `field` and produce its canonical wire
/// form, keyed by IDL field names.
pub fn to_wire(idl: &Idl, field: &Field, value: TypedValue, path: &str) -> Result<Value, TypeError> {
    let raw = value.into_json();
    convert(idl, field, &Shape::Schema, &raw, path).map(TypedValue::into_json)
}

/// One conversion task
pub struct Convert<'a> {
    idl: &'a Idl,
    field: &'a Field,
    desired: &'a Shape,
    value: &'a Value,
    path: String,
}

impl<'a> Convert<'a> {
    pub fn new(
        idl: &'a Idl,
        field: &'a Field,
        desired: &'a Shape,
        value: &'a Value,
        path: String,
    ) -> Self {
        Self {
            idl,
            field,
            desired,
            value,
            path,
        }
    }

    pub fn run(&self) -> Result<TypedValue, TypeError> {
        if let Shape::Schema = self.desired {
            let resolved = self.schema_shape()?;
            return self.with_shape(&resolved).run();
        }

        if self.value.is_null() {
            return match self.desired {
                Shape::Optional(_) | Shape::Any if self.field.optional => Ok(TypedValue::Null),
                _ => Err(self.error("null not allowed")),
            };
        }

        match (self.desired, self.value) {
            (Shape::Any, value) => Ok(TypedValue::Raw(value.clone())),
            (Shape::Optional(inner), _) => self.with_shape(inner).run(),
            (Shape::String, Value::String(s)) => self.convert_string(s),
            (Shape::Int(width), Value::Number(n)) => {
                let Some(int) = n.as_i64().or_else(|| whole_float(n.as_f64())) else {
                    return Err(self.unable());
                };
                let (min, max) = width.bounds();
                if int < min || int > max {
                    return Err(self.error(format!("{} out of range for {}", int, self.desired)));
                }
                self.checked("int", TypedValue::Int(int))
            }
            (Shape::Float(width), Value::Number(n)) => {
                let Some(float) = n.as_f64() else {
                    return Err(self.unable());
                };
                let float = match width {
                    FloatWidth::F32 => float as f32 as f64,
                    FloatWidth::F64 => float,
                };
                self.checked("float", TypedValue::Float(float))
            }
            (Shape::Bool, Value::Bool(b)) => self.checked("bool", TypedValue::Bool(*b)),
            (Shape::Array(element), Value::Array(items)) if self.field.is_array => {
                self.convert_array(element, items)
            }
            (Shape::Record(record), Value::Object(map)) if !self.field.is_array => {
                self.convert_struct(record, map)
            }
            _ => Err(self.unable()),
        }
    }

    fn with_shape<'b>(&'b self, desired: &'b Shape) -> Convert<'b> {
        Convert::new(self.idl, self.field, desired, self.value, self.path.clone())
    }

    /// The concrete shape the IDL implies for this field at this level.
    /// Struct members stay `Schema` and are resolved when reached.
    fn schema_shape(&self) -> Result<Shape, TypeError> {
        let base = if self.field.is_array {
            Shape::array(Shape::Schema)
        } else {
            match self.field.type_name.as_str() {
                "string" => Shape::String,
                "int" => Shape::int(),
                "float" => Shape::float(),
                "bool" => Shape::Bool,
                name if self.idl.enum_values(name).is_some() => Shape::String,
                name => {
                    let def = self.idl.struct_def(name).ok_or_else(|| {
                        self.error(format!("Struct not found in IDL: {}", name))
                    })?;
                    Shape::Record(RecordShape::new(
                        name,
                        def.computed_fields()
                            .keys()
                            .map(|member| (member.clone(), Shape::Schema)),
                    ))
                }
            }
        };
        Ok(if self.field.optional {
            Shape::optional(base)
        } else {
            base
        })
    }

    fn convert_string(&self, s: &str) -> Result<TypedValue, TypeError> {
        if self.field.type_name != "string" {
            if let Some(values) = self.idl.enum_values(&self.field.type_name) {
                if values.iter().any(|v| v.value == s) {
                    return Ok(TypedValue::String(s.to_string()));
                }
                let allowed: Vec<&str> = values.iter().map(|v| v.value.as_str()).collect();
                return Err(self.error(format!(
                    "Value {} not in enum values: [{}]",
                    s,
                    allowed.join(", ")
                )));
            }
        }
        self.checked("string", TypedValue::String(s.to_string()))
    }

    fn convert_array(&self, element: &Shape, items: &[Value]) -> Result<TypedValue, TypeError> {
        let element_field = self.field.element();
        let mut converted = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let path = format!("{}[{}]", self.path, i);
            converted.push(Convert::new(self.idl, &element_field, element, item, path).run()?);
        }
        Ok(TypedValue::Array(converted))
    }

    fn convert_struct(
        &self,
        record: &RecordShape,
        map: &Map<String, Value>,
    ) -> Result<TypedValue, TypeError> {
        let type_name = &self.field.type_name;
        let def = self
            .idl
            .struct_def(type_name)
            .ok_or_else(|| self.error(format!("Struct not found in IDL: {}", type_name)))?;

        let mut converted: IndexMap<String, TypedValue> = IndexMap::new();
        for (name, struct_field) in def.computed_fields() {
            let (member, member_shape) = record.member(name).ok_or_else(|| {
                self.error(format!(
                    "Struct: {} is missing required field: {}",
                    record.name, name
                ))
            })?;

            let value = match lookup_key(map, name) {
                Some(value) => {
                    let path = format!("{}.{}", self.path, name);
                    Convert::new(self.idl, struct_field, member_shape, value, path).run()?
                }
                None if struct_field.optional => member_shape.zero_value(),
                None => {
                    return Err(self.error(format!(
                        "Struct value: {} is missing required field: {}",
                        type_name, name
                    )));
                }
            };
            converted.insert(member.clone(), value);
        }

        // Emit members in the target's declared order; members the IDL does
        // not know about keep their zero value.
        let fields = record
            .members
            .iter()
            .map(|(member, shape)| {
                let value = converted
                    .swap_remove(member)
                    .unwrap_or_else(|| shape.zero_value());
                (member.clone(), value)
            })
            .collect();

        Ok(TypedValue::Record(Record {
            name: def.name.clone(),
            fields,
        }))
    }

    /// Accept `value` only if the field declares the primitive we produced.
    fn checked(&self, produced: &str, value: TypedValue) -> Result<TypedValue, TypeError> {
        if self.field.type_name != produced {
            return Err(self.error(format!(
                "Type mismatch for '{}' - Expected: {} Got: {}",
                self.path, self.field.type_name, produced
            )));
        }
        Ok(value)
    }

    fn unable(&self) -> TypeError {
        self.error(format!(
            "Unable to convert: {} - {} to {}",
            self.path,
            kind_of(self.value),
            self.desired
        ))
    }

    fn error(&self, msg: impl Into<String>) -> TypeError {
        TypeError::new(self.path.clone(), msg)
    }
}

fn lookup_key<'v>(map: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    map.get(name).or_else(|| map.get(&capitalize(name)))
}

fn whole_float(value: Option<f64>) -> Option<i64> {
    let f = value?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::{EnumDef, EnumValue, IdlElement, Struct};
    use crate::shape::IntWidth;
    use serde_json::json;

    fn test_idl() -> Idl {
        Idl::build(vec![
            IdlElement::Struct(Struct::new(
                "NoNesting",
                vec![
                    Field::new("a", "string").optional(),
                    Field::new("b", "int").optional(),
                    Field::new("C", "float").optional(),
                    Field::new("d", "bool").optional(),
                    Field::new("E", "string").optional().array(),
                ],
            )),
            IdlElement::Struct(Struct::new(
                "Nested",
                vec![
                    Field::new("name", "string"),
                    Field::new("Nest", "NoNesting"),
                ],
            )),
            IdlElement::Struct(
                Struct::new("Extended", vec![Field::new("extra", "int")]).extending("Nested"),
            ),
            IdlElement::Enum(EnumDef {
                name: "StringAlias".into(),
                comment: String::new(),
                values: vec![EnumValue::new("blah"), EnumValue::new("foo")],
            }),
        ])
        .unwrap()
    }

    fn no_nesting_shape() -> Shape {
        Shape::record(
            "NoNesting",
            [
                ("A", Shape::String),
                ("B", Shape::int()),
                ("C", Shape::float()),
                ("D", Shape::Bool),
                ("E", Shape::array(Shape::String)),
            ],
        )
    }

    fn nested_shape() -> Shape {
        Shape::record("Nested", [("Name", Shape::String), ("Nest", no_nesting_shape())])
    }

    fn no_nesting(a: &str, b: i64, c: f64, d: bool, e: Vec<&str>) -> TypedValue {
        Record::new("NoNesting")
            .with("A", a)
            .with("B", b)
            .with("C", c)
            .with("D", d)
            .with("E", e)
            .into()
    }

    #[test]
    fn test_scalars_convert_losslessly() {
        let idl = test_idl();
        let cases = [
            (Field::new("", "string"), Shape::String, json!("hi"), TypedValue::from("hi")),
            (Field::new("", "int"), Shape::int(), json!(-42), TypedValue::Int(-42)),
            (Field::new("", "float"), Shape::float(), json!(2.5), TypedValue::Float(2.5)),
            (Field::new("", "bool"), Shape::Bool, json!(true), TypedValue::Bool(true)),
        ];
        for (field, shape, input, expected) in cases {
            assert_eq!(convert(&idl, &field, &shape, &input, "v").unwrap(), expected);
        }
    }

    #[test]
    fn test_string_rejects_number() {
        let idl = test_idl();
        let err = convert(&idl, &Field::new("", "string"), &Shape::String, &json!(10), "p")
            .unwrap_err();
        assert_eq!(err.path, "p");
        assert!(err.msg.contains("int to string"), "{}", err.msg);
    }

    #[test]
    fn test_int_accepts_whole_floats_only() {
        let idl = test_idl();
        let field = Field::new("", "int");
        assert_eq!(
            convert(&idl, &field, &Shape::int(), &json!(3.0), "p").unwrap(),
            TypedValue::Int(3)
        );
        assert!(convert(&idl, &field, &Shape::int(), &json!(3.5), "p").is_err());
    }

    #[test]
    fn test_int_narrowing_is_range_checked() {
        let idl = test_idl();
        let field = Field::new("", "int");
        let i8_shape = Shape::Int(IntWidth::I8);
        assert_eq!(
            convert(&idl, &field, &i8_shape, &json!(-128), "p").unwrap(),
            TypedValue::Int(-128)
        );
        let err = convert(&idl, &field, &i8_shape, &json!(300), "p").unwrap_err();
        assert_eq!(err.msg, "300 out of range for i8");
    }

    #[test]
    fn test_float_promotes_ints_and_narrows() {
        let idl = test_idl();
        let field = Field::new("", "float");
        assert_eq!(
            convert(&idl, &field, &Shape::float(), &json!(7), "p").unwrap(),
            TypedValue::Float(7.0)
        );
        let narrowed = convert(&idl, &field, &Shape::Float(FloatWidth::F32), &json!(0.1), "p")
            .unwrap();
        assert_eq!(narrowed, TypedValue::Float(0.1f32 as f64));
    }

    #[test]
    fn test_declared_type_must_match_produced_kind() {
        let idl = test_idl();
        let err = convert(&idl, &Field::new("", "int"), &Shape::String, &json!("5"), "p")
            .unwrap_err();
        assert_eq!(err.msg, "Type mismatch for 'p' - Expected: int Got: string");
    }

    #[test]
    fn test_null_handling() {
        let idl = test_idl();
        let optional = Field::new("", "string").optional();
        let required = Field::new("", "string");
        let nullable = Shape::optional(Shape::String);

        assert_eq!(
            convert(&idl, &optional, &nullable, &Value::Null, "p").unwrap(),
            TypedValue::Null
        );
        let err = convert(&idl, &required, &nullable, &Value::Null, "p").unwrap_err();
        assert_eq!(err.msg, "null not allowed");
        // optional field, but the target cannot hold an absent value
        assert!(convert(&idl, &optional, &Shape::String, &Value::Null, "p").is_err());
    }

    #[test]
    fn test_optional_shape_unwraps_present_value() {
        let idl = test_idl();
        let field = Field::new("", "string").optional();
        let shape = Shape::optional(Shape::String);
        assert_eq!(
            convert(&idl, &field, &shape, &json!("x"), "p").unwrap(),
            TypedValue::from("x")
        );
    }

    #[test]
    fn test_any_is_identity() {
        let idl = test_idl();
        let input = json!({"whatever": [1, 2]});
        assert_eq!(
            convert(&idl, &Field::new("", "Nested"), &Shape::Any, &input, "p").unwrap(),
            TypedValue::Raw(input)
        );
    }

    #[test]
    fn test_array() {
        let idl = test_idl();
        let field = Field::new("", "float").array();
        let shape = Shape::array(Shape::float());

        assert_eq!(
            convert(&idl, &field, &shape, &json!([1, 2.1, 3]), "p").unwrap(),
            TypedValue::from(vec![1.0, 2.1, 3.0])
        );
        assert_eq!(
            convert(&idl, &field, &shape, &json!([]), "p").unwrap(),
            TypedValue::Array(vec![])
        );

        let err = convert(&idl, &field, &shape, &json!([1, "x", 3]), "p").unwrap_err();
        assert_eq!(err.path, "p[1]");
    }

    #[test]
    fn test_array_requires_array_field() {
        let idl = test_idl();
        let err = convert(
            &idl,
            &Field::new("", "float"),
            &Shape::array(Shape::float()),
            &json!([1.0]),
            "p",
        )
        .unwrap_err();
        assert!(err.msg.starts_with("Unable to convert"));
    }

    #[test]
    fn test_enum_membership() {
        let idl = test_idl();
        let field = Field::new("", "StringAlias");
        assert_eq!(
            convert(&idl, &field, &Shape::String, &json!("blah"), "p").unwrap(),
            TypedValue::from("blah")
        );

        let err = convert(&idl, &field, &Shape::String, &json!("invalid"), "p").unwrap_err();
        assert_eq!(err.msg, "Value invalid not in enum values: [blah, foo]");

        // case sensitive
        assert!(convert(&idl, &field, &Shape::String, &json!("Blah"), "p").is_err());
    }

    #[test]
    fn test_struct_conversion() {
        let idl = test_idl();
        let field = Field::new("", "NoNesting");
        let shape = no_nesting_shape();

        let converted = convert(&idl, &field, &shape, &json!({"a": "hi", "b": 30}), "p").unwrap();
        assert_eq!(converted, no_nesting("hi", 30, 0.0, false, vec![]));

        // "C" and "d" match the target members "C" and "D" respectively
        let converted =
            convert(&idl, &field, &shape, &json!({"C": 3.2, "d": true}), "p").unwrap();
        assert_eq!(converted, no_nesting("", 0, 3.2, true, vec![]));

        // "D" in the source is the capitalised variant of field "d"
        let converted =
            convert(&idl, &field, &shape, &json!({"C": 2.8, "D": true}), "p").unwrap();
        assert_eq!(converted, no_nesting("", 0, 2.8, true, vec![]));

        let converted = convert(&idl, &field, &shape, &json!({"E": ["a", "b"]}), "p").unwrap();
        assert_eq!(converted, no_nesting("", 0, 0.0, false, vec!["a", "b"]));
    }

    #[test]
    fn test_struct_member_type_error_has_path() {
        let idl = test_idl();
        let err = convert(
            &idl,
            &Field::new("", "NoNesting"),
            &no_nesting_shape(),
            &json!({"a": "hi", "b": "foo"}),
            "param[0]",
        )
        .unwrap_err();
        assert_eq!(err.path, "param[0].b");
    }

    #[test]
    fn test_nested_struct_and_missing_required_field() {
        let idl = test_idl();
        let field = Field::new("", "Nested");
        let shape = nested_shape();

        let converted = convert(
            &idl,
            &field,
            &shape,
            &json!({"name": "hi", "Nest": {"b": 30.0}, "ignored": 1}),
            "p",
        )
        .unwrap();
        let expected: TypedValue = Record::new("Nested")
            .with("Name", "hi")
            .with("Nest", no_nesting("", 30, 0.0, false, vec![]))
            .into();
        assert_eq!(converted, expected);

        let err = convert(&idl, &field, &shape, &json!({"Nest": {}}), "p").unwrap_err();
        assert_eq!(err.msg, "Struct value: Nested is missing required field: name");
    }

    #[test]
    fn test_target_missing_member_is_error() {
        let idl = test_idl();
        let shape = Shape::record("Nested", [("Name", Shape::String)]);
        let err = convert(
            &idl,
            &Field::new("", "Nested"),
            &shape,
            &json!({"name": "x", "Nest": {}}),
            "p",
        )
        .unwrap_err();
        assert_eq!(err.msg, "Struct: Nested is missing required field: Nest");
    }

    #[test]
    fn test_inherited_fields_are_converted() {
        let idl = test_idl();
        let shape = Shape::record(
            "Extended",
            [
                ("name", Shape::String),
                ("Nest", Shape::Any),
                ("extra", Shape::int()),
            ],
        );
        let converted = convert(
            &idl,
            &Field::new("", "Extended"),
            &shape,
            &json!({"name": "n", "Nest": {}, "extra": 2}),
            "p",
        )
        .unwrap();
        let record = converted.as_record().unwrap();
        assert_eq!(record.get("extra"), Some(&TypedValue::Int(2)));
        assert_eq!(record.get("Nest"), Some(&TypedValue::Raw(json!({}))));
    }

    #[test]
    fn test_schema_shape_round_trip() {
        let idl = test_idl();
        let field = Field::new("", "Nested").array();
        let input = json!([{"name": "x", "Nest": {"a": "y", "E": ["q"]}}]);

        let wire = to_wire(
            &idl,
            &field,
            convert(&idl, &field, &Shape::Schema, &input, "p").unwrap(),
            "p",
        )
        .unwrap();
        assert_eq!(
            wire,
            json!([{
                "name": "x",
                "Nest": {"a": "y", "b": null, "C": null, "d": null, "E": ["q"]}
            }])
        );
    }

    #[test]
    fn test_to_wire_rejects_contract_violation() {
        let idl = test_idl();
        let err = to_wire(&idl, &Field::new("", "int"), TypedValue::from("nope"), "result")
            .unwrap_err();
        assert_eq!(err.path, "result");
        assert!(to_wire(&idl, &Field::new("", "int"), TypedValue::Null, "result").is_err());
        assert_eq!(
            to_wire(&idl, &Field::new("", "int").optional(), TypedValue::Null, "result").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_struct_not_found() {
        let idl = test_idl();
        let err = convert(
            &idl,
            &Field::new("", "Ghost"),
            &Shape::record("Ghost", Vec::<(String, Shape)>::new()),
            &json!({}),
            "p",
        )
        .unwrap_err();
        assert_eq!(err.msg, "Struct not found in IDL: Ghost");
    }
}
