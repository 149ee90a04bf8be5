//! Handler trait and registration-time capability checks.
//!
//! A handler publishes an operation table: one [`OperationSignature`] per
//! method it implements. Binding a handler to an IDL interface compares the
//! table against the interface once, at registration, so dispatch never
//! inspects types again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::error::{RegistrationError, RpcError};
use crate::idl::{Field, Function, Idl, Struct, capitalize};
use crate::shape::{RecordShape, Shape, TypedValue};

/// One return slot of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnSlot {
    Value(Shape),
    /// Error-capable slot carrying an application `RpcError`
    Error,
}

/// What a handler declares about one of its operations
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSignature {
    pub name: String,
    pub params: Vec<Shape>,
    pub returns: Vec<ReturnSlot>,
}

impl OperationSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn param(mut self, shape: Shape) -> Self {
        self.params.push(shape);
        self
    }

    /// The conventional `(value, error)` return.
    pub fn returns(mut self, shape: Shape) -> Self {
        self.returns = vec![ReturnSlot::Value(shape), ReturnSlot::Error];
        self
    }

    pub fn return_slots(mut self, slots: Vec<ReturnSlot>) -> Self {
        self.returns = slots;
        self
    }
}

/// An implementation bound to an IDL interface
#[async_trait]
pub trait Handler: Send + Sync {
    /// The operation table checked at registration
    fn operations(&self) -> Vec<OperationSignature>;

    /// Run one operation. `params` have already been converted to the
    /// shapes the operation declared. An `Err` is an application error and
    /// is passed to the caller verbatim.
    async fn invoke(&self, operation: &str, params: Vec<TypedValue>)
    -> Result<TypedValue, RpcError>;
}

type OperationFn =
    Arc<dyn Fn(Vec<TypedValue>) -> BoxFuture<'static, Result<TypedValue, RpcError>> + Send + Sync>;

/// A closure-based handler
///
/// ```rust
/// use barrister::prelude::*;
///
/// let echo = FunctionHandler::new().sync_operation(
///     OperationSignature::new("echo")
///         .param(Shape::String)
///         .returns(Shape::optional(Shape::String)),
///     |params| Ok(params.into_iter().next().unwrap_or(TypedValue::Null)),
/// );
/// assert_eq!(echo.operations().len(), 1);
/// ```
#[derive(Default, Clone)]
pub struct FunctionHandler {
    operations: IndexMap<String, (OperationSignature, OperationFn)>,
}

impl FunctionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async operation
    pub fn operation<F, Fut>(mut self, signature: OperationSignature, f: F) -> Self
    where
        F: Fn(Vec<TypedValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TypedValue, RpcError>> + Send + 'static,
    {
        let operation: OperationFn =
            Arc::new(move |params: Vec<TypedValue>| f(params).boxed());
        self.operations
            .insert(signature.name.clone(), (signature, operation));
        self
    }

    /// Register an operation that completes immediately
    pub fn sync_operation<F>(self, signature: OperationSignature, f: F) -> Self
    where
        F: Fn(Vec<TypedValue>) -> Result<TypedValue, RpcError> + Send + Sync + 'static,
    {
        self.operation(signature, move |params| futures::future::ready(f(params)))
    }
}

#[async_trait]
impl Handler for FunctionHandler {
    fn operations(&self) -> Vec<OperationSignature> {
        self.operations
            .values()
            .map(|(signature, _)| signature.clone())
            .collect()
    }

    async fn invoke(
        &self,
        operation: &str,
        params: Vec<TypedValue>,
    ) -> Result<TypedValue, RpcError> {
        match self.operations.get(operation) {
            Some((_, f)) => f(params).await,
            None => Err(RpcError::method_not_found(operation)),
        }
    }
}

/// A validated operation, ready for dispatch
#[derive(Debug, Clone)]
pub(crate) struct BoundOperation {
    pub name: String,
    pub params: Vec<Shape>,
}

/// Check a handler's operation table against an interface and map each IDL
/// function name to the operation that implements it.
pub(crate) fn bind_operations(
    idl: &Idl,
    interface: &str,
    functions: &[Function],
    operations: Vec<OperationSignature>,
) -> Result<HashMap<String, BoundOperation>, RegistrationError> {
    let mut table: HashMap<String, OperationSignature> = operations
        .into_iter()
        .map(|op| (op.name.clone(), op))
        .collect();

    let mut bound = HashMap::with_capacity(functions.len());
    for function in functions {
        let method = format!("{}.{}", interface, function.name);
        let signature = table
            .remove(&function.name)
            .or_else(|| table.remove(&capitalize(&function.name)))
            .ok_or_else(|| RegistrationError::MissingMethod {
                interface: interface.to_string(),
                method: function.name.clone(),
            })?;

        if signature.params.len() != function.params.len() {
            return Err(RegistrationError::ParamCount {
                method,
                expected: function.params.len(),
                actual: signature.params.len(),
            });
        }
        for (index, (field, shape)) in function.params.iter().zip(&signature.params).enumerate() {
            check_compatible(idl, field, shape).map_err(|reason| RegistrationError::ParamType {
                method: method.clone(),
                index,
                reason,
            })?;
        }

        match signature.returns.as_slice() {
            [ReturnSlot::Value(shape), ReturnSlot::Error] => {
                check_compatible(idl, &function.returns, shape).map_err(|reason| {
                    RegistrationError::ReturnType {
                        method: method.clone(),
                        reason,
                    }
                })?;
            }
            [ReturnSlot::Value(_), ReturnSlot::Value(_)] => {
                return Err(RegistrationError::MissingErrorSlot { method });
            }
            [ReturnSlot::Error, _] => {
                return Err(RegistrationError::ReturnType {
                    method,
                    reason: "first return value must carry the result".to_string(),
                });
            }
            slots => {
                return Err(RegistrationError::ReturnArity {
                    method,
                    actual: slots.len(),
                });
            }
        }

        bound.insert(
            function.name.clone(),
            BoundOperation {
                name: signature.name,
                params: signature.params,
            },
        );
    }
    Ok(bound)
}

/// Whether `shape` can hold values of `field`. Optional fields need a
/// nullable shape at the top level of a signature.
pub(crate) fn check_compatible(idl: &Idl, field: &Field, shape: &Shape) -> Result<(), String> {
    match shape {
        Shape::Any | Shape::Schema => Ok(()),
        Shape::Optional(inner) => check_value(idl, field, inner),
        other if field.optional => Err(format!(
            "{} is optional and needs an Option shape, found {}",
            describe(field),
            other
        )),
        other => check_value(idl, field, other),
    }
}

fn check_value(idl: &Idl, field: &Field, shape: &Shape) -> Result<(), String> {
    match shape {
        Shape::Any | Shape::Schema => return Ok(()),
        Shape::Optional(inner) => return check_value(idl, field, inner),
        _ => {}
    }

    if field.is_array {
        return match shape {
            Shape::Array(element) => check_value(idl, &field.element(), element),
            other => Err(format!("{} needs a Vec shape, found {}", describe(field), other)),
        };
    }

    match (field.type_name.as_str(), shape) {
        ("string", Shape::String)
        | ("int", Shape::Int(_))
        | ("float", Shape::Float(_))
        | ("bool", Shape::Bool) => Ok(()),
        (name, Shape::String) if idl.enum_values(name).is_some() => Ok(()),
        (name, Shape::Record(record)) => match idl.struct_def(name) {
            Some(def) => check_record(idl, def, record),
            None => Err(format!("{} is not a struct", name)),
        },
        (_, other) => Err(format!("{} is not compatible with {}", describe(field), other)),
    }
}

fn check_record(idl: &Idl, def: &Struct, record: &RecordShape) -> Result<(), String> {
    for (name, field) in def.computed_fields() {
        let (_, member_shape) = record
            .member(name)
            .ok_or_else(|| format!("{} has no member for {}.{}", record.name, def.name, name))?;
        check_value(idl, field, member_shape)
            .map_err(|reason| format!("{}.{}: {}", def.name, name, reason))?;
    }
    Ok(())
}

fn describe(field: &Field) -> String {
    let array = if field.is_array { "[]" } else { "" };
    format!("{}{}", array, field.type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::{EnumDef, EnumValue, IdlElement, InterfaceDef};

    fn idl() -> Idl {
        Idl::build(vec![
            IdlElement::Enum(EnumDef {
                name: "Status".into(),
                comment: String::new(),
                values: vec![EnumValue::new("ok"), EnumValue::new("err")],
            }),
            IdlElement::Struct(Struct::new(
                "Response",
                vec![
                    Field::new("status", "Status"),
                    Field::new("note", "string").optional(),
                ],
            )),
            IdlElement::Interface(InterfaceDef {
                name: "B".into(),
                comment: String::new(),
                functions: vec![Function::new(
                    "echo",
                    vec![Field::new("s", "string")],
                    Field::new("", "string").optional(),
                )],
            }),
        ])
        .unwrap()
    }

    fn echo_signature() -> OperationSignature {
        OperationSignature::new("Echo")
            .param(Shape::String)
            .returns(Shape::optional(Shape::String))
    }

    fn bind(signature: OperationSignature) -> Result<HashMap<String, BoundOperation>, RegistrationError> {
        let idl = idl();
        let functions = idl.interface("B").unwrap().to_vec();
        bind_operations(&idl, "B", &functions, vec![signature])
    }

    #[test]
    fn test_bind_matches_capitalised_name() {
        let bound = bind(echo_signature()).unwrap();
        assert_eq!(bound["echo"].name, "Echo");
        assert_eq!(bound["echo"].params, vec![Shape::String]);
    }

    #[test]
    fn test_bind_rejects_missing_method() {
        let err = bind(OperationSignature::new("shout")).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingMethod { .. }));
    }

    #[test]
    fn test_bind_rejects_bad_param() {
        let err = bind(
            OperationSignature::new("echo")
                .param(Shape::float())
                .returns(Shape::optional(Shape::String)),
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::ParamType { index: 0, .. }));
    }

    #[test]
    fn test_bind_rejects_param_count() {
        let err = bind(
            OperationSignature::new("echo").returns(Shape::optional(Shape::String)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ParamCount {
                method: "B.echo".into(),
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_bind_rejects_bad_returns() {
        let wrong_type = bind(
            OperationSignature::new("echo")
                .param(Shape::String)
                .returns(Shape::int()),
        );
        assert!(matches!(wrong_type, Err(RegistrationError::ReturnType { .. })));

        // optional return needs a nullable shape
        let not_nullable = bind(
            OperationSignature::new("echo")
                .param(Shape::String)
                .returns(Shape::String),
        );
        assert!(matches!(not_nullable, Err(RegistrationError::ReturnType { .. })));

        let no_error_slot = bind(
            OperationSignature::new("echo")
                .param(Shape::String)
                .return_slots(vec![
                    ReturnSlot::Value(Shape::optional(Shape::String)),
                    ReturnSlot::Value(Shape::int()),
                ]),
        );
        assert!(matches!(no_error_slot, Err(RegistrationError::MissingErrorSlot { .. })));

        let single = bind(
            OperationSignature::new("echo")
                .param(Shape::String)
                .return_slots(vec![ReturnSlot::Value(Shape::optional(Shape::String))]),
        );
        assert!(matches!(single, Err(RegistrationError::ReturnArity { actual: 1, .. })));
    }

    #[test]
    fn test_record_compatibility() {
        let idl = idl();
        let field = Field::new("r", "Response");
        let good = Shape::record(
            "Response",
            [("Status", Shape::String), ("Note", Shape::String)],
        );
        assert!(check_compatible(&idl, &field, &good).is_ok());

        let missing = Shape::record("Response", [("Status", Shape::String)]);
        assert!(check_compatible(&idl, &field, &missing).is_err());

        let wrong = Shape::record("Response", [("Status", Shape::Bool), ("Note", Shape::String)]);
        let reason = check_compatible(&idl, &field, &wrong).unwrap_err();
        assert!(reason.starts_with("Response.status"), "{}", reason);
    }

    #[test]
    fn test_array_compatibility() {
        let idl = idl();
        let field = Field::new("xs", "Status").array();
        assert!(check_compatible(&idl, &field, &Shape::array(Shape::String)).is_ok());
        assert!(check_compatible(&idl, &field, &Shape::String).is_err());
    }

    #[tokio::test]
    async fn test_function_handler_invoke() {
        let handler = FunctionHandler::new().sync_operation(echo_signature(), |params| {
            Ok(params.into_iter().next().unwrap_or(TypedValue::Null))
        });
        let result = handler
            .invoke("Echo", vec![TypedValue::from("hi")])
            .await
            .unwrap();
        assert_eq!(result, TypedValue::from("hi"));

        let err = handler.invoke("Nope", vec![]).await.unwrap_err();
        assert_eq!(err.code, -32601);
    }
}
