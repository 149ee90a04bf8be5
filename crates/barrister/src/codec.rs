//! Bridges between typed values and serde types.
//!
//! Generated bindings use these to move between their own structs and the
//! runtime's [`TypedValue`]s. Values converted with [`Shape::Schema`] are keyed
//! by IDL field names, which is what the generated serde renames expect.
//!
//! [`Shape::Schema`]: crate::Shape::Schema

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RpcError;
use crate::shape::TypedValue;

/// Serialise a value into an untyped [`TypedValue::Raw`].
pub fn to_typed<T: Serialize>(value: &T) -> Result<TypedValue, RpcError> {
    serde_json::to_value(value)
        .map(TypedValue::Raw)
        .map_err(|e| RpcError::internal_error(Some(format!("Failed to encode value: {}", e))))
}

/// Deserialise a converted value.
pub fn from_typed<T: DeserializeOwned>(value: TypedValue) -> Result<T, RpcError> {
    serde_json::from_value(value.into_json())
        .map_err(|e| RpcError::invalid_params(&format!("Failed to decode value: {}", e)))
}
