//! Error types for the Barrister runtime
//!
//! Each concern gets its own type so the embedder can tell load-time,
//! wiring-time and call-time failures apart:
//!
//! - [`SchemaError`]: the IDL could not be turned into a schema
//! - [`RegistrationError`]: a handler does not match its interface
//! - [`TypeError`]: a value did not convert against the schema
//! - [`RpcError`]: what a caller finally sees, a JSON-RPC error object

use thiserror::Error;

pub use barrister_json_rpc::JsonRpcErrorObject as RpcError;

/// Result type for schema construction
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Failure to build the schema model from IDL elements
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("IDL JSON could not be decoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate {kind} name in IDL: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Duplicate method in IDL: {0}")]
    DuplicateMethod(String),

    #[error("Struct {name} extends unknown struct: {parent}")]
    UnknownParent { name: String, parent: String },

    #[error("Struct inheritance cycle detected: {}", chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error("{context} refers to unknown type: {type_name}")]
    UnknownType { context: String, type_name: String },
}

/// A handler could not be bound to an interface.
///
/// These indicate a build or deployment mismatch between the IDL and the
/// implementation, so `Server::add_handler` treats them as fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("No interface with name '{0}' found in IDL")]
    UnknownInterface(String),

    #[error("Handler for {interface} is missing method: {method}")]
    MissingMethod { interface: String, method: String },

    #[error("{method} expects {expected} params, handler operation takes {actual}")]
    ParamCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{method} param[{index}]: {reason}")]
    ParamType {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("{method} must return (value, error), handler operation returns {actual} values")]
    ReturnArity { method: String, actual: usize },

    #[error("{method} return value: {reason}")]
    ReturnType { method: String, reason: String },

    #[error("{method} second return value must be an error slot")]
    MissingErrorSlot { method: String },
}

/// A value failed schema-directed conversion.
///
/// `path` locates the value inside the params or return graph, e.g.
/// `param[0].addresses[1].street1`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {msg}")]
pub struct TypeError {
    pub path: String,
    pub msg: String,
}

impl TypeError {
    pub fn new(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            msg: msg.into(),
        }
    }
}
