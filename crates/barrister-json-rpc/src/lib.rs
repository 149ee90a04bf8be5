//! # JSON-RPC 2.0 envelopes for Barrister
//!
//! Transport-agnostic request/response types used by the Barrister runtime.
//! This crate knows nothing about IDLs or handlers; it only models the
//! JSON-RPC 2.0 wire envelope and its error objects.
//!
//! ## Features
//! - Request, response and error envelopes with the `jsonrpc: "2.0"` marker
//! - Positional or named parameters
//! - Standard error codes plus the server-defined range
//! - Envelope parsing that classifies parse errors vs. invalid requests

pub mod error;
pub mod message;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use message::parse_json_rpc_request;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Application/server-defined error used by Barrister for handler
    /// failures and return-value contract violations.
    pub const SERVER_ERROR: i64 = -32000;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
