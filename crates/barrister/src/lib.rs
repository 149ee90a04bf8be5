//! # Barrister
//!
//! An IDL-driven JSON-RPC 2.0 runtime. A Barrister IDL document (the JSON
//! produced by the IDL compiler) declares enums, structs and interfaces; this
//! crate enforces that contract on every call.
//!
//! ## Pieces
//! - [`Idl`]: the schema model, built once and shared by `Arc`
//! - [`convert`]: schema-directed conversion of raw JSON into [`TypedValue`]s
//! - [`Handler`] / [`FunctionHandler`]: implementations publishing an
//!   operation table that is checked against the IDL at registration
//! - [`Server`]: method resolution, dispatch and JSON-RPC error mapping
//! - [`client`]: an in-process client and a schema-aware proxy
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use barrister::prelude::*;
//!
//! let idl = Idl::from_json(br#"[
//!     {"type": "interface", "name": "B", "comment": "", "functions": [
//!         {"name": "echo", "comment": "",
//!          "params": [{"name": "s", "type": "string", "optional": false, "is_array": false}],
//!          "returns": {"name": "", "type": "string", "optional": true, "is_array": false}}
//!     ]}
//! ]"#).unwrap();
//!
//! let mut server = Server::new(Arc::new(idl));
//! server.add_handler(
//!     "B",
//!     FunctionHandler::new().sync_operation(
//!         OperationSignature::new("echo")
//!             .param(Shape::String)
//!             .returns(Shape::optional(Shape::String)),
//!         |params| Ok(params.into_iter().next().unwrap_or(TypedValue::Null)),
//!     ),
//! );
//! assert_eq!(server.registered_interfaces(), vec!["B".to_string()]);
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod handler;
pub mod idl;
pub mod prelude;
pub mod server;
pub mod shape;

pub use client::{Client, LocalClient, Proxy};
pub use config::ServerConfig;
pub use convert::{Convert, convert, to_wire};
pub use error::{RegistrationError, RpcError, SchemaError, SchemaResult, TypeError};
pub use handler::{FunctionHandler, Handler, OperationSignature, ReturnSlot};
pub use idl::{EnumDef, EnumValue, Field, Function, Idl, IdlElement, InterfaceDef, Meta, Struct};
pub use server::{BARRISTER_IDL_METHOD, Server, parse_method};
pub use shape::{FloatWidth, IntWidth, Record, RecordShape, Shape, TypedValue};

// Used by generated bindings
pub use async_trait::async_trait;
pub use barrister_json_rpc as json_rpc;
pub use serde;
pub use serde_json;
