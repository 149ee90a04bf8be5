//! # Barrister Prelude
//!
//! ```rust
//! use barrister::prelude::*;
//! ```

pub use crate::client::{Client, LocalClient, Proxy};
pub use crate::config::ServerConfig;
pub use crate::error::{RegistrationError, RpcError, SchemaError, TypeError};
pub use crate::handler::{FunctionHandler, Handler, OperationSignature, ReturnSlot};
pub use crate::idl::{Field, Idl};
pub use crate::server::Server;
pub use crate::shape::{Record, Shape, TypedValue};

pub use async_trait::async_trait;
