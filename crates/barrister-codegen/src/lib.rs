//! # Barrister code generator
//!
//! Turns a Barrister IDL into Rust bindings for the `barrister` runtime:
//!
//! - constants describing the IDL (`BARRISTER_VERSION`, `BARRISTER_CHECKSUM`,
//!   `IDL_JSON_RAW`) and an `idl()` loader
//! - one serde enum per IDL enum and one serde struct per IDL struct, with
//!   inherited fields flattened in
//! - one async trait per interface, an adapter binding an implementation of
//!   it to a `barrister::Server`, and a typed client proxy
//! - `new_server`, wiring one implementation per interface
//!
//! Generation is a pure function of the IDL; see [`generate_rust`].

mod generate;
mod names;

pub use generate::{GenerateOptions, generate_rust};

/// Reasons an IDL cannot be turned into Rust source
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("{kind} name is not a valid identifier: {name:?}")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("IDL type {0} clashes with a name the generated code relies on")]
    ReservedName(String),

    #[error("Failed to serialise IDL: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}
