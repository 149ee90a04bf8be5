//! Server configuration

use serde::{Deserialize, Serialize};

/// Options for a [`Server`](crate::Server)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Escape every non-ASCII character in responses as `\uXXXX`
    pub force_ascii: bool,

    /// Answer the reserved `barrister-idl` method with the loaded IDL
    pub expose_idl: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            force_ascii: false,
            expose_idl: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force_ascii(mut self, force_ascii: bool) -> Self {
        self.force_ascii = force_ascii;
        self
    }

    pub fn with_expose_idl(mut self, expose_idl: bool) -> Self {
        self.expose_idl = expose_idl;
        self
    }
}
