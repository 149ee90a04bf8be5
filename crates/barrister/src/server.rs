//! # Barrister JSON-RPC server
//!
//! Binds handlers to IDL interfaces and dispatches `Interface.method` calls:
//! resolve the method in the schema, convert each raw parameter to the shape
//! the handler declared, invoke, then validate the result against the
//! method's return type.
//!
//! Registration needs `&mut Server` and dispatch only `&Server`, so wiring
//! naturally completes before the server is shared (e.g. in an `Arc`) with
//! request-serving tasks.

use std::collections::HashMap;
use std::sync::Arc;

use barrister_json_rpc::{JsonRpcMessage, JsonRpcRequest, parse_json_rpc_request};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::convert::{Convert, to_wire};
use crate::error::{RegistrationError, RpcError};
use crate::handler::{BoundOperation, Handler, bind_operations};
use crate::idl::Idl;

/// Reserved method answering with the loaded IDL
pub const BARRISTER_IDL_METHOD: &str = "barrister-idl";

/// Split a full method name on the first `.`.
///
/// A name without a `.`, or with nothing after it, is returned whole as the
/// interface with an empty function name.
pub fn parse_method(method: &str) -> (&str, &str) {
    match method.split_once('.') {
        Some((interface, function)) if !function.is_empty() => (interface, function),
        _ => (method, ""),
    }
}

struct BoundHandler {
    handler: Arc<dyn Handler>,
    operations: HashMap<String, BoundOperation>,
}

/// JSON-RPC server over a finalised IDL
pub struct Server {
    idl: Arc<Idl>,
    config: ServerConfig,
    handlers: HashMap<String, BoundHandler>,
}

impl Server {
    pub fn new(idl: Arc<Idl>) -> Self {
        Self::with_config(idl, ServerConfig::default())
    }

    pub fn with_config(idl: Arc<Idl>, config: ServerConfig) -> Self {
        Self {
            idl,
            config,
            handlers: HashMap::new(),
        }
    }

    pub fn idl(&self) -> &Arc<Idl> {
        &self.idl
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind `handler` to `interface`, checking its operation table against
    /// the IDL. A previous binding for the same interface is replaced.
    pub fn try_add_handler<H>(&mut self, interface: &str, handler: H) -> Result<(), RegistrationError>
    where
        H: Handler + 'static,
    {
        self.try_add_shared_handler(interface, Arc::new(handler))
    }

    pub fn try_add_shared_handler(
        &mut self,
        interface: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        let functions = self
            .idl
            .interface(interface)
            .ok_or_else(|| RegistrationError::UnknownInterface(interface.to_string()))?;

        let operations = bind_operations(&self.idl, interface, functions, handler.operations())?;

        if self
            .handlers
            .insert(interface.to_string(), BoundHandler { handler, operations })
            .is_some()
        {
            warn!("Replaced existing handler for interface {}", interface);
        }
        info!("Registered handler for interface {}", interface);
        Ok(())
    }

    /// Bind `handler` to `interface`, aborting on any mismatch.
    ///
    /// A mismatch means the implementation and the IDL have drifted apart,
    /// which no request can recover from.
    ///
    /// # Panics
    ///
    /// Panics if the interface is unknown or the handler does not implement
    /// it. Use [`Server::try_add_handler`] to handle the error instead.
    pub fn add_handler<H>(&mut self, interface: &str, handler: H)
    where
        H: Handler + 'static,
    {
        if let Err(err) = self.try_add_handler(interface, handler) {
            error!("Handler registration failed: {}", err);
            panic!("barrister: {}", err);
        }
    }

    /// Interfaces that currently have a handler
    pub fn registered_interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch one call with positional raw params.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug!("Dispatching {} with {} params", method, params.len());

        if method == BARRISTER_IDL_METHOD && self.config.expose_idl {
            return Ok(Value::Array(self.idl.elements().to_vec()));
        }

        let function = self
            .idl
            .method(method)
            .ok_or_else(|| RpcError::method_not_found(method))?;

        let (interface, _) = parse_method(method);
        let bound = self.handlers.get(interface).ok_or_else(|| {
            RpcError::method_not_found(&format!("{} (no handler for interface {})", method, interface))
        })?;
        let operation = bound
            .operations
            .get(&function.name)
            .ok_or_else(|| RpcError::method_not_found(method))?;

        if params.len() != function.params.len() {
            return Err(RpcError::invalid_params(&format!(
                "Param count mismatch for {}: expected {} got {}",
                method,
                function.params.len(),
                params.len()
            )));
        }

        let mut converted = Vec::with_capacity(params.len());
        for (i, ((field, shape), value)) in function
            .params
            .iter()
            .zip(&operation.params)
            .zip(&params)
            .enumerate()
        {
            let typed = Convert::new(&self.idl, field, shape, value, format!("param[{}]", i))
                .run()
                .map_err(|e| {
                    debug!("Rejected params for {}: {}", method, e);
                    RpcError::invalid_params(&e.to_string())
                })?;
            converted.push(typed);
        }

        let result = bound.handler.invoke(&operation.name, converted).await?;

        to_wire(&self.idl, &function.returns, result, "result").map_err(|e| {
            warn!("{} returned a value the IDL does not allow: {}", method, e);
            RpcError::server_error(
                barrister_json_rpc::error_codes::SERVER_ERROR,
                &format!("{} returned invalid value: {}", method, e),
                None,
            )
        })
    }

    /// Handle a decoded request envelope
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let params = match request.params {
            None => Vec::new(),
            Some(params) => match params.into_positional() {
                Some(params) => params,
                None => {
                    return JsonRpcMessage::error(
                        request.id,
                        RpcError::invalid_params("Named params are not supported"),
                    );
                }
            },
        };
        let result = self.call(&request.method, params).await;
        JsonRpcMessage::from_result(request.id, result)
    }

    /// Decode a JSON-RPC request, dispatch it and encode the response.
    ///
    /// Always produces a well-formed response envelope, whatever the input.
    pub async fn invoke_json(&self, request: &[u8]) -> Vec<u8> {
        let message = match parse_json_rpc_request(request) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => {
                debug!("Rejected request envelope: {}", err);
                JsonRpcMessage::Error(err)
            }
        };
        self.encode(&message)
    }

    fn encode(&self, message: &JsonRpcMessage) -> Vec<u8> {
        match serde_json::to_string(message) {
            Ok(json) if self.config.force_ascii => escape_non_ascii(&json).into_bytes(),
            Ok(json) => json.into_bytes(),
            Err(err) => {
                error!("Failed to encode response: {}", err);
                let fallback = JsonRpcMessage::error(
                    message.id().cloned(),
                    RpcError::internal_error(Some(err.to_string())),
                );
                serde_json::to_vec(&fallback).unwrap_or_default()
            }
        }
    }
}

/// Escape non-ASCII characters as JSON `\uXXXX` sequences. serde_json only
/// emits non-ASCII inside string literals, so this stays valid JSON.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{FunctionHandler, OperationSignature};
    use crate::idl::{Field, Function, IdlElement, InterfaceDef};
    use crate::shape::{Shape, TypedValue};
    use serde_json::json;
    use tracing_test::traced_test;

    fn idl() -> Arc<Idl> {
        Arc::new(
            Idl::build(vec![IdlElement::Interface(InterfaceDef {
                name: "Greeter".into(),
                comment: String::new(),
                functions: vec![
                    Function::new(
                        "greet",
                        vec![Field::new("name", "string")],
                        Field::new("", "string"),
                    ),
                    Function::new("count", vec![], Field::new("", "int")),
                ],
            })])
            .unwrap(),
        )
    }

    fn greeter() -> FunctionHandler {
        FunctionHandler::new()
            .sync_operation(
                OperationSignature::new("greet")
                    .param(Shape::String)
                    .returns(Shape::String),
                |params| {
                    let name = params[0].as_str().unwrap_or_default();
                    if name == "nobody" {
                        return Err(RpcError::custom(4000, "who?"));
                    }
                    Ok(format!("héllo {}", name).into())
                },
            )
            .sync_operation(
                OperationSignature::new("count").returns(Shape::int()),
                // violates the declared int return
                |_| Ok(TypedValue::from("many")),
            )
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("B.echo"), ("B", "echo"));
        assert_eq!(parse_method("B."), ("B.", ""));
        assert_eq!(parse_method("Cat.a"), ("Cat", "a"));
        assert_eq!(parse_method("barrister-idl"), ("barrister-idl", ""));
        assert_eq!(parse_method("a.b.c"), ("a", "b.c"));
    }

    #[test]
    fn test_escape_non_ascii() {
        assert_eq!(escape_non_ascii(r#"{"a":"héllo"}"#), r#"{"a":"h\u00e9llo"}"#);
        assert_eq!(escape_non_ascii("😀"), r"\ud83d\ude00");
    }

    #[tokio::test]
    async fn test_application_error_is_verbatim() {
        let mut server = Server::new(idl());
        server.add_handler("Greeter", greeter());

        let err = server
            .call("Greeter.greet", vec![json!("nobody")])
            .await
            .unwrap_err();
        assert_eq!(err, RpcError::custom(4000, "who?"));
    }

    #[tokio::test]
    async fn test_invalid_return_is_server_error() {
        let mut server = Server::new(idl());
        server.add_handler("Greeter", greeter());

        let err = server.call("Greeter.count", vec![]).await.unwrap_err();
        assert_eq!(err.code, -32000);
        assert!(err.message.starts_with("Greeter.count returned invalid value"));
    }

    #[tokio::test]
    async fn test_force_ascii() {
        let mut server =
            Server::with_config(idl(), ServerConfig::new().with_force_ascii(true));
        server.add_handler("Greeter", greeter());

        let response = server
            .invoke_json(br#"{"jsonrpc":"2.0","id":1,"method":"Greeter.greet","params":["x"]}"#)
            .await;
        assert_eq!(
            String::from_utf8(response).unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"result":"h\u00e9llo x"}"#
        );
    }

    #[tokio::test]
    async fn test_hidden_idl() {
        let server = Server::with_config(idl(), ServerConfig::new().with_expose_idl(false));
        let err = server.call(BARRISTER_IDL_METHOD, vec![]).await.unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[tokio::test]
    async fn test_named_params_rejected() {
        let mut server = Server::new(idl());
        server.add_handler("Greeter", greeter());
        let response = server
            .invoke_json(br#"{"jsonrpc":"2.0","id":2,"method":"Greeter.greet","params":{"name":"x"}}"#)
            .await;
        let message: JsonRpcMessage = serde_json::from_slice(&response).unwrap();
        assert_eq!(message.into_result().unwrap_err().code, -32602);
    }

    #[tokio::test]
    async fn test_replacing_handler() {
        let mut server = Server::new(idl());
        server.add_handler("Greeter", greeter());
        server.add_handler("Greeter", greeter());
        assert_eq!(server.registered_interfaces(), vec!["Greeter".to_string()]);
    }

    #[test]
    #[traced_test]
    fn test_registration_failure_is_logged() {
        let mut server = Server::new(idl());
        let err = server
            .try_add_handler("Greeter", FunctionHandler::new())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MissingMethod { .. }));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            server.add_handler("Greeter", FunctionHandler::new());
        }));
        assert!(result.is_err());
        assert!(logs_contain("Handler registration failed"));
    }
}
