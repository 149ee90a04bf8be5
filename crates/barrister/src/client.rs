//! Client side: a transport-agnostic [`Client`] trait, an in-process
//! implementation and a schema-aware [`Proxy`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use barrister_json_rpc::{JsonRpcMessage, JsonRpcRequest, RequestId, RequestParams};
use serde_json::Value;
use tracing::{debug, warn};

use crate::convert::{convert, to_wire};
use crate::error::RpcError;
use crate::idl::Idl;
use crate::server::{BARRISTER_IDL_METHOD, Server};
use crate::shape::{Shape, TypedValue};

/// Sends one call and returns its raw result
#[async_trait]
pub trait Client: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// Calls a [`Server`] in the same process through the JSON wire format
pub struct LocalClient {
    server: Arc<Server>,
    next_id: AtomicI64,
}

impl LocalClient {
    pub fn new(server: Arc<Server>) -> Self {
        Self {
            server,
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Client for LocalClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(
            Some(id.clone()),
            method,
            Some(RequestParams::Array(params)),
        );
        let bytes = serde_json::to_vec(&request)
            .map_err(|e| RpcError::internal_error(Some(e.to_string())))?;

        let response = self.server.invoke_json(&bytes).await;
        let message: JsonRpcMessage = serde_json::from_slice(&response)
            .map_err(|e| RpcError::internal_error(Some(format!("Invalid response: {}", e))))?;

        if message.id() != Some(&id) {
            warn!("Response id {:?} does not match request id {}", message.id(), id);
        }
        message.into_result()
    }
}

/// Typed calls against a remote interface described by the IDL
pub struct Proxy<C> {
    client: C,
    idl: Arc<Idl>,
}

impl<C: Client> Proxy<C> {
    pub fn new(client: C, idl: Arc<Idl>) -> Self {
        Self { client, idl }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn idl(&self) -> &Arc<Idl> {
        &self.idl
    }

    /// Call `method`, validating the params on the way out and converting
    /// the result into `returns` on the way back.
    pub async fn call_typed(
        &self,
        method: &str,
        params: Vec<TypedValue>,
        returns: &Shape,
    ) -> Result<TypedValue, RpcError> {
        let function = self
            .idl
            .method(method)
            .ok_or_else(|| RpcError::method_not_found(method))?;

        if params.len() != function.params.len() {
            return Err(RpcError::invalid_params(&format!(
                "Param count mismatch for {}: expected {} got {}",
                method,
                function.params.len(),
                params.len()
            )));
        }

        let wire = function
            .params
            .iter()
            .zip(params)
            .enumerate()
            .map(|(i, (field, value))| {
                to_wire(&self.idl, field, value, &format!("param[{}]", i))
                    .map_err(|e| RpcError::invalid_params(&e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = self.client.call(method, wire).await?;
        convert(&self.idl, &function.returns, returns, &result, "result").map_err(|e| {
            RpcError::server_error(
                barrister_json_rpc::error_codes::SERVER_ERROR,
                &format!("{} returned invalid type: {}", method, e),
                None,
            )
        })
    }

    /// Fetch the server's IDL and compare its checksum with ours.
    pub async fn check_server_idl(&self) -> Result<bool, RpcError> {
        let remote = self.client.call(BARRISTER_IDL_METHOD, Vec::new()).await?;
        let checksum = remote
            .as_array()
            .into_iter()
            .flatten()
            .find(|element| element.get("type").and_then(Value::as_str) == Some("meta"))
            .and_then(|meta| meta.get("checksum"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let matches = checksum == self.idl.meta().checksum;
        if !matches {
            debug!(
                "Server IDL checksum {} differs from local {}",
                checksum,
                self.idl.meta().checksum
            );
        }
        Ok(matches)
    }
}
