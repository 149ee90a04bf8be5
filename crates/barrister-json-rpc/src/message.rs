use serde_json::Value;

use crate::{error::JsonRpcError, request::JsonRpcRequest, types::RequestId};

/// Parse raw bytes into a JSON-RPC request envelope.
///
/// Bytes that are not JSON yield a parse error (-32700). JSON that is not a
/// single JSON-RPC 2.0 request object yields an invalid request (-32600),
/// echoing the id when one can be recovered.
pub fn parse_json_rpc_request(bytes: &[u8]) -> Result<JsonRpcRequest, JsonRpcError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| JsonRpcError::parse_error())?;

    let obj = match &value {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            return Err(JsonRpcError::invalid_request(
                None,
                Some("Batch requests are not supported".to_string()),
            ));
        }
        _ => return Err(JsonRpcError::invalid_request(None, None)),
    };

    let id = obj.get("id").and_then(RequestId::from_value);

    match obj.get("jsonrpc") {
        Some(version) if version == "2.0" => {}
        _ => return Err(JsonRpcError::invalid_request(id, None)),
    }

    serde_json::from_value::<JsonRpcRequest>(value.clone())
        .map_err(|e| JsonRpcError::invalid_request(id, Some(format!("Invalid Request: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestParams;
    use serde_json::json;

    #[test]
    fn test_parse_valid_request() {
        let json = br#"{"jsonrpc": "2.0", "method": "B.echo", "id": "123", "params": ["hi"]}"#;
        let request = parse_json_rpc_request(json).unwrap();

        assert_eq!(request.method, "B.echo");
        assert_eq!(request.id, Some(RequestId::from("123")));
        assert_eq!(request.params, Some(RequestParams::Array(vec![json!("hi")])));
    }

    #[test]
    fn test_parse_invalid_json() {
        let error = parse_json_rpc_request(br#"{"jsonrpc": "2.0", "method": "x""#).unwrap_err();
        assert_eq!(error.error.code, -32700);
        assert_eq!(error.id, None);
    }

    #[test]
    fn test_parse_invalid_version_keeps_id() {
        let error =
            parse_json_rpc_request(br#"{"jsonrpc": "1.0", "method": "x", "id": 9}"#).unwrap_err();
        assert_eq!(error.error.code, -32600);
        assert_eq!(error.id, Some(RequestId::Number(9)));
    }

    #[test]
    fn test_parse_rejects_batch_and_scalars() {
        let batch = parse_json_rpc_request(br#"[{"jsonrpc":"2.0","method":"x","id":1}]"#);
        assert_eq!(batch.unwrap_err().error.code, -32600);

        let scalar = parse_json_rpc_request(b"42");
        assert_eq!(scalar.unwrap_err().error.code, -32600);
    }

    #[test]
    fn test_parse_rejects_scalar_params() {
        let error =
            parse_json_rpc_request(br#"{"jsonrpc":"2.0","id":1,"method":"x","params":"a"}"#)
                .unwrap_err();
        assert_eq!(error.error.code, -32600);
        assert_eq!(error.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn test_parse_keeps_non_integer_ids() {
        let request =
            parse_json_rpc_request(br#"{"jsonrpc":"2.0","id":1.5,"method":"B.echo","params":["hi"]}"#)
                .unwrap();
        assert_eq!(request.id, Some(RequestId::Other(json!(1.5))));

        let error =
            parse_json_rpc_request(br#"{"jsonrpc":"1.0","id":{"a":1},"method":"x"}"#).unwrap_err();
        assert_eq!(error.id, Some(RequestId::Other(json!({"a": 1}))));
    }
}
