//! JSON-RPC 2.0 envelopes used by the MCP transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalyticsError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Str(String),
}

/// An incoming message. Requests without an `id` are notifications.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Id>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

/// Request validation problems are the caller's fault; everything else is ours.
impl From<AnalyticsError> for RpcError {
    fn from(err: AnalyticsError) -> Self {
        let code = match err {
            AnalyticsError::InvalidRequest(_) => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Option<Id>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Id>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids() {
        let request: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "a", "method": "ping"})).unwrap();
        assert_eq!(request.id, Some(Id::Str("a".into())));
        let note: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(note.is_notification());
        assert_eq!(note.params, Value::Null);
    }

    #[test]
    fn test_error_codes_from_analytics_errors() {
        assert_eq!(RpcError::from(AnalyticsError::invalid("bad")).code, INVALID_PARAMS);
        let err = RpcError::from(AnalyticsError::dataset_not_found("x"));
        assert_eq!(err.code, INTERNAL_ERROR);
        assert!(err.message.contains("'x'"));
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(Response::success(Some(Id::Num(1)), json!({}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
        let err = serde_json::to_value(Response::failure(None, RpcError::method_not_found("x"))).unwrap();
        assert_eq!(
            err,
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32601, "message": "Method not found: x"}})
        );
    }
}
