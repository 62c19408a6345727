//! JSON-RPC 2.0 protocol
//!
//! Requests are tool calls in the style agents expect: `initialize`,
//! `tools/list` and `tools/call` with `roll_dice` or `roll_multiple_dice`.
//! Transports hand raw request text to [`RpcHandler`] and write back whatever
//! response it produces.

pub mod stdio;
mod tools;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::dice::ValidationErrors;
use crate::service::DiceService;

/// Protocol revision reported by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming request
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications; an explicit `null` is still a request id
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Error member of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outgoing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(err.to_object()),
        }
    }

    /// Serialize as a single line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            error!("failed to serialize response: {}", e);
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"internal error"}}}}"#,
                INTERNAL_ERROR
            )
        })
    }
}

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("internal error")]
    Internal,
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Parse(_) => PARSE_ERROR,
            RpcError::InvalidRequest(_) => INVALID_REQUEST,
            RpcError::MethodNotFound(_) | RpcError::UnknownTool(_) => METHOD_NOT_FOUND,
            RpcError::InvalidArguments(_) | RpcError::Validation(_) => INVALID_PARAMS,
            RpcError::Internal => INTERNAL_ERROR,
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RpcError::Internal)
    }

    fn to_object(&self) -> RpcErrorObject {
        let data = match self {
            RpcError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        RpcErrorObject {
            code: self.code(),
            message: self.to_string(),
            data,
        }
    }
}

/// Dispatches JSON-RPC requests to the dice service
#[derive(Clone)]
pub struct RpcHandler {
    service: Arc<DiceService>,
}

impl RpcHandler {
    pub fn new(service: Arc<DiceService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &DiceService {
        &self.service
    }

    /// Handle one request in text form.
    ///
    /// Returns `None` for notifications, which get no reply.
    pub fn handle_text(&self, text: &str) -> Option<RpcResponse> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.handle_value(value),
            Err(e) => {
                warn!("unparseable request: {}", e);
                Some(RpcResponse::failure(Value::Null, &RpcError::Parse(e.to_string())))
            }
        }
    }

    /// Handle one request on the blocking thread pool.
    ///
    /// Used by the HTTP transports so a large batch never stalls the async
    /// workers.
    pub async fn handle_blocking(&self, text: String) -> Option<RpcResponse> {
        let handler = self.clone();
        match tokio::task::spawn_blocking(move || handler.handle_text(&text)).await {
            Ok(response) => response,
            Err(e) => {
                error!("request task failed: {}", e);
                Some(RpcResponse::failure(Value::Null, &RpcError::Internal))
            }
        }
    }

    /// Handle one already-parsed request
    pub fn handle_value(&self, value: Value) -> Option<RpcResponse> {
        if value.is_array() {
            return Some(RpcResponse::failure(
                Value::Null,
                &RpcError::InvalidRequest("batch requests are not supported".to_string()),
            ));
        }

        let is_notification = value.get("id").is_none();
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                return Some(RpcResponse::failure(id, &RpcError::InvalidRequest(e.to_string())))
            }
        };
        if request.jsonrpc != "2.0" {
            return Some(RpcResponse::failure(
                id,
                &RpcError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
            ));
        }

        if is_notification {
            debug!(method = %request.method, "notification");
            return None;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(&request)))
            .unwrap_or_else(|_| {
                error!(method = %request.method, "request handler panicked");
                Err(RpcError::Internal)
            });

        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                if err.is_client_error() {
                    debug!(method = %request.method, code = err.code(), "rejected: {}", err);
                }
                RpcResponse::failure(id, &err)
            }
        })
    }

    fn dispatch(&self, request: &RpcRequest) -> Result<Value, RpcError> {
        match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::descriptors() })),
            "tools/call" => tools::call(&self.service, request.params.as_ref()),
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> RpcHandler {
        RpcHandler::new(Arc::new(DiceService::new(Some(3))))
    }

    fn call(text: &str) -> RpcResponse {
        handler().handle_text(text).expect("expected a response")
    }

    #[test]
    fn test_parse_error() {
        let resp = call("{not json");
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn test_invalid_request() {
        let resp = call(r#"{"jsonrpc":"2.0","id":1}"#);
        assert_eq!(resp.id, json!(1));
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);

        let resp = call(r#"{"jsonrpc":"1.0","id":2,"method":"ping"}"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);

        let resp = call(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#);
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn test_method_not_found() {
        let resp = call(r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#);
        assert_eq!(resp.id, json!("a"));
        let err = resp.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("resources/list"));
    }

    #[test]
    fn test_notification_has_no_response() {
        let handler = handler();
        assert!(handler
            .handle_text(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .is_none());
    }

    #[test]
    fn test_null_id_is_answered() {
        let resp = call(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#);
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.result, Some(json!({})));

        let line = resp.to_line();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert!(value.as_object().unwrap().contains_key("id"));
    }

    #[tokio::test]
    async fn test_blocking_pool_matches_inline() {
        let handler = handler();
        let resp = handler
            .handle_blocking(r#"{"jsonrpc":"2.0","id":4,"method":"tools/list"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(resp.id, json!(4));
        assert!(resp.result.unwrap()["tools"].is_array());

        assert!(handler
            .handle_blocking(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string())
            .await
            .is_none());
    }

    #[test]
    fn test_initialize_and_ping() {
        let resp = call(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "diced");

        let resp = call(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        assert_eq!(resp.result, Some(json!({})));
    }

    #[test]
    fn test_response_line_shape() {
        let line = call(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).to_line();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_categories() {
        assert!(RpcError::UnknownTool("x".into()).is_client_error());
        assert!(!RpcError::Internal.is_client_error());
        assert_eq!(RpcError::Internal.code(), INTERNAL_ERROR);
        assert_eq!(RpcError::Internal.to_string(), "internal error");
    }
}
