//! JSON-RPC 2.0 framing for the stdio server

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{DeskError, Result};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Method names understood by the desk server
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
    pub const PING: &str = "ping";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl McpRequest {
    /// Requests without an id expect no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Map a desk failure to its error code, with `retryable` and, for rate
    /// limits, `retry_after_ms` in the error data
    pub fn from_error(id: Option<Value>, err: DeskError) -> Self {
        let mut data = json!({ "retryable": err.is_retryable() });
        if let DeskError::RateLimited(ms) = &err {
            data["retry_after_ms"] = json!(ms);
        }
        let mut response = Self::error(id, err.code(), err.to_string());
        if let Some(error) = response.error.as_mut() {
            error.data = Some(data);
        }
        response
    }
}

/// Tool listing entry
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `initialize` reply: the desk only offers tools
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": "supportdesk", "version": crate::VERSION },
    })
}

/// `tools/call` reply wrapping a JSON value as one text block
pub fn tool_result(value: &Value) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({ "content": [{ "type": "text", "text": text }] })
}

pub trait McpHandler: Send + Sync {
    fn handle_request(&self, request: McpRequest) -> McpResponse;
}

/// Newline-delimited JSON-RPC loop
pub struct McpServer<H: McpHandler> {
    handler: H,
}

impl<H: McpHandler> McpServer<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        self.serve(stdin.lock(), std::io::stdout().lock())
    }

    /// Answer each request line of `reader` on `writer` until EOF
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<()> {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    break;
                }
            };
            if let Some(response) = self.respond(line.trim()) {
                writeln!(writer, "{}", serde_json::to_string(&response)?)?;
                writer.flush()?;
            }
        }
        Ok(())
    }

    fn respond(&self, line: &str) -> Option<McpResponse> {
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<McpRequest>(line) {
            Ok(request) if request.is_notification() => {
                tracing::debug!("Notification {}", request.method);
                None
            }
            Ok(request) => Some(self.handler.handle_request(request)),
            Err(e) => Some(McpResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e))),
        }
    }
}
