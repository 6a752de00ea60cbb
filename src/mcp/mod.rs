//! MCP (Model Context Protocol) server implementation
//!
//! JSON-RPC over stdio exposing desk operations as tools.

mod handler;
pub mod protocol;
pub mod tools;

pub use handler::DeskHandler;
pub use protocol::{methods, McpHandler, McpRequest, McpResponse, McpServer, ToolDefinition};
pub use tools::{get_tool_definitions, TOOL_DEFINITIONS};
