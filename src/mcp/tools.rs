//! MCP tool definitions for SupportDesk

use serde_json::json;

use super::protocol::ToolDefinition;

/// All tool definitions: (name, description, JSON schema)
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    // Chat
    (
        "chat_send",
        "Send a user message to a tenant's support bot. Opens a new session when session_id is omitted.",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "message": {"type": "string"},
                "session_id": {"type": "string", "description": "Continue an existing session"},
                "user_id": {"type": "string"},
                "agent": {"type": "string", "enum": ["greeting", "doc_qa", "form_gen", "api_exec", "analytics", "escalate"], "description": "Skip routing and use this agent"},
                "api_key": {"type": "string", "description": "Tenant key, checked when opening a session"}
            },
            "required": ["tenant_id", "message"]
        }"#,
    ),
    // Documents
    (
        "document_ingest",
        "Ingest a file or every supported file under a directory into a tenant's knowledge base",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "path": {"type": "string", "description": "File or directory on the server"},
                "user_id": {"type": "string"}
            },
            "required": ["tenant_id", "path"]
        }"#,
    ),
    (
        "document_list",
        "List a tenant's documents, newest first",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"}
            },
            "required": ["tenant_id"]
        }"#,
    ),
    (
        "document_delete",
        "Delete a document and its indexed chunks. Omit document_id and set all=true to clear the tenant.",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "document_id": {"type": "string"},
                "all": {"type": "boolean", "default": false}
            },
            "required": ["tenant_id"]
        }"#,
    ),
    (
        "document_search",
        "Similarity search over a tenant's indexed chunks",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "query": {"type": "string"},
                "k": {"type": "integer", "minimum": 1, "description": "Defaults to the configured k"},
                "min_score": {"type": "number", "minimum": -1, "maximum": 1}
            },
            "required": ["tenant_id", "query"]
        }"#,
    ),
    // Tenants
    (
        "tenant_create",
        "Register a tenant. The id is normalized to lowercase.",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "name": {"type": "string"},
                "permissions": {"type": "array", "items": {"type": "string"}},
                "api_key": {"type": "string"},
                "max_documents": {"type": "integer", "minimum": 1}
            },
            "required": ["tenant_id", "name"]
        }"#,
    ),
    (
        "tenant_list",
        "List all tenants",
        r#"{"type": "object", "properties": {}}"#,
    ),
    // Escalation
    (
        "ticket_create",
        "Open an escalation ticket for human follow-up",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "session_id": {"type": "string"},
                "user_id": {"type": "string"},
                "priority": {"type": "string", "enum": ["low", "medium", "high", "urgent"], "default": "medium"}
            },
            "required": ["tenant_id", "title"]
        }"#,
    ),
    (
        "ticket_list",
        "List escalation tickets, newest first",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "status": {"type": "string", "enum": ["open", "in_progress", "resolved", "closed"]}
            }
        }"#,
    ),
    (
        "ticket_update",
        "Change a ticket's status, assignee or priority",
        r#"{
            "type": "object",
            "properties": {
                "ticket_id": {"type": "string"},
                "status": {"type": "string", "enum": ["open", "in_progress", "resolved", "closed"]},
                "assigned_to": {"type": "string", "description": "Empty string unassigns"},
                "priority": {"type": "string", "enum": ["low", "medium", "high", "urgent"]}
            },
            "required": ["ticket_id"]
        }"#,
    ),
    (
        "meeting_schedule",
        "Book a meeting with a support agent",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "title": {"type": "string"},
                "scheduled_time": {"type": "string", "description": "RFC 3339 timestamp"},
                "duration_minutes": {"type": "integer", "minimum": 1, "maximum": 480, "default": 30},
                "description": {"type": "string"},
                "session_id": {"type": "string"},
                "user_id": {"type": "string"},
                "meeting_type": {"type": "string", "default": "general"}
            },
            "required": ["tenant_id", "title", "scheduled_time"]
        }"#,
    ),
    // Agent console
    (
        "session_takeover",
        "Hand a live session to a human agent; the bot stops replying",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "agent_id": {"type": "string"}
            },
            "required": ["session_id", "agent_id"]
        }"#,
    ),
    (
        "session_release",
        "End a human takeover so the bot resumes",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"}
            },
            "required": ["session_id"]
        }"#,
    ),
    (
        "agent_send_message",
        "Post a message into a session as a human agent",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "agent_id": {"type": "string"},
                "message": {"type": "string"}
            },
            "required": ["session_id", "agent_id", "message"]
        }"#,
    ),
    // Admin
    (
        "system_stats",
        "System-wide counts: tenants, sessions, documents, tickets, tool usage and index stats",
        r#"{"type": "object", "properties": {}}"#,
    ),
    // Tool registry
    (
        "tool_register",
        "Register (or replace) an HTTP tool for a tenant",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "spec": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "method": {"type": "string", "enum": ["GET", "POST"], "default": "GET"},
                        "base_url": {"type": "string"},
                        "base_url_env": {"type": "string"},
                        "api_key_env": {"type": "string"},
                        "headers": {"type": "object"},
                        "timeout_secs": {"type": "integer"},
                        "rate_limit_seconds": {"type": "number"}
                    },
                    "required": ["name", "description"]
                }
            },
            "required": ["tenant_id", "spec"]
        }"#,
    ),
    (
        "tool_unregister",
        "Remove a tenant's HTTP tool",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "name": {"type": "string"}
            },
            "required": ["tenant_id", "name"]
        }"#,
    ),
    (
        "tool_list",
        "List the tools available to a tenant, built-ins included",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"}
            },
            "required": ["tenant_id"]
        }"#,
    ),
    // Widget
    (
        "widget_config",
        "Everything an embedding page needs to render a tenant's chat widget",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "base_url": {"type": "string", "description": "Defaults to the server's public base URL"}
            },
            "required": ["tenant_id"]
        }"#,
    ),
    (
        "customization_get",
        "Get a tenant's widget branding",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"}
            },
            "required": ["tenant_id"]
        }"#,
    ),
    (
        "customization_save",
        "Update a tenant's widget branding; omitted fields are kept",
        r#"{
            "type": "object",
            "properties": {
                "tenant_id": {"type": "string"},
                "theme_color": {"type": "string", "description": "Hex colour, e.g. #667eea"},
                "chat_background_color": {"type": "string"},
                "welcome_message": {"type": "string", "maxLength": 500},
                "logo_url": {"type": "string", "description": "Empty string clears"},
                "widget_position": {"type": "string", "enum": ["bottom-right", "bottom-left", "top-right", "top-left"]},
                "custom_css": {"type": "string", "description": "Empty string clears"}
            },
            "required": ["tenant_id"]
        }"#,
    ),
];

pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).unwrap_or(json!({})),
        })
        .collect()
}
