//! Dispatch of MCP tool calls onto desk services

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use super::protocol::{
    initialize_result, methods, tool_result, McpHandler, McpRequest, McpResponse,
    METHOD_NOT_FOUND,
};
use super::tools::get_tool_definitions;
use crate::chat::ChatInput;
use crate::customization::CustomizationUpdate;
use crate::desk::Desk;
use crate::error::{DeskError, Result};
use crate::escalation::TicketUpdate;
use crate::tenants::{NewTenant, PermissionSet};
use crate::tools::HttpToolSpec;
use crate::types::{NewMeeting, NewTicket, TicketStatus};

/// Deserialize tool arguments, reporting schema mismatches as bad input
fn args<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| DeskError::InvalidInput(e.to_string()))
}

fn required<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DeskError::InvalidInput(format!("'{}' is required", key)))
}

fn optional<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

#[derive(Deserialize)]
struct TenantArgs {
    tenant_id: String,
    name: String,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    max_documents: Option<i64>,
}

#[derive(Deserialize)]
struct RegisterArgs {
    tenant_id: String,
    spec: HttpToolSpec,
}

#[derive(Deserialize)]
struct CustomizationArgs {
    tenant_id: String,
    #[serde(flatten)]
    update: CustomizationUpdate,
}

/// MCP handler backed by a [`Desk`]
///
/// Owns a multi-threaded runtime so async desk operations can be driven
/// from the synchronous stdio loop.
pub struct DeskHandler {
    desk: Desk,
    runtime: Runtime,
}

impl DeskHandler {
    pub fn new(desk: Desk) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self { desk, runtime })
    }

    pub fn desk(&self) -> &Desk {
        &self.desk
    }

    pub fn handle_tool_call(&self, name: &str, params: Value) -> Result<Value> {
        // sync services may block on async clients (remote embedders)
        let _guard = self.runtime.enter();
        match name {
            "chat_send" => self.chat_send(params),
            "document_ingest" => self.document_ingest(params),
            "document_list" => {
                let docs = self.desk.ingestor().list_documents(required(&params, "tenant_id")?)?;
                Ok(json!({ "count": docs.len(), "documents": docs }))
            }
            "document_delete" => self.document_delete(params),
            "document_search" => self.document_search(params),
            "tenant_create" => self.tenant_create(params),
            "tenant_list" => Ok(json!(self.desk.tenants().list()?)),
            "ticket_create" => Ok(json!(self.desk.escalation().create_ticket(args::<NewTicket>(params)?)?)),
            "ticket_list" => {
                let status = optional(&params, "status")
                    .map(|s| s.parse::<TicketStatus>())
                    .transpose()
                    .map_err(DeskError::InvalidInput)?;
                let tickets = self
                    .desk
                    .escalation()
                    .list_tickets(optional(&params, "tenant_id"), status)?;
                Ok(json!({ "count": tickets.len(), "tickets": tickets }))
            }
            "ticket_update" => {
                let ticket_id = required(&params, "ticket_id")?.to_string();
                let update: TicketUpdate = args(params)?;
                Ok(json!(self.desk.escalation().update_ticket(&ticket_id, update)?))
            }
            "meeting_schedule" => Ok(json!(self.desk.escalation().schedule_meeting(args::<NewMeeting>(params)?)?)),
            "session_takeover" => Ok(json!(self.desk.console().takeover(
                required(&params, "session_id")?,
                required(&params, "agent_id")?,
            )?)),
            "session_release" => Ok(json!(self
                .desk
                .console()
                .end_takeover(required(&params, "session_id")?)?)),
            "agent_send_message" => Ok(json!(self.desk.console().send_agent_message(
                required(&params, "session_id")?,
                required(&params, "agent_id")?,
                required(&params, "message")?,
            )?)),
            "system_stats" => Ok(json!(self.desk.admin().system_stats()?)),
            "tool_register" => {
                let RegisterArgs { tenant_id, spec } = args(params)?;
                let name = spec.name.clone();
                let replaced = self.desk.tools().register(&tenant_id, spec)?;
                Ok(json!({ "name": name, "registered": true, "replaced": replaced }))
            }
            "tool_unregister" => {
                let removed = self.desk.tools().unregister(
                    required(&params, "tenant_id")?,
                    required(&params, "name")?,
                )?;
                Ok(json!({ "removed": removed }))
            }
            "tool_list" => Ok(json!(self.desk.tools().list(required(&params, "tenant_id")?))),
            "widget_config" => {
                let base_url = optional(&params, "base_url")
                    .unwrap_or(self.desk.config().public_base_url.as_str())
                    .to_string();
                Ok(json!(self
                    .desk
                    .customization()
                    .widget_config(required(&params, "tenant_id")?, &base_url)?))
            }
            "customization_get" => Ok(json!(self
                .desk
                .customization()
                .get_customization(required(&params, "tenant_id")?)?)),
            "customization_save" => {
                let CustomizationArgs { tenant_id, update } = args(params)?;
                Ok(json!(self.desk.customization().save_customization(&tenant_id, update)?))
            }
            _ => Err(DeskError::InvalidInput(format!("Unknown tool: {}", name))),
        }
    }

    fn chat_send(&self, params: Value) -> Result<Value> {
        let input: ChatInput = args(params)?;
        let response = self.runtime.block_on(self.desk.chat().send(input))?;
        Ok(json!(response))
    }

    fn document_ingest(&self, params: Value) -> Result<Value> {
        let tenant_id = required(&params, "tenant_id")?;
        let path = PathBuf::from(shellexpand::tilde(required(&params, "path")?).to_string());
        let ingestor = self.desk.ingestor();

        if path.is_dir() {
            let summary = ingestor.ingest_dir(tenant_id, &path)?;
            return Ok(json!({ "summary": summary }));
        }
        Ok(json!(ingestor.ingest_file(tenant_id, &path, optional(&params, "user_id"))?))
    }

    fn document_delete(&self, params: Value) -> Result<Value> {
        let tenant_id = required(&params, "tenant_id")?;
        let ingestor = self.desk.ingestor();
        match optional(&params, "document_id") {
            Some(document_id) => {
                let doc = ingestor.delete_document(tenant_id, document_id)?;
                Ok(json!({ "deleted": 1, "document": doc }))
            }
            None if params.get("all").and_then(Value::as_bool) == Some(true) => {
                Ok(json!({ "deleted": ingestor.delete_all(tenant_id)? }))
            }
            None => Err(DeskError::InvalidInput(
                "Pass document_id, or all=true to clear every document".to_string(),
            )),
        }
    }

    fn document_search(&self, params: Value) -> Result<Value> {
        let tenant_id = required(&params, "tenant_id")?;
        let query = required(&params, "query")?;
        let retriever = self.desk.retriever();
        let k = params
            .get("k")
            .and_then(Value::as_u64)
            .map(|k| k as usize)
            .unwrap_or(retriever.config().k);
        let min_score = params
            .get("min_score")
            .and_then(Value::as_f64)
            .map(|s| s as f32)
            .unwrap_or(retriever.config().min_score);

        let hits = retriever.retrieve(tenant_id, query, k.max(1), min_score)?;
        Ok(json!({ "count": hits.len(), "results": hits }))
    }

    fn tenant_create(&self, params: Value) -> Result<Value> {
        let input: TenantArgs = args(params)?;
        let permissions = input
            .permissions
            .map(|names| PermissionSet::parse_list(&names))
            .transpose()
            .map_err(DeskError::InvalidInput)?;
        let tenant = self.desk.tenants().create_tenant(NewTenant {
            tenant_id: input.tenant_id,
            name: input.name,
            permissions,
            api_key: input.api_key,
            max_documents: input.max_documents,
        })?;
        Ok(json!(tenant))
    }
}

impl McpHandler for DeskHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => McpResponse::success(request.id, initialize_result()),
            methods::INITIALIZED | methods::PING => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                McpResponse::success(request.id, json!({ "tools": get_tool_definitions() }))
            }
            methods::CALL_TOOL => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                match self.handle_tool_call(&name, arguments) {
                    Ok(result) => {
                        McpResponse::success(request.id, tool_result(&result))
                    }
                    Err(e) => {
                        tracing::warn!("Tool {} failed: {}", name, e);
                        McpResponse::from_error(request.id, e)
                    }
                }
            }
            _ => McpResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DeskConfig;
    use crate::embedding::HashedEmbedder;
    use crate::llm::DisabledModel;
    use crate::storage::Storage;

    fn handler(dir: &tempfile::TempDir) -> DeskHandler {
        let desk = Desk::with_parts(
            DeskConfig::with_data_dir(dir.path()),
            Storage::open_in_memory().unwrap(),
            Arc::new(HashedEmbedder::new(64)),
            Arc::new(DisabledModel),
        )
        .unwrap();
        DeskHandler::new(desk).unwrap()
    }

    fn call(handler: &DeskHandler, name: &str, arguments: Value) -> McpResponse {
        handler.handle_request(McpRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: methods::CALL_TOOL.into(),
            params: json!({ "name": name, "arguments": arguments }),
        })
    }

    #[test]
    fn test_tenant_and_ticket_tools() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        let created = call(&h, "tenant_create", json!({"tenant_id": "Acme", "name": "Acme Inc"}));
        assert!(created.error.is_none());
        let tenant = h.handle_tool_call("tenant_list", json!({})).unwrap();
        assert_eq!(tenant.as_array().unwrap().len(), 2);

        let ticket = h
            .handle_tool_call(
                "ticket_create",
                json!({"tenant_id": "acme", "title": "Refund", "priority": "high"}),
            )
            .unwrap();
        let ticket_id = ticket["ticket_id"].as_str().unwrap().to_string();

        let updated = h
            .handle_tool_call(
                "ticket_update",
                json!({"ticket_id": ticket_id, "status": "resolved"}),
            )
            .unwrap();
        assert_eq!(updated["status"], "resolved");
        assert!(!updated["resolved_at"].is_null());

        let open = h
            .handle_tool_call("ticket_list", json!({"status": "open"}))
            .unwrap();
        assert_eq!(open["count"], 0);
    }

    #[test]
    fn test_errors_use_desk_codes() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        let missing = call(&h, "customization_get", json!({"tenant_id": "nope"}));
        assert_eq!(missing.error.unwrap().code, -32001);

        let bad = call(&h, "tenant_create", json!({"tenant_id": "x", "name": "X", "permissions": ["fly"]}));
        assert_eq!(bad.error.unwrap().code, -32602);

        let unknown = h.handle_request(McpRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(2)),
            method: "resources/list".into(),
            params: Value::Null,
        });
        assert_eq!(unknown.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_chat_send_opens_session() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);

        let reply = h
            .handle_tool_call("chat_send", json!({"tenant_id": "default", "message": "hello"}))
            .unwrap();
        assert_eq!(reply["session_created"], true);
        assert_eq!(reply["reply"]["kind"], "bot");
        assert_eq!(reply["reply"]["reply"]["agent"], "greeting");
    }

    #[test]
    fn test_document_ingest_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);
        let path = dir.path().join("returns.md");
        std::fs::write(&path, "# Returns\n\nItems can be returned within 30 days of delivery.").unwrap();

        let ingested = h
            .handle_tool_call(
                "document_ingest",
                json!({"tenant_id": "default", "path": path.to_string_lossy()}),
            )
            .unwrap();
        assert_eq!(ingested["success"], true);
        assert_eq!(ingested["filename"], "returns.md");

        let found = h
            .handle_tool_call(
                "document_search",
                json!({"tenant_id": "default", "query": "return items within 30 days", "k": 2}),
            )
            .unwrap();
        assert_eq!(found["count"], 1);
        assert_eq!(found["results"][0]["chunk"]["source"], "returns.md");

        let listed = h
            .handle_tool_call("document_list", json!({"tenant_id": "default"}))
            .unwrap();
        assert_eq!(listed["count"], 1);
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_remote_embedder_errors_instead_of_panicking() {
        use crate::embedding::OpenAIEmbedder;

        let dir = tempfile::tempdir().unwrap();
        let embedder = OpenAIEmbedder::with_config(
            "test-key".to_string(),
            Some("http://127.0.0.1:9".to_string()),
            None,
            Some(8),
        );
        let desk = Desk::with_parts(
            DeskConfig::with_data_dir(dir.path()),
            Storage::open_in_memory().unwrap(),
            Arc::new(embedder),
            Arc::new(DisabledModel),
        )
        .unwrap();
        let h = DeskHandler::new(desk).unwrap();

        let result = h.handle_tool_call(
            "document_search",
            json!({"tenant_id": "default", "query": "refund"}),
        );
        assert!(matches!(result, Err(DeskError::Http(_)) | Err(DeskError::Embedding(_))));

        let response = call(&h, "document_search", json!({"tenant_id": "default", "query": "refund"}));
        assert!(response.error.is_some());
    }

    #[test]
    fn test_list_tools_matches_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(&dir);
        for tool in get_tool_definitions() {
            let err = h.handle_tool_call(&tool.name, json!({})).err();
            if let Some(DeskError::InvalidInput(msg)) = err {
                assert!(!msg.starts_with("Unknown tool"), "{} is not dispatched", tool.name);
            }
        }
    }
}
