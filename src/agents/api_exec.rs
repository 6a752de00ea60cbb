use serde_json::{json, Value};

use super::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::Result;
use crate::llm::{extract_json_object, ChatRequest, ChatTurn};
use crate::tenants::Permission;

/// Tool calls allowed before the model must answer
pub const MAX_TOOL_ROUNDS: usize = 3;

const SUMMARY_PROMPT: &str = "Summarize the tool results and give the user a helpful answer.";

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq)]
struct ToolCall {
    name: String,
    arguments: Value,
}

/// `{"tool": name, "arguments": {...}}`, anything else is a final answer
fn parse_tool_call(answer: &str) -> Option<ToolCall> {
    let value = extract_json_object(answer)?;
    let name = value.get("tool")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let arguments = match value.get("arguments") {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    };
    Some(ToolCall { name, arguments })
}

impl Agents {
    fn tool_prompt(&self, tenant_id: &str) -> (String, Vec<String>) {
        let tools = self.deps.tools.tools_for_tenant(tenant_id);
        let names: Vec<String> = tools.iter().map(|t| t.name().to_string()).collect();
        let listing: Vec<String> = tools
            .iter()
            .map(|t| format!("- {}: {}\n  parameters: {}", t.name(), t.description(), t.parameters()))
            .collect();

        let prompt = format!(
            "You are an API execution specialist. Use the tools below to fulfil the user's request.\n\n\
Available tools:\n{}\n\n\
To call a tool, reply with only a JSON object: {{\"tool\": \"<name>\", \"arguments\": {{...}}}}.\n\
When you have what you need, reply to the user in plain text.",
            listing.join("\n")
        );
        (prompt, names)
    }

    pub(super) async fn api_exec(&self, ctx: &AgentContext) -> Result<AgentReply> {
        if !ctx.allows(Permission::UseTools) {
            return Ok(AgentReply::denied(AgentKind::ApiExec, "tool usage"));
        }
        let tenant_id = ctx.tenant.tenant_id.as_str();
        let (system, names) = self.tool_prompt(tenant_id);

        let mut request = ChatRequest::new(0.0).system(system);
        for turn in ctx.history_turns(6) {
            request = request.turn(turn);
        }
        request = request.user(ctx.message.clone());

        let mut results: Vec<(String, String)> = Vec::new();
        for round in 0..=MAX_TOOL_ROUNDS {
            let answer = match self.deps.model.complete(&request).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Tool agent model call failed: {}", e);
                    return Ok(AgentReply::text(AgentKind::ApiExec, offline_reply(&names, &results)));
                }
            };

            let call = match parse_tool_call(&answer) {
                Some(call) if round < MAX_TOOL_ROUNDS => call,
                Some(_) => break,
                None => return Ok(AgentReply::text(AgentKind::ApiExec, answer)),
            };

            let output = match self
                .deps
                .tools
                .invoke(tenant_id, &call.name, call.arguments.clone())
                .await
            {
                Ok(out) => out,
                Err(e) => format!("Error: {}", e),
            };
            tracing::debug!("Tool {} returned {} chars", call.name, output.len());

            request = request
                .turn(ChatTurn::assistant(answer))
                .user(format!("Tool result for {}:\n{}", call.name, output));
            results.push((call.name, output));
        }

        let request = request.system(SUMMARY_PROMPT);
        let content = match self.deps.model.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Tool summary failed: {}", e);
                offline_reply(&names, &results)
            }
        };
        Ok(AgentReply::text(AgentKind::ApiExec, content))
    }
}

fn offline_reply(tools: &[String], results: &[(String, String)]) -> String {
    if results.is_empty() {
        return format!(
            "I can't run tools right now because the language model is unavailable. Available tools: {}.",
            tools.join(", ")
        );
    }
    let mut out = String::from("Tool results:");
    for (name, output) in results {
        out.push_str(&format!("\n\n**{}**\n{}", name, output));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::fixture;
    use super::*;
    use crate::llm::{DisabledModel, ScriptedModel};

    #[test]
    fn test_parse_tool_call() {
        let call = parse_tool_call(r#"{"tool": "get_weather", "arguments": {"city": "Oslo"}}"#).unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments["city"], "Oslo");

        let bare = parse_tool_call(r#"{"tool": "get_document_stats"}"#).unwrap();
        assert_eq!(bare.arguments, json!({}));

        assert!(parse_tool_call("It is sunny in Oslo.").is_none());
        assert!(parse_tool_call(r#"{"answer": 42}"#).is_none());
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = Arc::new(ScriptedModel::new([
            r#"{"tool": "get_document_stats", "arguments": {}}"#,
            "You have no documents yet.",
        ]));
        let fx = fixture(model.clone());

        let reply = fx
            .agents
            .run(AgentKind::ApiExec, &fx.context("fetch my document stats"))
            .await
            .unwrap();
        assert_eq!(reply.content, "You have no documents yet.");

        let second = &model.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert!(last
            .content
            .starts_with("Tool result for get_document_stats:\nError: Tool error: Error getting document stats"));
    }

    #[tokio::test]
    async fn test_round_limit_forces_summary() {
        let call = r#"{"tool": "nope", "arguments": {}}"#;
        let model = Arc::new(ScriptedModel::new([call, call, call, call, "Nothing worked."]));
        let fx = fixture(model.clone());

        let reply = fx
            .agents
            .run(AgentKind::ApiExec, &fx.context("call the api"))
            .await
            .unwrap();
        assert_eq!(reply.content, "Nothing worked.");
        assert_eq!(model.requests().len(), MAX_TOOL_ROUNDS + 2);
    }

    #[tokio::test]
    async fn test_offline_reply_lists_tools() {
        let fx = fixture(Arc::new(DisabledModel));
        let reply = fx
            .agents
            .run(AgentKind::ApiExec, &fx.context("weather in Oslo"))
            .await
            .unwrap();
        assert!(reply.content.contains("search_web, get_weather, get_document_stats"));
    }
}
