use chrono::Utc;
use serde_json::{json, Value};

use super::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::Result;
use crate::llm::ChatRequest;
use crate::tenants::Permission;

/// Top-level figures of a stats object, used for the report footer
fn data_points(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

/// Plain listing used when the model is unavailable
fn offline_analysis(stats: &Value, tools: &Value) -> String {
    let mut out = String::from("Key figures:");
    if let Value::Object(map) = stats {
        for (key, value) in map {
            if value.is_number() || value.is_string() || value.is_boolean() {
                out.push_str(&format!("\n- {}: {}", key.replace('_', " "), value));
            }
        }
    }
    if let Value::Array(items) = tools {
        for tool in items {
            out.push_str(&format!(
                "\n- tool {}: {} calls, {} errors",
                tool["name"].as_str().unwrap_or("?"),
                tool["call_count"],
                tool["error_count"]
            ));
        }
    }
    out
}

impl Agents {
    /// System figures for admins, the tenant's own figures otherwise
    fn analytics_snapshot(&self, ctx: &AgentContext) -> Result<Value> {
        if ctx.session.permissions.is_admin() {
            return Ok(serde_json::to_value(self.deps.admin.system_stats()?)?);
        }
        let tenant_id = ctx.tenant.tenant_id.as_str();
        let overview = self
            .deps
            .admin
            .tenant_overview()?
            .into_iter()
            .find(|t| t.tenant_id == tenant_id);
        let index = self.deps.retriever.index().stats(tenant_id)?;
        Ok(json!({
            "tenant_id": tenant_id,
            "documents": overview.as_ref().map(|o| o.documents),
            "chunks": overview.as_ref().map(|o| o.chunks),
            "messages": overview.as_ref().map(|o| o.messages),
            "max_documents": ctx.tenant.max_documents,
            "index": index,
        }))
    }

    pub(super) async fn analytics(&self, ctx: &AgentContext) -> Result<AgentReply> {
        if !ctx.allows(Permission::UseTools) {
            return Ok(AgentReply::denied(AgentKind::Analytics, "analytics"));
        }
        let tenant_id = ctx.tenant.tenant_id.as_str();

        let stats = self.analytics_snapshot(ctx)?;
        let tools = serde_json::to_value(self.deps.tools.stats(Some(tenant_id)))?;

        let prompt = format!(
            "Analyze the system data below for the user's request.\n\n\
System Statistics:\n{}\n\nTool Usage Statistics:\n{}\n\n\
Cover key metrics and trends, usage patterns, recommendations and actionable insights.\n\n\
User request: {}",
            serde_json::to_string_pretty(&stats)?,
            serde_json::to_string_pretty(&tools)?,
            ctx.message
        );
        let request = ChatRequest::new(0.0)
            .system("You are a data analytics expert. Provide comprehensive analysis and actionable insights.")
            .user(prompt);

        let body = match self.deps.model.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Analytics fell back to raw figures: {}", e);
                offline_analysis(&stats, &tools)
            }
        };

        let content = format!(
            "**Analytics Report**\n\n{}\n\n---\n**Report Generated:** {}\n**Tenant:** {}\n**Data Points Analyzed:** {}",
            body,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            tenant_id,
            data_points(&stats) + data_points(&tools)
        );
        tracing::info!("Generated analytics report for tenant {}", tenant_id);
        Ok(AgentReply::text(AgentKind::Analytics, content))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::fixture;
    use super::*;
    use crate::llm::{DisabledModel, ScriptedModel};
    use crate::tenants::PermissionSet;

    #[tokio::test]
    async fn test_report_frame() {
        let model = Arc::new(ScriptedModel::new(["Usage is low."]));
        let fx = fixture(model.clone());
        let reply = fx
            .agents
            .run(AgentKind::Analytics, &fx.context("show usage metrics"))
            .await
            .unwrap();

        assert!(reply.content.starts_with("**Analytics Report**\n\nUsage is low.\n\n---\n"));
        assert!(reply.content.contains("**Tenant:** acme"));
        // non-admin sessions only see their own tenant
        let prompt = &model.requests()[0].messages[1].content;
        assert!(prompt.contains("\"tenant_id\": \"acme\""));
        assert!(!prompt.contains("total_tenants"));
    }

    #[tokio::test]
    async fn test_admin_sees_system_stats_offline() {
        let fx = fixture(Arc::new(DisabledModel));
        let mut ctx = fx.context("report");
        ctx.session.permissions = PermissionSet::admin();

        let reply = fx.agents.run(AgentKind::Analytics, &ctx).await.unwrap();
        assert!(reply.content.contains("- total tenants: 1"));
        assert!(reply.content.contains("tool get_weather: 0 calls, 0 errors"));
    }
}
