//! Message classification

use std::sync::Arc;

use crate::llm::{ChatModel, ChatRequest};
use crate::types::AgentKind;

const ROUTER_PROMPT: &str = "You are an intelligent router for a multi-agent support chatbot. \
Classify the user's message into exactly one of these categories:\n\n\
- greeting: greetings, small talk, general conversation, introductions\n\
- doc_qa: questions about documents, files, or knowledge base content\n\
- api_exec: requests to perform actions, call APIs, get external data (weather, search, etc.)\n\
- form_gen: requests to create forms, collect structured data, or generate input fields\n\
- analytics: requests for data analysis, statistics, insights, reports, or metrics\n\
- escalate: requests for human help, complaints, or complex issues beyond AI capability\n\n\
Respond with only the category name.";

/// Keyword groups tried in order when the model gives no usable label
const KEYWORD_ROUTES: [(AgentKind, &[&str]); 5] = [
    (
        AgentKind::DocQa,
        &["document", "file", "pdf", "text", "knowledge"],
    ),
    (
        AgentKind::ApiExec,
        &["weather", "search", "api", "get", "fetch"],
    ),
    (
        AgentKind::FormGen,
        &["form", "input", "collect", "survey", "field"],
    ),
    (
        AgentKind::Analytics,
        &["analyze", "analytics", "statistics", "metrics", "report", "insights", "data"],
    ),
    (
        AgentKind::Escalate,
        &["human", "agent", "help", "support", "escalate"],
    ),
];

/// Substring keyword match, first group wins, greeting otherwise
pub fn keyword_route(message: &str) -> AgentKind {
    let lower = message.to_lowercase();
    KEYWORD_ROUTES
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(AgentKind::Greeting)
}

/// Parse a model's label, tolerating quotes, case and trailing punctuation
pub fn parse_label(raw: &str) -> Option<AgentKind> {
    let label = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim();
    label.parse().ok()
}

/// Model-first router with a keyword fallback
#[derive(Clone)]
pub struct Router {
    model: Arc<dyn ChatModel>,
}

impl Router {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn route(&self, message: &str) -> AgentKind {
        if self.model.is_enabled() {
            let text = if message.trim().is_empty() { "hello" } else { message };
            let request = ChatRequest::new(0.0).system(ROUTER_PROMPT).user(text);
            match self.model.complete(&request).await {
                Ok(answer) => {
                    if let Some(kind) = parse_label(&answer) {
                        tracing::debug!("Router picked {} from model", kind);
                        return kind;
                    }
                    tracing::debug!("Router ignored unknown label '{}'", answer);
                }
                Err(e) => tracing::warn!("Router model call failed: {}", e),
            }
        }

        let kind = keyword_route(message);
        tracing::debug!("Router picked {} from keywords", kind);
        kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{DisabledModel, ScriptedModel};

    #[test]
    fn test_keyword_order() {
        assert_eq!(keyword_route("What does the PDF say?"), AgentKind::DocQa);
        // "file" beats "form" because documents are checked first
        assert_eq!(keyword_route("form for a file upload"), AgentKind::DocQa);
        assert_eq!(keyword_route("Weather in Paris"), AgentKind::ApiExec);
        assert_eq!(keyword_route("Create a signup survey"), AgentKind::FormGen);
        assert_eq!(keyword_route("show me usage metrics"), AgentKind::Analytics);
        assert_eq!(keyword_route("I need a human"), AgentKind::Escalate);
        assert_eq!(keyword_route("hi there"), AgentKind::Greeting);
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label(" Doc_QA.\n"), Some(AgentKind::DocQa));
        assert_eq!(parse_label("\"escalate\""), Some(AgentKind::Escalate));
        assert_eq!(parse_label("I think doc_qa"), None);
    }

    #[tokio::test]
    async fn test_model_label_then_fallback() {
        let model = Arc::new(ScriptedModel::new(["analytics", "no idea"]));
        let router = Router::new(model.clone());

        assert_eq!(router.route("weather please").await, AgentKind::Analytics);
        assert_eq!(router.route("weather please").await, AgentKind::ApiExec);
        // script exhausted: the call fails and keywords decide
        assert_eq!(router.route("talk to support").await, AgentKind::Escalate);
        assert_eq!(model.requests().len(), 3);
    }

    #[test]
    fn test_disabled_model_skips_call() {
        let router = Router::new(Arc::new(DisabledModel));
        assert_eq!(tokio_test::block_on(router.route("hello")), AgentKind::Greeting);
    }
}
