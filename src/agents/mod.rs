//! Bot agents
//!
//! A message is classified by the [`Router`] and answered by one of the
//! handlers below. Handlers never fail on model trouble: each has an
//! offline fallback so a desk without a configured model still answers.

mod analytics;
mod api_exec;
mod doc_qa;
mod escalate;
mod form_gen;
mod router;

pub use api_exec::MAX_TOOL_ROUNDS;
pub use router::{keyword_route, parse_label, Router};

pub use crate::types::AgentKind;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::admin::AdminService;
use crate::customization::CustomizationService;
use crate::error::Result;
use crate::escalation::EscalationService;
use crate::forms::{FormDraft, FormRenderer};
use crate::llm::{ChatModel, ChatRequest, ChatTurn};
use crate::retrieval::Retriever;
use crate::storage::Storage;
use crate::tenants::Permission;
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, ChatSession, MessageRole, TenantConfig};

/// Catalogue entry describing an agent
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentInfo {
    pub kind: AgentKind,
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

/// Agents a user can pick explicitly
pub fn catalogue() -> Vec<AgentInfo> {
    vec![
        AgentInfo {
            kind: AgentKind::DocQa,
            name: "Document Q&A",
            description: "Upload documents and ask questions based on their content",
            features: &["Document Upload", "RAG Search", "Contextual Answers"],
        },
        AgentInfo {
            kind: AgentKind::FormGen,
            name: "Form Generator",
            description: "Generate professional forms ready for printing",
            features: &["Structured Sections", "Field Validation", "Printable Output"],
        },
        AgentInfo {
            kind: AgentKind::ApiExec,
            name: "API Executor",
            description: "Execute API calls and external tool operations",
            features: &["Weather API", "Web Search", "Custom Tools"],
        },
        AgentInfo {
            kind: AgentKind::Analytics,
            name: "Analytics",
            description: "System analytics and data insights",
            features: &["Usage Statistics", "Performance Metrics", "Reports"],
        },
        AgentInfo {
            kind: AgentKind::Escalate,
            name: "Escalation",
            description: "Human support and ticket management",
            features: &["Ticket Creation", "Human Handoff", "Support Queue"],
        },
    ]
}

/// Everything a handler needs about the conversation
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub tenant: TenantConfig,
    pub session: ChatSession,
    /// The message being answered
    pub message: String,
    /// Earlier messages of the session, oldest first, excluding `message`
    pub history: Vec<ChatMessage>,
}

impl AgentContext {
    fn allows(&self, permission: Permission) -> bool {
        self.session.permissions.has(permission)
    }

    /// Prior turns as model messages; system and operator notes are skipped
    fn history_turns(&self, limit: usize) -> Vec<ChatTurn> {
        let skip = self.history.len().saturating_sub(limit);
        self.history
            .iter()
            .skip(skip)
            .filter_map(|m| match m.role {
                MessageRole::User => Some(ChatTurn::user(m.content.clone())),
                MessageRole::Assistant | MessageRole::Agent => {
                    Some(ChatTurn::assistant(m.content.clone()))
                }
                MessageRole::System => None,
            })
            .collect()
    }
}

/// A handler's answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub agent: AgentKind,
    pub content: String,
    /// Documents the answer drew on
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub form: Option<FormDraft>,
}

impl AgentReply {
    pub fn text(agent: AgentKind, content: impl Into<String>) -> Self {
        Self {
            agent,
            content: content.into(),
            references: Vec::new(),
            ticket_id: None,
            form: None,
        }
    }

    fn denied(agent: AgentKind, what: &str) -> Self {
        Self::text(agent, format!("Permission denied: {} not allowed", what))
    }
}

/// Services the handlers draw on
#[derive(Clone)]
pub struct AgentDeps {
    pub storage: Storage,
    pub model: Arc<dyn ChatModel>,
    pub retriever: Retriever,
    pub tools: ToolRegistry,
    pub admin: AdminService,
    pub escalation: EscalationService,
    pub customization: CustomizationService,
    pub renderer: Arc<dyn FormRenderer>,
}

/// Router plus handlers
#[derive(Clone)]
pub struct Agents {
    deps: AgentDeps,
    router: Router,
}

const GREETING_PROMPT: &str = "You are a helpful support assistant. Be concise and friendly.";

/// Prior messages included in a greeting prompt
const GREETING_HISTORY: usize = 10;

impl Agents {
    pub fn new(deps: AgentDeps) -> Self {
        let router = Router::new(deps.model.clone());
        Self { deps, router }
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.deps.model
    }

    pub async fn route(&self, message: &str) -> AgentKind {
        self.router.route(message).await
    }

    /// Run one handler
    pub async fn run(&self, kind: AgentKind, ctx: &AgentContext) -> Result<AgentReply> {
        tracing::debug!(
            "Running {} for session {} of tenant {}",
            kind,
            ctx.session.session_id,
            ctx.tenant.tenant_id
        );
        match kind {
            AgentKind::Greeting => self.greeting(ctx).await,
            AgentKind::DocQa => self.doc_qa(ctx).await,
            AgentKind::FormGen => self.form_gen(ctx).await,
            AgentKind::ApiExec => self.api_exec(ctx).await,
            AgentKind::Analytics => self.analytics(ctx).await,
            AgentKind::Escalate => self.escalate(ctx).await,
        }
    }

    async fn greeting(&self, ctx: &AgentContext) -> Result<AgentReply> {
        let mut request = ChatRequest::new(0.6).system(GREETING_PROMPT);
        for turn in ctx.history_turns(GREETING_HISTORY) {
            request = request.turn(turn);
        }
        let request = request.user(ctx.message.clone());

        let content = match self.deps.model.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Greeting fell back to welcome message: {}", e);
                self.deps
                    .customization
                    .get_customization(&ctx.tenant.tenant_id)?
                    .welcome_message
            }
        };
        Ok(AgentReply::text(AgentKind::Greeting, content))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{IngestConfig, RetrievalConfig};
    use crate::embedding::HashedEmbedder;
    use crate::forms::HtmlFormRenderer;
    use crate::index::VectorIndex;
    use crate::ingest::DocumentIngestor;
    use crate::realtime::RealtimeManager;
    use crate::sessions::SessionStore;
    use crate::tenants::{NewTenant, TenantRegistry};

    pub struct Fixture {
        pub agents: Agents,
        pub ingestor: DocumentIngestor,
        pub sessions: SessionStore,
        pub escalation: EscalationService,
        pub tenants: TenantRegistry,
        pub dir: tempfile::TempDir,
    }

    impl Fixture {
        pub fn context(&self, message: &str) -> AgentContext {
            let session = self.sessions.create_session("acme", Some("u1"), None).unwrap();
            AgentContext {
                tenant: self.tenants.get("acme").unwrap(),
                session,
                message: message.to_string(),
                history: Vec::new(),
            }
        }
    }

    pub fn fixture(model: Arc<dyn ChatModel>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_in_memory().unwrap();
        let events = RealtimeManager::new();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();

        let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(128)));
        let ingestor = DocumentIngestor::new(
            storage.clone(),
            tenants.clone(),
            index.clone(),
            IngestConfig::default(),
            dir.path().join("uploads"),
            events.clone(),
        )
        .unwrap();
        let sessions = SessionStore::new(storage.clone(), tenants.clone());
        let tools = ToolRegistry::new(storage.clone(), tenants.clone(), index.clone()).unwrap();
        let escalation = EscalationService::new(storage.clone(), tenants.clone(), events);
        let admin = AdminService::new(
            storage.clone(),
            tenants.clone(),
            sessions.clone(),
            index.clone(),
            tools.clone(),
            escalation.clone(),
        );

        let agents = Agents::new(AgentDeps {
            storage: storage.clone(),
            model,
            retriever: Retriever::new(index, RetrievalConfig::default()),
            tools,
            admin,
            escalation: escalation.clone(),
            customization: CustomizationService::new(storage, tenants.clone()),
            renderer: Arc::new(HtmlFormRenderer::new(dir.path().join("forms"))),
        });

        Fixture {
            agents,
            ingestor,
            sessions,
            escalation,
            tenants,
            dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fixture;
    use super::*;
    use crate::llm::{DisabledModel, ScriptedModel};

    #[test]
    fn test_catalogue_covers_routable_agents() {
        let kinds: Vec<AgentKind> = catalogue().iter().map(|a| a.kind).collect();
        assert_eq!(kinds.len(), 5);
        assert!(!kinds.contains(&AgentKind::Greeting));
    }

    #[tokio::test]
    async fn test_greeting_uses_model_then_welcome() {
        let fx = fixture(Arc::new(ScriptedModel::new(["Hi! What can I do for you?"])));
        let ctx = fx.context("hello");
        let reply = fx.agents.run(AgentKind::Greeting, &ctx).await.unwrap();
        assert_eq!(reply.content, "Hi! What can I do for you?");

        let offline = fixture(Arc::new(DisabledModel));
        let ctx = offline.context("hello");
        let reply = offline.agents.run(AgentKind::Greeting, &ctx).await.unwrap();
        assert_eq!(reply.content, "Hello! How can I help you today?");
    }

    #[test]
    fn test_history_turns_keeps_latest() {
        let fx = fixture(Arc::new(DisabledModel));
        let mut ctx = fx.context("next");
        for (i, role) in [MessageRole::User, MessageRole::System, MessageRole::Assistant, MessageRole::User]
            .into_iter()
            .enumerate()
        {
            ctx.history.push(ChatMessage {
                message_id: i.to_string(),
                session_id: ctx.session.session_id.clone(),
                tenant_id: "acme".into(),
                user_id: None,
                role,
                content: format!("m{}", i),
                agent_type: None,
                document_references: Vec::new(),
                created_at: chrono::Utc::now(),
            });
        }
        let turns = ctx.history_turns(3);
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
        assert_eq!(turns[0].role, "assistant");
    }
}
