//! Chat entry point: session handling, routing and persistence

use serde::{Deserialize, Serialize};

use crate::agents::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::{DeskError, Result};
use crate::realtime::{RealtimeEvent, RealtimeManager};
use crate::sessions::SessionStore;
use crate::tenants::TenantRegistry;
use crate::types::{ChatMessage, MessageRole, NewMessage};

/// Prior messages handed to the agents
pub const HISTORY_WINDOW: i64 = 10;

/// One user message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatInput {
    pub tenant_id: String,
    /// Continue this session; a new one is opened when absent
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub message: String,
    /// Skip routing and use this agent
    #[serde(default)]
    pub agent: Option<AgentKind>,
    /// Tenant master key, checked when opening a session
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ChatInput {
    pub fn new(tenant_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn agent(mut self, agent: AgentKind) -> Self {
        self.agent = Some(agent);
        self
    }
}

/// What came back for a user message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatReply {
    Bot {
        reply: AgentReply,
        message: ChatMessage,
    },
    /// A human agent owns the session; no bot reply was produced
    HumanHandling { agent_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub session_created: bool,
    pub user_message: ChatMessage,
    pub reply: ChatReply,
}

impl ChatResponse {
    /// Bot reply text, if the bot answered
    pub fn text(&self) -> Option<&str> {
        match &self.reply {
            ChatReply::Bot { reply, .. } => Some(&reply.content),
            ChatReply::HumanHandling { .. } => None,
        }
    }

    pub fn agent(&self) -> Option<AgentKind> {
        match &self.reply {
            ChatReply::Bot { reply, .. } => Some(reply.agent),
            ChatReply::HumanHandling { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    tenants: TenantRegistry,
    sessions: SessionStore,
    agents: Agents,
    events: RealtimeManager,
}

impl ChatService {
    pub fn new(
        tenants: TenantRegistry,
        sessions: SessionStore,
        agents: Agents,
        events: RealtimeManager,
    ) -> Self {
        Self {
            tenants,
            sessions,
            agents,
            events,
        }
    }

    pub async fn send(&self, input: ChatInput) -> Result<ChatResponse> {
        let text = input.message.trim();
        if text.is_empty() {
            return Err(DeskError::InvalidInput("Message cannot be empty".to_string()));
        }
        let tenant = self.tenants.get_active(&input.tenant_id)?;

        let (session, session_created) = match input.session_id.as_deref() {
            Some(id) => {
                let session = self.sessions.get_session(id)?;
                if session.tenant_id != tenant.tenant_id {
                    return Err(DeskError::Unauthorized(format!(
                        "Session {} does not belong to tenant {}",
                        id, tenant.tenant_id
                    )));
                }
                (session, false)
            }
            None => {
                let session = self.sessions.create_session(
                    &tenant.tenant_id,
                    input.user_id.as_deref(),
                    input.api_key.as_deref(),
                )?;
                self.events.broadcast(RealtimeEvent::session_created(&session));
                (session, true)
            }
        };
        let user_id = input.user_id.clone().or_else(|| session.user_id.clone());

        let history = self.sessions.history(&session.session_id, HISTORY_WINDOW)?;
        let user_message = self.sessions.save_message(NewMessage {
            session_id: session.session_id.clone(),
            tenant_id: tenant.tenant_id.clone(),
            user_id: user_id.clone(),
            role: MessageRole::User,
            content: text.to_string(),
            agent_type: None,
            document_references: Vec::new(),
        })?;
        self.events.broadcast(RealtimeEvent::message_created(&user_message));

        if let Some(agent_id) = session.taken_over_by.clone() {
            tracing::debug!(
                "Session {} handled by {}, bot stays quiet",
                session.session_id,
                agent_id
            );
            return Ok(ChatResponse {
                session_id: session.session_id,
                session_created,
                user_message,
                reply: ChatReply::HumanHandling { agent_id },
            });
        }

        let kind = match input.agent {
            Some(kind) => kind,
            None => self.agents.route(text).await,
        };
        let ctx = AgentContext {
            tenant,
            session,
            message: text.to_string(),
            history,
        };
        let reply = self.agents.run(kind, &ctx).await?;

        let message = self.sessions.save_message(NewMessage {
            session_id: ctx.session.session_id.clone(),
            tenant_id: ctx.tenant.tenant_id.clone(),
            user_id,
            role: MessageRole::Assistant,
            content: reply.content.clone(),
            agent_type: Some(reply.agent.as_str().to_string()),
            document_references: reply.references.clone(),
        })?;
        self.events.broadcast(RealtimeEvent::message_created(&message));
        tracing::info!(
            "Answered session {} with {}",
            ctx.session.session_id,
            reply.agent
        );

        Ok(ChatResponse {
            session_id: ctx.session.session_id,
            session_created,
            user_message,
            reply: ChatReply::Bot { reply, message },
        })
    }
}
