//! Agent console: human takeover of live conversations

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::{DeskError, Result};
use crate::realtime::{RealtimeEvent, RealtimeManager};
use crate::sessions::{SessionStore, ACTIVE_SESSION_WINDOW_MINUTES};
use crate::types::{ChatMessage, ChatSession, MessageRole, NewMessage, HUMAN_AGENT_TYPE};

/// Sessions scanned when listing active conversations
const ACTIVE_SCAN_LIMIT: i64 = 500;

/// A live conversation as shown in the console
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub session: ChatSession,
    pub last_message: Option<ChatMessage>,
}

#[derive(Clone)]
pub struct ConsoleService {
    sessions: SessionStore,
    events: RealtimeManager,
}

fn require_agent(agent_id: &str) -> Result<&str> {
    let agent_id = agent_id.trim();
    if agent_id.is_empty() {
        return Err(DeskError::InvalidInput("agent_id cannot be empty".to_string()));
    }
    Ok(agent_id)
}

impl ConsoleService {
    pub fn new(sessions: SessionStore, events: RealtimeManager) -> Self {
        Self { sessions, events }
    }

    /// Hand a session to a human; the bot stops answering until released
    pub fn takeover(&self, session_id: &str, agent_id: &str) -> Result<ChatSession> {
        let agent_id = require_agent(agent_id)?;
        let session = self.sessions.claim_takeover(session_id, agent_id)?;
        tracing::info!("Agent {} took over session {}", agent_id, session_id);
        self.events.broadcast(RealtimeEvent::takeover_started(
            &session.tenant_id,
            session_id,
            agent_id,
        ));
        Ok(session)
    }

    pub fn end_takeover(&self, session_id: &str) -> Result<ChatSession> {
        let session = self.sessions.set_takeover(session_id, None)?;
        tracing::info!("Takeover of session {} ended", session_id);
        self.events
            .broadcast(RealtimeEvent::takeover_ended(&session.tenant_id, session_id));
        Ok(session)
    }

    /// Post an operator message; the tenant comes from the session
    pub fn send_agent_message(
        &self,
        session_id: &str,
        agent_id: &str,
        text: &str,
    ) -> Result<ChatMessage> {
        let agent_id = require_agent(agent_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DeskError::InvalidInput("Message cannot be empty".to_string()));
        }
        let session = self
            .sessions
            .find(session_id)?
            .ok_or_else(|| DeskError::not_found("Session", session_id))?;

        let message = self.sessions.save_message(NewMessage {
            session_id: session.session_id,
            tenant_id: session.tenant_id,
            user_id: Some(agent_id.to_string()),
            role: MessageRole::Agent,
            content: text.to_string(),
            agent_type: Some(HUMAN_AGENT_TYPE.to_string()),
            document_references: Vec::new(),
        })?;
        self.events.broadcast(RealtimeEvent::message_created(&message));
        Ok(message)
    }

    /// Full transcript, oldest first
    pub fn session_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        if self.sessions.find(session_id)?.is_none() {
            return Err(DeskError::not_found("Session", session_id));
        }
        self.sessions.transcript(session_id)
    }

    /// Sessions with recent activity, most recent first
    pub fn active_sessions(&self, tenant_id: Option<&str>) -> Result<Vec<ActiveSession>> {
        let cutoff = Utc::now() - Duration::minutes(ACTIVE_SESSION_WINDOW_MINUTES);
        let mut active: Vec<ChatSession> = self
            .sessions
            .list_sessions(tenant_id, ACTIVE_SCAN_LIMIT)?
            .into_iter()
            .filter(|s| s.last_activity >= cutoff)
            .collect();
        active.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        active
            .into_iter()
            .map(|session| {
                let last_message = self.sessions.history(&session.session_id, 1)?.pop();
                Ok(ActiveSession {
                    session,
                    last_message,
                })
            })
            .collect()
    }
}
