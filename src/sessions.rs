//! Chat sessions and message history

use chrono::{Duration, Utc};

use crate::error::{DeskError, Result};
use crate::ids::url_safe_token;
use crate::storage::{chat_queries, Storage};
use crate::tenants::TenantRegistry;
use crate::types::{ChatMessage, ChatSession, NewMessage};

/// History length used when none is requested
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Sessions with activity inside this window count as active
pub const ACTIVE_SESSION_WINDOW_MINUTES: i64 = 30;

/// Session and message persistence
#[derive(Clone)]
pub struct SessionStore {
    storage: Storage,
    tenants: TenantRegistry,
}

impl SessionStore {
    pub fn new(storage: Storage, tenants: TenantRegistry) -> Self {
        Self { storage, tenants }
    }

    /// Open a session for an authenticated tenant
    ///
    /// The session carries a copy of the tenant's permissions.
    pub fn create_session(
        &self,
        tenant_id: &str,
        user_id: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<ChatSession> {
        if !self.tenants.authenticate(tenant_id, api_key)? {
            return Err(DeskError::Unauthorized(format!(
                "Invalid or inactive tenant: {}",
                tenant_id
            )));
        }
        let tenant = self.tenants.get(tenant_id)?;

        let now = Utc::now();
        let session = ChatSession {
            session_id: url_safe_token(32),
            tenant_id: tenant.tenant_id,
            user_id: user_id.map(str::to_string),
            permissions: tenant.permissions,
            created_at: now,
            last_activity: now,
            taken_over_by: None,
            taken_over_at: None,
        };

        self.storage
            .with_connection(|conn| chat_queries::insert_session(conn, &session))?;
        tracing::info!(
            "Created session {}... for tenant {}",
            &session.session_id[..8],
            session.tenant_id
        );
        Ok(session)
    }

    /// Read a session without touching its activity time
    pub fn find(&self, session_id: &str) -> Result<Option<ChatSession>> {
        self.storage
            .with_connection(|conn| chat_queries::get_session(conn, session_id))
    }

    /// Fetch a session and mark it active
    pub fn get_session(&self, session_id: &str) -> Result<ChatSession> {
        let now = Utc::now();
        self.storage.with_connection(|conn| {
            let mut session = chat_queries::get_session(conn, session_id)?
                .ok_or_else(|| DeskError::not_found("Session", session_id))?;
            chat_queries::touch_session(conn, session_id, now)?;
            session.last_activity = now;
            Ok(session)
        })
    }

    /// Persist a message
    pub fn save_message(&self, input: NewMessage) -> Result<ChatMessage> {
        let message = ChatMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            session_id: input.session_id,
            tenant_id: input.tenant_id,
            user_id: input.user_id,
            role: input.role,
            content: input.content,
            agent_type: input.agent_type,
            document_references: input.document_references,
            created_at: Utc::now(),
        };
        self.storage
            .with_connection(|conn| chat_queries::insert_message(conn, &message))?;
        Ok(message)
    }

    /// Last `limit` messages in chronological order
    pub fn history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        self.storage
            .with_connection(|conn| chat_queries::recent_messages(conn, session_id, limit))
    }

    /// Full transcript of a session
    pub fn transcript(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.storage
            .with_connection(|conn| chat_queries::all_messages(conn, session_id))
    }

    pub fn list_sessions(&self, tenant_id: Option<&str>, limit: i64) -> Result<Vec<ChatSession>> {
        self.storage
            .with_connection(|conn| chat_queries::list_sessions(conn, tenant_id, limit))
    }

    /// Sessions active within [`ACTIVE_SESSION_WINDOW_MINUTES`]
    pub fn active_count(&self) -> Result<i64> {
        let since = Utc::now() - Duration::minutes(ACTIVE_SESSION_WINDOW_MINUTES);
        self.storage
            .with_connection(|conn| chat_queries::count_active_sessions(conn, since))
    }

    pub fn total_count(&self) -> Result<i64> {
        self.storage.with_connection(chat_queries::count_sessions)
    }

    /// Hand a session to `agent_id`; `Conflict` when another agent holds it
    pub fn claim_takeover(&self, session_id: &str, agent_id: &str) -> Result<ChatSession> {
        self.storage.with_transaction(|conn| {
            let claimed = chat_queries::claim_takeover(conn, session_id, agent_id, Utc::now())?;
            let session = chat_queries::get_session(conn, session_id)?
                .ok_or_else(|| DeskError::not_found("Session", session_id))?;
            if !claimed {
                return Err(DeskError::Conflict(format!(
                    "Session already taken over by {}",
                    session.taken_over_by.as_deref().unwrap_or("another agent")
                )));
            }
            Ok(session)
        })
    }

    /// Record which human agent is handling a session (`None` releases it)
    pub fn set_takeover(&self, session_id: &str, agent_id: Option<&str>) -> Result<ChatSession> {
        let at = agent_id.map(|_| Utc::now());
        self.storage.with_connection(|conn| {
            if !chat_queries::set_takeover(conn, session_id, agent_id, at)? {
                return Err(DeskError::not_found("Session", session_id));
            }
            chat_queries::get_session(conn, session_id)?
                .ok_or_else(|| DeskError::not_found("Session", session_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::NewTenant;
    use crate::types::MessageRole;

    fn store() -> SessionStore {
        let storage = Storage::open_in_memory().unwrap();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();
        SessionStore::new(storage, tenants)
    }

    fn user_message(session: &ChatSession, content: &str) -> NewMessage {
        NewMessage {
            session_id: session.session_id.clone(),
            tenant_id: session.tenant_id.clone(),
            user_id: None,
            role: MessageRole::User,
            content: content.to_string(),
            agent_type: None,
            document_references: vec![],
        }
    }

    #[test]
    fn test_create_session_copies_permissions() {
        let store = store();
        let session = store.create_session("acme", Some("u1"), None).unwrap();
        assert_eq!(session.session_id.len(), 43);
        assert!(session
            .permissions
            .has(crate::tenants::Permission::ReadDocuments));
        assert_eq!(store.get_session(&session.session_id).unwrap().tenant_id, "acme");
    }

    #[test]
    fn test_unknown_tenant_rejected() {
        let store = store();
        let err = store.create_session("ghost", None, None).unwrap_err();
        assert!(matches!(err, DeskError::Unauthorized(_)));
    }

    #[test]
    fn test_history_is_chronological_and_limited() {
        let store = store();
        let session = store.create_session("acme", None, None).unwrap();
        for i in 0..5 {
            store
                .save_message(user_message(&session, &format!("message {}", i)))
                .unwrap();
        }

        let history = store.history(&session.session_id, 3).unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(store.transcript(&session.session_id).unwrap().len(), 5);
    }

    #[test]
    fn test_takeover_round_trip() {
        let store = store();
        let session = store.create_session("acme", None, None).unwrap();

        let taken = store.set_takeover(&session.session_id, Some("agent-7")).unwrap();
        assert_eq!(taken.taken_over_by.as_deref(), Some("agent-7"));
        assert!(taken.taken_over_at.is_some());

        let released = store.set_takeover(&session.session_id, None).unwrap();
        assert!(!released.is_taken_over());

        assert!(store.set_takeover("missing", Some("a")).is_err());
    }
}
