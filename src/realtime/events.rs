//! Real-time event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, ChatSession, EscalationTicket};

/// Types of real-time events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MessageCreated,
    SessionCreated,
    TakeoverStarted,
    TakeoverEnded,
    TicketCreated,
    DocumentIngested,
}

/// A real-time event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub session_id: Option<String>,
    /// Preview of message content
    pub preview: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl RealtimeEvent {
    fn new(event_type: EventType, tenant_id: &str, session_id: Option<&str>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            tenant_id: tenant_id.to_string(),
            session_id: session_id.map(str::to_string),
            preview: None,
            data: None,
        }
    }

    pub fn message_created(message: &ChatMessage) -> Self {
        let mut event = Self::new(
            EventType::MessageCreated,
            &message.tenant_id,
            Some(&message.session_id),
        );
        event.preview = Some(truncate(&message.content, 100));
        event.data = Some(serde_json::json!({
            "message_id": message.message_id,
            "role": message.role,
            "agent_type": message.agent_type,
        }));
        event
    }

    pub fn session_created(session: &ChatSession) -> Self {
        let mut event = Self::new(
            EventType::SessionCreated,
            &session.tenant_id,
            Some(&session.session_id),
        );
        event.data = Some(serde_json::json!({ "user_id": session.user_id }));
        event
    }

    pub fn takeover_started(tenant_id: &str, session_id: &str, agent_id: &str) -> Self {
        let mut event = Self::new(EventType::TakeoverStarted, tenant_id, Some(session_id));
        event.data = Some(serde_json::json!({ "agent_id": agent_id }));
        event
    }

    pub fn takeover_ended(tenant_id: &str, session_id: &str) -> Self {
        Self::new(EventType::TakeoverEnded, tenant_id, Some(session_id))
    }

    pub fn ticket_created(ticket: &EscalationTicket) -> Self {
        let mut event = Self::new(
            EventType::TicketCreated,
            &ticket.tenant_id,
            ticket.session_id.as_deref(),
        );
        event.preview = Some(truncate(&ticket.title, 100));
        event.data = Some(serde_json::json!({
            "ticket_id": ticket.ticket_id,
            "priority": ticket.priority,
        }));
        event
    }

    pub fn document_ingested(tenant_id: &str, document_id: &str, filename: &str, chunks: usize) -> Self {
        let mut event = Self::new(EventType::DocumentIngested, tenant_id, None);
        event.data = Some(serde_json::json!({
            "document_id": document_id,
            "filename": filename,
            "chunks": chunks,
        }));
        event
    }
}

/// Truncate string for preview (UTF-8 safe)
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Subscription filter for events
///
/// Console clients usually pin a tenant, and optionally a single session
/// they are watching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub event_types: Option<Vec<EventType>>,
    pub tenant_id: Option<String>,
    pub session_id: Option<String>,
}

impl SubscriptionFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &RealtimeEvent) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }

        if let Some(ref tenant) = self.tenant_id {
            if tenant != &event.tenant_id {
                return false;
            }
        }

        if let Some(ref session) = self.session_id {
            if event.session_id.as_ref() != Some(session) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_by_tenant_and_session() {
        let event = RealtimeEvent::takeover_started("acme", "s1", "agent-1");

        assert!(SubscriptionFilter::default().matches(&event));

        let tenant_only = SubscriptionFilter {
            tenant_id: Some("acme".into()),
            ..Default::default()
        };
        assert!(tenant_only.matches(&event));

        let other_tenant = SubscriptionFilter {
            tenant_id: Some("globex".into()),
            ..Default::default()
        };
        assert!(!other_tenant.matches(&event));

        let other_session = SubscriptionFilter {
            session_id: Some("s2".into()),
            ..Default::default()
        };
        assert!(!other_session.matches(&event));

        let doc = RealtimeEvent::document_ingested("acme", "d1", "faq.md", 3);
        let session_pinned = SubscriptionFilter {
            session_id: Some("s1".into()),
            ..Default::default()
        };
        assert!(!session_pinned.matches(&doc));
    }

    #[test]
    fn test_event_serialization() {
        let event = RealtimeEvent::takeover_ended("acme", "s1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "takeover_ended");
        assert_eq!(json["tenant_id"], "acme");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate(&"é".repeat(20), 10), format!("{}...", "é".repeat(7)));
    }
}
