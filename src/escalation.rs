//! Escalation tickets and meetings with human agents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};
use crate::ids::url_safe_token;
use crate::realtime::{RealtimeEvent, RealtimeManager};
use crate::storage::{ticket_queries, Storage};
use crate::tenants::TenantRegistry;
use crate::types::{
    EscalationTicket, Meeting, MeetingStatus, NewMeeting, NewTicket, TicketPriority, TicketStatus,
};

/// Longest meeting that can be booked
pub const MAX_MEETING_MINUTES: u32 = 480;

/// Words that raise a ticket's priority, strongest first
const PRIORITY_WORDS: [(TicketPriority, &[&str]); 2] = [
    (
        TicketPriority::Urgent,
        &["urgent", "emergency", "asap", "immediately", "critical"],
    ),
    (
        TicketPriority::High,
        &["important", "angry", "frustrated", "complaint", "refund", "broken"],
    ),
];

/// Priority implied by the wording of a request
pub fn priority_from_text(text: &str) -> TicketPriority {
    let lower = text.to_lowercase();
    PRIORITY_WORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(priority, _)| *priority)
        .unwrap_or_default()
}

/// Changes applied by [`EscalationService::update_ticket`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default)]
    pub status: Option<TicketStatus>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
}

/// A booked meeting plus where to fetch its calendar entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMeeting {
    pub meeting: Meeting,
    pub calendar_link: String,
}

#[derive(Clone)]
pub struct EscalationService {
    storage: Storage,
    tenants: TenantRegistry,
    events: RealtimeManager,
}

impl EscalationService {
    pub fn new(storage: Storage, tenants: TenantRegistry, events: RealtimeManager) -> Self {
        Self {
            storage,
            tenants,
            events,
        }
    }

    pub fn create_ticket(&self, input: NewTicket) -> Result<EscalationTicket> {
        self.tenants.get(&input.tenant_id)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(DeskError::InvalidInput(
                "Ticket title cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let ticket = EscalationTicket {
            ticket_id: url_safe_token(12),
            session_id: input.session_id,
            tenant_id: input.tenant_id,
            user_id: input.user_id,
            title: title.to_string(),
            description: input.description,
            status: TicketStatus::Open,
            priority: input.priority,
            assigned_to: None,
            chat_context: input.chat_context,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        self.storage
            .with_connection(|conn| ticket_queries::insert_ticket(conn, &ticket))?;

        tracing::info!(
            "Escalation ticket {} created for tenant {} ({})",
            ticket.ticket_id,
            ticket.tenant_id,
            ticket.priority.as_str()
        );
        self.events.broadcast(RealtimeEvent::ticket_created(&ticket));
        Ok(ticket)
    }

    pub fn get_ticket(&self, ticket_id: &str) -> Result<EscalationTicket> {
        self.storage
            .with_connection(|conn| ticket_queries::get_ticket(conn, ticket_id))?
            .ok_or_else(|| DeskError::not_found("Ticket", ticket_id))
    }

    /// Newest first
    pub fn list_tickets(
        &self,
        tenant_id: Option<&str>,
        status: Option<TicketStatus>,
    ) -> Result<Vec<EscalationTicket>> {
        self.storage
            .with_connection(|conn| ticket_queries::list_tickets(conn, tenant_id, status))
    }

    pub fn open_ticket_count(&self) -> Result<i64> {
        self.storage
            .with_connection(|conn| ticket_queries::count_tickets(conn, TicketStatus::Open))
    }

    /// Apply a status/assignee change; moving to resolved stamps `resolved_at`
    pub fn update_ticket(&self, ticket_id: &str, update: TicketUpdate) -> Result<EscalationTicket> {
        self.storage.with_transaction(|conn| {
            let mut ticket = ticket_queries::get_ticket(conn, ticket_id)?
                .ok_or_else(|| DeskError::not_found("Ticket", ticket_id))?;
            let now = Utc::now();

            if let Some(status) = update.status {
                if status == TicketStatus::Resolved && ticket.status != TicketStatus::Resolved {
                    ticket.resolved_at = Some(now);
                }
                ticket.status = status;
            }
            if let Some(agent) = update.assigned_to {
                let agent = agent.trim();
                ticket.assigned_to = (!agent.is_empty()).then(|| agent.to_string());
            }
            if let Some(priority) = update.priority {
                ticket.priority = priority;
            }
            ticket.updated_at = now;

            ticket_queries::update_ticket(conn, &ticket)?;
            Ok(ticket)
        })
    }

    /// Book a meeting
    ///
    /// `scheduled_time` must be RFC 3339; the duration must be between one
    /// minute and [`MAX_MEETING_MINUTES`].
    pub fn schedule_meeting(&self, input: NewMeeting) -> Result<ScheduledMeeting> {
        self.tenants.get(&input.tenant_id)?;
        if input.title.trim().is_empty() {
            return Err(DeskError::InvalidInput(
                "Meeting title cannot be empty".to_string(),
            ));
        }
        if input.duration_minutes == 0 || input.duration_minutes > MAX_MEETING_MINUTES {
            return Err(DeskError::InvalidInput(format!(
                "Meeting duration must be between 1 and {} minutes",
                MAX_MEETING_MINUTES
            )));
        }
        let scheduled_time = DateTime::parse_from_rfc3339(input.scheduled_time.trim())
            .map_err(|e| {
                DeskError::InvalidInput(format!(
                    "Invalid scheduled_time '{}': {}",
                    input.scheduled_time, e
                ))
            })?
            .with_timezone(&Utc);

        let meeting = Meeting {
            meeting_id: url_safe_token(16),
            session_id: input.session_id,
            tenant_id: input.tenant_id,
            user_id: input.user_id,
            title: input.title.trim().to_string(),
            description: input.description,
            scheduled_time,
            duration_minutes: input.duration_minutes,
            meeting_type: input.meeting_type,
            calendar_provider: input.calendar_provider,
            calendar_event_id: None,
            status: MeetingStatus::Scheduled,
            created_at: Utc::now(),
        };
        self.storage
            .with_connection(|conn| ticket_queries::insert_meeting(conn, &meeting))?;

        tracing::info!(
            "Meeting {} scheduled for tenant {} at {}",
            meeting.meeting_id,
            meeting.tenant_id,
            meeting.scheduled_time
        );
        let calendar_link = format!("/api/meetings/{}/calendar", meeting.meeting_id);
        Ok(ScheduledMeeting {
            meeting,
            calendar_link,
        })
    }

    pub fn get_meeting(&self, meeting_id: &str) -> Result<Meeting> {
        self.storage
            .with_connection(|conn| ticket_queries::get_meeting(conn, meeting_id))?
            .ok_or_else(|| DeskError::not_found("Meeting", meeting_id))
    }

    pub fn list_meetings(&self, tenant_id: &str) -> Result<Vec<Meeting>> {
        self.storage
            .with_connection(|conn| ticket_queries::list_meetings(conn, tenant_id))
    }

    pub fn cancel_meeting(&self, meeting_id: &str) -> Result<Meeting> {
        self.storage.with_connection(|conn| {
            if !ticket_queries::set_meeting_status(conn, meeting_id, MeetingStatus::Cancelled)? {
                return Err(DeskError::not_found("Meeting", meeting_id));
            }
            ticket_queries::get_meeting(conn, meeting_id)?
                .ok_or_else(|| DeskError::not_found("Meeting", meeting_id))
        })
    }
}
