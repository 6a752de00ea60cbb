//! Escalation ticket and meeting queries

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, parse_optional_datetime};
use crate::error::Result;
use crate::types::{EscalationTicket, Meeting, MeetingStatus, TicketPriority, TicketStatus};

fn ticket_from_row(row: &Row) -> rusqlite::Result<EscalationTicket> {
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let chat_context: String = row.get("chat_context")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(EscalationTicket {
        ticket_id: row.get("ticket_id")?,
        session_id: row.get("session_id")?,
        tenant_id: row.get("tenant_id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: status.parse().unwrap_or(TicketStatus::Open),
        priority: priority.parse().unwrap_or(TicketPriority::Medium),
        assigned_to: row.get("assigned_to")?,
        chat_context: serde_json::from_str(&chat_context).unwrap_or_default(),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
        resolved_at: parse_optional_datetime(row.get("resolved_at")?),
    })
}

fn meeting_from_row(row: &Row) -> rusqlite::Result<Meeting> {
    let scheduled_time: String = row.get("scheduled_time")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;

    Ok(Meeting {
        meeting_id: row.get("meeting_id")?,
        session_id: row.get("session_id")?,
        tenant_id: row.get("tenant_id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        scheduled_time: parse_datetime(&scheduled_time),
        duration_minutes: row.get("duration_minutes")?,
        meeting_type: row.get("meeting_type")?,
        calendar_provider: row.get("calendar_provider")?,
        calendar_event_id: row.get("calendar_event_id")?,
        status: status.parse().unwrap_or(MeetingStatus::Scheduled),
        created_at: parse_datetime(&created_at),
    })
}

pub fn insert_ticket(conn: &Connection, ticket: &EscalationTicket) -> Result<()> {
    conn.execute(
        "INSERT INTO escalation_tickets (ticket_id, session_id, tenant_id, user_id, title,
                                         description, status, priority, assigned_to,
                                         chat_context, created_at, updated_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            ticket.ticket_id,
            ticket.session_id,
            ticket.tenant_id,
            ticket.user_id,
            ticket.title,
            ticket.description,
            ticket.status.as_str(),
            ticket.priority.as_str(),
            ticket.assigned_to,
            serde_json::to_string(&ticket.chat_context)?,
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
            ticket.resolved_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub fn get_ticket(conn: &Connection, ticket_id: &str) -> Result<Option<EscalationTicket>> {
    let ticket = conn
        .query_row(
            "SELECT * FROM escalation_tickets WHERE ticket_id = ?1",
            params![ticket_id],
            ticket_from_row,
        )
        .optional()?;
    Ok(ticket)
}

/// Write back the mutable fields of a ticket
pub fn update_ticket(conn: &Connection, ticket: &EscalationTicket) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE escalation_tickets
         SET status = ?2, priority = ?3, assigned_to = ?4, updated_at = ?5, resolved_at = ?6
         WHERE ticket_id = ?1",
        params![
            ticket.ticket_id,
            ticket.status.as_str(),
            ticket.priority.as_str(),
            ticket.assigned_to,
            ticket.updated_at.to_rfc3339(),
            ticket.resolved_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(changed > 0)
}

/// Tickets newest first, optionally filtered by tenant and status
pub fn list_tickets(
    conn: &Connection,
    tenant_id: Option<&str>,
    status: Option<TicketStatus>,
) -> Result<Vec<EscalationTicket>> {
    let mut sql = String::from("SELECT * FROM escalation_tickets WHERE 1 = 1");
    let mut values: Vec<String> = Vec::new();

    if let Some(tenant_id) = tenant_id {
        values.push(tenant_id.to_string());
        sql.push_str(&format!(" AND tenant_id = ?{}", values.len()));
    }
    if let Some(status) = status {
        values.push(status.as_str().to_string());
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY created_at DESC, ticket_id");

    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(rusqlite::params_from_iter(values.iter()), ticket_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tickets)
}

pub fn count_tickets(conn: &Connection, status: TicketStatus) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM escalation_tickets WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn insert_meeting(conn: &Connection, meeting: &Meeting) -> Result<()> {
    conn.execute(
        "INSERT INTO meeting_schedules (meeting_id, session_id, tenant_id, user_id, title,
                                        description, scheduled_time, duration_minutes,
                                        meeting_type, calendar_provider, calendar_event_id,
                                        status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            meeting.meeting_id,
            meeting.session_id,
            meeting.tenant_id,
            meeting.user_id,
            meeting.title,
            meeting.description,
            meeting.scheduled_time.to_rfc3339(),
            meeting.duration_minutes,
            meeting.meeting_type,
            meeting.calendar_provider,
            meeting.calendar_event_id,
            meeting.status.as_str(),
            meeting.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_meeting(conn: &Connection, meeting_id: &str) -> Result<Option<Meeting>> {
    let meeting = conn
        .query_row(
            "SELECT * FROM meeting_schedules WHERE meeting_id = ?1",
            params![meeting_id],
            meeting_from_row,
        )
        .optional()?;
    Ok(meeting)
}

/// Meetings of a tenant in scheduled order
pub fn list_meetings(conn: &Connection, tenant_id: &str) -> Result<Vec<Meeting>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM meeting_schedules WHERE tenant_id = ?1 ORDER BY scheduled_time",
    )?;
    let meetings = stmt
        .query_map(params![tenant_id], meeting_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(meetings)
}

pub fn set_meeting_status(
    conn: &Connection,
    meeting_id: &str,
    status: MeetingStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE meeting_schedules SET status = ?2 WHERE meeting_id = ?1",
        params![meeting_id, status.as_str()],
    )?;
    Ok(changed > 0)
}
