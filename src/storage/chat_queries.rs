//! Chat session and message queries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, parse_optional_datetime};
use crate::error::Result;
use crate::types::{ChatMessage, ChatSession, MessageRole};

fn session_from_row(row: &Row) -> rusqlite::Result<ChatSession> {
    let permissions: String = row.get("permissions")?;
    let created_at: String = row.get("created_at")?;
    let last_activity: String = row.get("last_activity")?;

    Ok(ChatSession {
        session_id: row.get("session_id")?,
        tenant_id: row.get("tenant_id")?,
        user_id: row.get("user_id")?,
        permissions: serde_json::from_str(&permissions).unwrap_or_default(),
        created_at: parse_datetime(&created_at),
        last_activity: parse_datetime(&last_activity),
        taken_over_by: row.get("taken_over_by")?,
        taken_over_at: parse_optional_datetime(row.get("taken_over_at")?),
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get("role")?;
    let references: String = row.get("document_references")?;
    let created_at: String = row.get("created_at")?;

    Ok(ChatMessage {
        message_id: row.get("message_id")?,
        session_id: row.get("session_id")?,
        tenant_id: row.get("tenant_id")?,
        user_id: row.get("user_id")?,
        role: role.parse().unwrap_or(MessageRole::User),
        content: row.get("content")?,
        agent_type: row.get("agent_type")?,
        document_references: serde_json::from_str(&references).unwrap_or_default(),
        created_at: parse_datetime(&created_at),
    })
}

pub fn insert_session(conn: &Connection, session: &ChatSession) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_sessions (session_id, tenant_id, user_id, permissions,
                                    created_at, last_activity, taken_over_by, taken_over_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session.session_id,
            session.tenant_id,
            session.user_id,
            serde_json::to_string(&session.permissions)?,
            session.created_at.to_rfc3339(),
            session.last_activity.to_rfc3339(),
            session.taken_over_by,
            session.taken_over_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<ChatSession>> {
    let session = conn
        .query_row(
            "SELECT * FROM chat_sessions WHERE session_id = ?1",
            params![session_id],
            session_from_row,
        )
        .optional()?;
    Ok(session)
}

pub fn touch_session(conn: &Connection, session_id: &str, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE chat_sessions SET last_activity = ?2 WHERE session_id = ?1",
        params![session_id, at.to_rfc3339()],
    )?;
    Ok(())
}

/// Sessions ordered by most recent activity
pub fn list_sessions(
    conn: &Connection,
    tenant_id: Option<&str>,
    limit: i64,
) -> Result<Vec<ChatSession>> {
    let sessions = match tenant_id {
        Some(tenant_id) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM chat_sessions WHERE tenant_id = ?1
                 ORDER BY last_activity DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![tenant_id, limit], session_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt = conn
                .prepare("SELECT * FROM chat_sessions ORDER BY last_activity DESC LIMIT ?1")?;
            let rows = stmt
                .query_map(params![limit], session_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };
    Ok(sessions)
}

/// Set or clear the human agent handling a session
pub fn set_takeover(
    conn: &Connection,
    session_id: &str,
    agent_id: Option<&str>,
    at: Option<DateTime<Utc>>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE chat_sessions SET taken_over_by = ?2, taken_over_at = ?3 WHERE session_id = ?1",
        params![session_id, agent_id, at.map(|t| t.to_rfc3339())],
    )?;
    Ok(changed > 0)
}

/// Assign a session to `agent_id` unless another agent already holds it
pub fn claim_takeover(
    conn: &Connection,
    session_id: &str,
    agent_id: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE chat_sessions SET taken_over_by = ?2, taken_over_at = ?3
         WHERE session_id = ?1 AND (taken_over_by IS NULL OR taken_over_by = ?2)",
        params![session_id, agent_id, at.to_rfc3339()],
    )?;
    Ok(changed > 0)
}

/// Sessions with activity at or after `since`
pub fn count_active_sessions(conn: &Connection, since: DateTime<Utc>) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM chat_sessions WHERE last_activity >= ?1",
        params![since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_sessions(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM chat_sessions", [], |row| row.get(0))?;
    Ok(count)
}

pub fn insert_message(conn: &Connection, message: &ChatMessage) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_messages (message_id, seq, session_id, tenant_id, user_id, role,
                                    content, agent_type, document_references, created_at)
         VALUES (?1,
                 (SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE session_id = ?2),
                 ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.message_id,
            message.session_id,
            message.tenant_id,
            message.user_id,
            message.role.as_str(),
            message.content,
            message.agent_type,
            serde_json::to_string(&message.document_references)?,
            message.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Last `limit` messages of a session in chronological order
pub fn recent_messages(conn: &Connection, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM chat_messages WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2",
    )?;
    let mut messages = stmt
        .query_map(params![session_id, limit], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    messages.reverse();
    Ok(messages)
}

/// Full transcript of a session
pub fn all_messages(conn: &Connection, session_id: &str) -> Result<Vec<ChatMessage>> {
    let mut stmt =
        conn.prepare("SELECT * FROM chat_messages WHERE session_id = ?1 ORDER BY seq")?;
    let messages = stmt
        .query_map(params![session_id], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

pub fn count_messages(conn: &Connection, tenant_id: Option<&str>) -> Result<i64> {
    let count = match tenant_id {
        Some(tenant_id) => conn.query_row(
            "SELECT COUNT(*) FROM chat_messages WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?,
    };
    Ok(count)
}
