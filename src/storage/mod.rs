//! Storage engine for SupportDesk
//!
//! SQLite persistence for tenants, documents, the vector index, chat
//! history, escalation tickets, meetings, widget branding and registered
//! tools. Query functions take a `&Connection` so callers can compose them
//! inside [`Storage::with_transaction`].

mod connection;
mod migrations;
pub mod chat_queries;
pub mod customization_queries;
pub mod document_queries;
pub mod tenant_queries;
pub mod ticket_queries;
pub mod tool_queries;

pub use connection::Storage;
pub use migrations::SCHEMA_VERSION;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 column, falling back to now for legacy rows
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
