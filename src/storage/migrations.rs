//! Database migrations for SupportDesk

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Tenants, documents, vector chunks and chat history (v1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            permissions TEXT NOT NULL DEFAULT '[]',
            rate_limits TEXT NOT NULL DEFAULT '{}',
            api_key_hash TEXT,
            created_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            max_documents INTEGER NOT NULL DEFAULT 1000,
            max_api_calls_per_hour INTEGER NOT NULL DEFAULT 1000
        );

        CREATE TABLE IF NOT EXISTS documents (
            document_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            original_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_type TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            user_id TEXT,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            indexed INTEGER NOT NULL DEFAULT 0,
            tags TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_documents_tenant ON documents(tenant_id, uploaded_at DESC);
        CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(tenant_id, file_hash);

        -- Vector index rows; every query filters on tenant_id
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            content TEXT NOT NULL,
            source TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(document_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON chunks(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index);

        CREATE TABLE IF NOT EXISTS chat_sessions (
            session_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            user_id TEXT,
            permissions TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_tenant ON chat_sessions(tenant_id, last_activity DESC);

        CREATE TABLE IF NOT EXISTS chat_messages (
            message_id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            user_id TEXT,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            agent_type TEXT,
            document_references TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(session_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id, seq);

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;

    Ok(())
}

/// Escalation, meetings, widget branding, tool registry, human takeover (v2)
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE chat_sessions ADD COLUMN taken_over_by TEXT;
        ALTER TABLE chat_sessions ADD COLUMN taken_over_at TEXT;

        CREATE TABLE IF NOT EXISTS escalation_tickets (
            ticket_id TEXT PRIMARY KEY,
            session_id TEXT,
            tenant_id TEXT NOT NULL,
            user_id TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'open',
            priority TEXT NOT NULL DEFAULT 'medium',
            assigned_to TEXT,
            chat_context TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            resolved_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_tenant ON escalation_tickets(tenant_id, status, created_at DESC);

        CREATE TABLE IF NOT EXISTS meeting_schedules (
            meeting_id TEXT PRIMARY KEY,
            session_id TEXT,
            tenant_id TEXT NOT NULL,
            user_id TEXT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            scheduled_time TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL DEFAULT 30,
            meeting_type TEXT NOT NULL DEFAULT 'general',
            calendar_provider TEXT,
            calendar_event_id TEXT,
            status TEXT NOT NULL DEFAULT 'scheduled',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_meetings_tenant ON meeting_schedules(tenant_id, scheduled_time);

        CREATE TABLE IF NOT EXISTS tenant_customization (
            tenant_id TEXT PRIMARY KEY,
            theme_color TEXT NOT NULL DEFAULT '#667eea',
            chat_background_color TEXT NOT NULL DEFAULT '#ffffff',
            welcome_message TEXT NOT NULL,
            logo_url TEXT,
            widget_position TEXT NOT NULL DEFAULT 'bottom-right',
            custom_css TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tool_registrations (
            tenant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            spec TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            registered_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, name)
        );

        INSERT INTO schema_version (version) VALUES (2);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_takeover_columns_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.prepare("SELECT taken_over_by, taken_over_at FROM chat_sessions")
            .unwrap();
    }
}
