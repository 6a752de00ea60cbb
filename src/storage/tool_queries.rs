//! Persisted dynamic tool registrations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::parse_datetime;
use crate::error::Result;
use crate::tools::HttpToolSpec;

/// A stored registration row
#[derive(Debug, Clone)]
pub struct StoredTool {
    pub tenant_id: String,
    pub spec: HttpToolSpec,
    pub enabled: bool,
    pub registered_at: DateTime<Utc>,
}

/// Insert or replace the tool of the same name for the tenant
pub fn upsert_tool(
    conn: &Connection,
    tenant_id: &str,
    spec: &HttpToolSpec,
    enabled: bool,
    registered_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tool_registrations (tenant_id, name, spec, enabled, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tenant_id,
            spec.name,
            serde_json::to_string(spec)?,
            enabled as i64,
            registered_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn delete_tool(conn: &Connection, tenant_id: &str, name: &str) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM tool_registrations WHERE tenant_id = ?1 AND name = ?2",
        params![tenant_id, name],
    )?;
    Ok(changed > 0)
}

pub fn set_tool_enabled(
    conn: &Connection,
    tenant_id: &str,
    name: &str,
    enabled: bool,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tool_registrations SET enabled = ?3 WHERE tenant_id = ?1 AND name = ?2",
        params![tenant_id, name, enabled as i64],
    )?;
    Ok(changed > 0)
}

/// Every registration; rows with an unreadable spec are skipped
pub fn list_tools(conn: &Connection) -> Result<Vec<StoredTool>> {
    let mut stmt = conn.prepare(
        "SELECT tenant_id, spec, enabled, registered_at FROM tool_registrations
         ORDER BY tenant_id, registered_at",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let tenant_id: String = row.get(0)?;
            let spec: String = row.get(1)?;
            let enabled: i64 = row.get(2)?;
            let registered_at: String = row.get(3)?;
            Ok((tenant_id, spec, enabled != 0, registered_at))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tools = Vec::with_capacity(rows.len());
    for (tenant_id, spec, enabled, registered_at) in rows {
        match serde_json::from_str::<HttpToolSpec>(&spec) {
            Ok(spec) => tools.push(StoredTool {
                tenant_id,
                spec,
                enabled,
                registered_at: parse_datetime(&registered_at),
            }),
            Err(e) => tracing::warn!("Skipping unreadable tool registration for {}: {}", tenant_id, e),
        }
    }
    Ok(tools)
}
