//! Tenant queries

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_datetime;
use crate::error::Result;
use crate::tenants::PermissionSet;
use crate::types::TenantConfig;

fn tenant_from_row(row: &Row) -> rusqlite::Result<TenantConfig> {
    let permissions: String = row.get("permissions")?;
    let rate_limits: String = row.get("rate_limits")?;
    let created_at: String = row.get("created_at")?;
    let api_key_hash: Option<String> = row.get("api_key_hash")?;

    Ok(TenantConfig {
        tenant_id: row.get("tenant_id")?,
        name: row.get("name")?,
        permissions: serde_json::from_str::<PermissionSet>(&permissions).unwrap_or_default(),
        rate_limits: serde_json::from_str::<HashMap<String, f64>>(&rate_limits)
            .unwrap_or_default(),
        created_at: parse_datetime(&created_at),
        is_active: row.get::<_, i64>("is_active")? != 0,
        max_documents: row.get("max_documents")?,
        max_api_calls_per_hour: row.get("max_api_calls_per_hour")?,
        has_api_key: api_key_hash.is_some(),
    })
}

/// Insert a tenant row
pub fn insert_tenant(
    conn: &Connection,
    tenant: &TenantConfig,
    api_key_hash: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tenants (tenant_id, name, permissions, rate_limits, api_key_hash,
                              created_at, is_active, max_documents, max_api_calls_per_hour)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tenant.tenant_id,
            tenant.name,
            serde_json::to_string(&tenant.permissions)?,
            serde_json::to_string(&tenant.rate_limits)?,
            api_key_hash,
            tenant.created_at.to_rfc3339(),
            tenant.is_active as i64,
            tenant.max_documents,
            tenant.max_api_calls_per_hour,
        ],
    )?;
    Ok(())
}

pub fn get_tenant(conn: &Connection, tenant_id: &str) -> Result<Option<TenantConfig>> {
    let tenant = conn
        .query_row(
            "SELECT * FROM tenants WHERE tenant_id = ?1",
            params![tenant_id],
            tenant_from_row,
        )
        .optional()?;
    Ok(tenant)
}

pub fn tenant_exists(conn: &Connection, tenant_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tenants WHERE tenant_id = ?1)",
        params![tenant_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn get_api_key_hash(conn: &Connection, tenant_id: &str) -> Result<Option<String>> {
    let hash: Option<Option<String>> = conn
        .query_row(
            "SELECT api_key_hash FROM tenants WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash.flatten())
}

pub fn set_api_key_hash(conn: &Connection, tenant_id: &str, hash: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tenants SET api_key_hash = ?2 WHERE tenant_id = ?1",
        params![tenant_id, hash],
    )?;
    Ok(changed > 0)
}

/// All tenants ordered by creation
pub fn list_tenants(conn: &Connection) -> Result<Vec<TenantConfig>> {
    let mut stmt = conn.prepare("SELECT * FROM tenants ORDER BY created_at, tenant_id")?;
    let tenants = stmt
        .query_map([], tenant_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tenants)
}

pub fn set_tenant_active(conn: &Connection, tenant_id: &str, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tenants SET is_active = ?2 WHERE tenant_id = ?1",
        params![tenant_id, active as i64],
    )?;
    Ok(changed > 0)
}

pub fn update_permissions(
    conn: &Connection,
    tenant_id: &str,
    permissions: &PermissionSet,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tenants SET permissions = ?2 WHERE tenant_id = ?1",
        params![tenant_id, serde_json::to_string(permissions)?],
    )?;
    Ok(changed > 0)
}

/// (total, active) tenant counts
pub fn count_tenants(conn: &Connection) -> Result<(i64, i64)> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM tenants",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(counts)
}
