//! Widget customization queries

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_datetime;
use crate::error::Result;
use crate::types::{TenantCustomization, WidgetPosition};

fn customization_from_row(row: &Row) -> rusqlite::Result<TenantCustomization> {
    let position: String = row.get("widget_position")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(TenantCustomization {
        tenant_id: row.get("tenant_id")?,
        theme_color: row.get("theme_color")?,
        chat_background_color: row.get("chat_background_color")?,
        welcome_message: row.get("welcome_message")?,
        logo_url: row.get("logo_url")?,
        widget_position: position.parse().unwrap_or(WidgetPosition::BottomRight),
        custom_css: row.get("custom_css")?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

pub fn get_customization(
    conn: &Connection,
    tenant_id: &str,
) -> Result<Option<TenantCustomization>> {
    let customization = conn
        .query_row(
            "SELECT * FROM tenant_customization WHERE tenant_id = ?1",
            params![tenant_id],
            customization_from_row,
        )
        .optional()?;
    Ok(customization)
}

/// Insert or replace; `created_at` of an existing row is kept
pub fn upsert_customization(conn: &Connection, c: &TenantCustomization) -> Result<()> {
    conn.execute(
        "INSERT INTO tenant_customization (tenant_id, theme_color, chat_background_color,
                                           welcome_message, logo_url, widget_position,
                                           custom_css, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(tenant_id) DO UPDATE SET
            theme_color = excluded.theme_color,
            chat_background_color = excluded.chat_background_color,
            welcome_message = excluded.welcome_message,
            logo_url = excluded.logo_url,
            widget_position = excluded.widget_position,
            custom_css = excluded.custom_css,
            updated_at = excluded.updated_at",
        params![
            c.tenant_id,
            c.theme_color,
            c.chat_background_color,
            c.welcome_message,
            c.logo_url,
            c.widget_position.as_str(),
            c.custom_css,
            c.created_at.to_rfc3339(),
            c.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}
