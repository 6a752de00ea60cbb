//! Widget branding per tenant

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};
use crate::storage::{customization_queries, Storage};
use crate::tenants::TenantRegistry;
use crate::types::{TenantCustomization, WidgetPosition};

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Longest accepted welcome message
const MAX_WELCOME_CHARS: usize = 500;

/// Fields to change; `None` leaves the stored value alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomizationUpdate {
    #[serde(default)]
    pub theme_color: Option<String>,
    #[serde(default)]
    pub chat_background_color: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    /// Empty string clears the logo
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub widget_position: Option<String>,
    /// Empty string clears the stylesheet
    #[serde(default)]
    pub custom_css: Option<String>,
}

/// What an embedding page needs to draw the chat widget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetConfig {
    pub tenant_id: String,
    pub tenant_name: String,
    pub customization: TenantCustomization,
    pub chat_endpoint: String,
    pub widget_url: String,
}

fn check_color(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if HEX_COLOR.is_match(value) {
        Ok(value.to_lowercase())
    } else {
        Err(DeskError::InvalidInput(format!(
            "{} must be a hex colour like #667eea, got '{}'",
            field, value
        )))
    }
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Clone)]
pub struct CustomizationService {
    storage: Storage,
    tenants: TenantRegistry,
}

impl CustomizationService {
    pub fn new(storage: Storage, tenants: TenantRegistry) -> Self {
        Self { storage, tenants }
    }

    /// Stored branding, or the defaults when none was saved
    pub fn get_customization(&self, tenant_id: &str) -> Result<TenantCustomization> {
        self.tenants.get(tenant_id)?;
        let stored = self
            .storage
            .with_connection(|conn| customization_queries::get_customization(conn, tenant_id))?;
        Ok(stored.unwrap_or_else(|| TenantCustomization::defaults(tenant_id)))
    }

    pub fn save_customization(
        &self,
        tenant_id: &str,
        update: CustomizationUpdate,
    ) -> Result<TenantCustomization> {
        let mut current = self.get_customization(tenant_id)?;

        if let Some(color) = update.theme_color {
            current.theme_color = check_color("theme_color", &color)?;
        }
        if let Some(color) = update.chat_background_color {
            current.chat_background_color = check_color("chat_background_color", &color)?;
        }
        if let Some(message) = update.welcome_message {
            let message = message.trim();
            if message.is_empty() || message.chars().count() > MAX_WELCOME_CHARS {
                return Err(DeskError::InvalidInput(format!(
                    "welcome_message must be 1 to {} characters",
                    MAX_WELCOME_CHARS
                )));
            }
            current.welcome_message = message.to_string();
        }
        if let Some(position) = update.widget_position {
            current.widget_position = position
                .parse::<WidgetPosition>()
                .map_err(DeskError::InvalidInput)?;
        }
        if let Some(logo) = update.logo_url {
            current.logo_url = optional_text(logo);
        }
        if let Some(css) = update.custom_css {
            current.custom_css = optional_text(css);
        }
        current.updated_at = Utc::now();

        self.storage
            .with_connection(|conn| customization_queries::upsert_customization(conn, &current))?;
        tracing::info!("Saved widget customization for tenant {}", tenant_id);
        Ok(current)
    }

    /// Widget settings with endpoints rooted at `base_url`
    pub fn widget_config(&self, tenant_id: &str, base_url: &str) -> Result<WidgetConfig> {
        let tenant = self.tenants.get(tenant_id)?;
        let customization = self.get_customization(tenant_id)?;
        let base = base_url.trim_end_matches('/');
        Ok(WidgetConfig {
            chat_endpoint: format!("{}/api/chat", base),
            widget_url: format!("{}/widget/{}", base, tenant.tenant_id),
            tenant_id: tenant.tenant_id,
            tenant_name: tenant.name,
            customization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::NewTenant;

    fn service() -> CustomizationService {
        let storage = Storage::open_in_memory().unwrap();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.create_tenant(NewTenant::new("acme", "Acme Corp")).unwrap();
        CustomizationService::new(storage, tenants)
    }

    #[test]
    fn test_defaults_and_partial_update() {
        let service = service();
        let original = service.get_customization("acme").unwrap();
        assert_eq!(original.theme_color, "#667eea");

        let saved = service
            .save_customization(
                "acme",
                CustomizationUpdate {
                    theme_color: Some("#FF0000".into()),
                    widget_position: Some("top-left".into()),
                    logo_url: Some("https://acme.test/logo.png".into()),
                    ..CustomizationUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(saved.theme_color, "#ff0000");
        assert_eq!(saved.widget_position, WidgetPosition::TopLeft);
        assert_eq!(saved.chat_background_color, "#ffffff");
        assert_eq!(saved.created_at, original.created_at);

        let cleared = service
            .save_customization(
                "acme",
                CustomizationUpdate {
                    logo_url: Some(String::new()),
                    ..CustomizationUpdate::default()
                },
            )
            .unwrap();
        assert!(cleared.logo_url.is_none());
        assert_eq!(cleared.theme_color, "#ff0000");
    }

    #[test]
    fn test_rejects_bad_values() {
        let service = service();
        let bad_color = CustomizationUpdate {
            theme_color: Some("red".into()),
            ..CustomizationUpdate::default()
        };
        assert!(matches!(
            service.save_customization("acme", bad_color),
            Err(DeskError::InvalidInput(_))
        ));

        let bad_position = CustomizationUpdate {
            widget_position: Some("middle".into()),
            ..CustomizationUpdate::default()
        };
        assert!(service.save_customization("acme", bad_position).is_err());
        assert!(service.get_customization("ghost").is_err());
    }

    #[test]
    fn test_widget_config() {
        let service = service();
        let config = service.widget_config("acme", "https://desk.test/").unwrap();
        assert_eq!(config.tenant_name, "Acme Corp");
        assert_eq!(config.chat_endpoint, "https://desk.test/api/chat");
        assert_eq!(config.widget_url, "https://desk.test/widget/acme");
        assert!(matches!(
            service.widget_config("ghost", "https://desk.test"),
            Err(DeskError::NotFound { .. })
        ));
    }
}
