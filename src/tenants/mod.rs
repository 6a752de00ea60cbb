//! Tenant store
//!
//! Tenants are the isolation unit: documents, sessions, tools and tickets
//! are all scoped by `tenant_id`. Every other component looks tenants up
//! here before doing work.

mod permissions;

pub use permissions::{Permission, PermissionSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DeskError, Result};
use crate::storage::{customization_queries, tenant_queries, Storage};
use crate::types::{
    default_rate_limits, normalize_tenant_id, TenantConfig, TenantCustomization,
    DEFAULT_TENANT_ID,
};

/// Default per-tenant document quota
pub const DEFAULT_MAX_DOCUMENTS: i64 = 1000;

/// Default per-tenant hourly tool call quota
pub const DEFAULT_MAX_API_CALLS_PER_HOUR: i64 = 1000;

/// Input for creating a tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTenant {
    pub tenant_id: String,
    pub name: String,
    /// Defaults to [`PermissionSet::standard`]
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
    /// Stored hashed; required to match when presented
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub max_documents: Option<i64>,
}

impl NewTenant {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Hash an API key for storage
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Compare two digests without short-circuiting on the first differing byte
fn digests_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Tenant registry backed by storage
#[derive(Clone)]
pub struct TenantRegistry {
    storage: Storage,
}

impl TenantRegistry {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Create a tenant along with its default widget branding
    ///
    /// Fails with `Conflict` when the id is taken.
    pub fn create_tenant(&self, input: NewTenant) -> Result<TenantConfig> {
        let tenant_id = normalize_tenant_id(&input.tenant_id)
            .map_err(|e| DeskError::InvalidInput(e.to_string()))?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DeskError::InvalidInput(
                "Tenant name cannot be empty".to_string(),
            ));
        }

        let tenant = TenantConfig {
            tenant_id: tenant_id.clone(),
            name: name.to_string(),
            permissions: input.permissions.unwrap_or_else(PermissionSet::standard),
            rate_limits: default_rate_limits(),
            created_at: Utc::now(),
            is_active: true,
            max_documents: input.max_documents.unwrap_or(DEFAULT_MAX_DOCUMENTS),
            max_api_calls_per_hour: DEFAULT_MAX_API_CALLS_PER_HOUR,
            has_api_key: input.api_key.is_some(),
        };
        let key_hash = input.api_key.as_deref().map(hash_api_key);

        self.storage.with_transaction(|conn| {
            if tenant_queries::tenant_exists(conn, &tenant_id)? {
                return Err(DeskError::Conflict(format!(
                    "Tenant {} already exists",
                    tenant_id
                )));
            }
            tenant_queries::insert_tenant(conn, &tenant, key_hash.as_deref())?;
            customization_queries::upsert_customization(
                conn,
                &TenantCustomization::defaults(&tenant_id),
            )?;
            Ok(())
        })?;

        tracing::info!("Created tenant {} ({})", tenant.tenant_id, tenant.name);
        Ok(tenant)
    }

    /// Look up a tenant, `None` if missing
    pub fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>> {
        self.storage
            .with_connection(|conn| tenant_queries::get_tenant(conn, tenant_id))
    }

    /// Look up a tenant, `NotFound` if missing
    pub fn get(&self, tenant_id: &str) -> Result<TenantConfig> {
        self.find(tenant_id)?
            .ok_or_else(|| DeskError::not_found("Tenant", tenant_id))
    }

    /// Look up a tenant that must exist and be active
    pub fn get_active(&self, tenant_id: &str) -> Result<TenantConfig> {
        let tenant = self.get(tenant_id)?;
        if !tenant.is_active {
            return Err(DeskError::TenantInactive(tenant_id.to_string()));
        }
        Ok(tenant)
    }

    pub fn list(&self) -> Result<Vec<TenantConfig>> {
        self.storage.with_connection(tenant_queries::list_tenants)
    }

    pub fn set_active(&self, tenant_id: &str, active: bool) -> Result<()> {
        let changed = self
            .storage
            .with_connection(|conn| tenant_queries::set_tenant_active(conn, tenant_id, active))?;
        if !changed {
            return Err(DeskError::not_found("Tenant", tenant_id));
        }
        tracing::info!("Tenant {} active={}", tenant_id, active);
        Ok(())
    }

    pub fn set_permissions(&self, tenant_id: &str, permissions: &PermissionSet) -> Result<()> {
        let changed = self.storage.with_connection(|conn| {
            tenant_queries::update_permissions(conn, tenant_id, permissions)
        })?;
        if !changed {
            return Err(DeskError::not_found("Tenant", tenant_id));
        }
        Ok(())
    }

    /// Set or clear the tenant API key
    pub fn set_api_key(&self, tenant_id: &str, api_key: Option<&str>) -> Result<()> {
        let hash = api_key.map(hash_api_key);
        let changed = self.storage.with_connection(|conn| {
            tenant_queries::set_api_key_hash(conn, tenant_id, hash.as_deref())
        })?;
        if !changed {
            return Err(DeskError::not_found("Tenant", tenant_id));
        }
        Ok(())
    }

    /// Check that a tenant may open sessions
    ///
    /// Missing or inactive tenants fail. A presented key must match the
    /// stored one when the tenant has a key.
    pub fn authenticate(&self, tenant_id: &str, api_key: Option<&str>) -> Result<bool> {
        let Some(tenant) = self.find(tenant_id)? else {
            return Ok(false);
        };
        if !tenant.is_active {
            return Ok(false);
        }

        if let Some(key) = api_key {
            let stored = self
                .storage
                .with_connection(|conn| tenant_queries::get_api_key_hash(conn, tenant_id))?;
            if let Some(stored) = stored {
                return Ok(digests_match(&stored, &hash_api_key(key)));
            }
        }

        Ok(true)
    }

    /// Create the built-in admin tenant if it does not exist yet
    pub fn ensure_default_tenant(&self) -> Result<TenantConfig> {
        if let Some(tenant) = self.find(DEFAULT_TENANT_ID)? {
            return Ok(tenant);
        }
        let mut input = NewTenant::new(DEFAULT_TENANT_ID, "Default Tenant");
        input.permissions = Some(PermissionSet::admin());
        match self.create_tenant(input) {
            Err(DeskError::Conflict(_)) => self.get(DEFAULT_TENANT_ID),
            other => other,
        }
    }

    /// (total, active) counts
    pub fn counts(&self) -> Result<(i64, i64)> {
        self.storage.with_connection(tenant_queries::count_tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TenantRegistry {
        TenantRegistry::new(Storage::open_in_memory().unwrap())
    }

    #[test]
    fn test_create_tenant_defaults() {
        let registry = registry();
        let tenant = registry.create_tenant(NewTenant::new("Acme", "Acme Inc")).unwrap();

        assert_eq!(tenant.tenant_id, "acme");
        assert_eq!(tenant.permissions, PermissionSet::standard());
        assert_eq!(tenant.max_documents, 1000);
        assert_eq!(tenant.rate_limits.get("search_web"), Some(&1.0));
        assert!(tenant.is_active);

        let loaded = registry.get("acme").unwrap();
        assert_eq!(loaded.name, "Acme Inc");
    }

    #[test]
    fn test_duplicate_tenant_conflicts() {
        let registry = registry();
        registry.create_tenant(NewTenant::new("acme", "Acme")).unwrap();
        let err = registry
            .create_tenant(NewTenant::new("acme", "Acme again"))
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));
    }

    #[test]
    fn test_authenticate() {
        let registry = registry();
        let mut input = NewTenant::new("acme", "Acme");
        input.api_key = Some("s3cret".into());
        registry.create_tenant(input).unwrap();

        assert!(registry.authenticate("acme", None).unwrap());
        assert!(registry.authenticate("acme", Some("s3cret")).unwrap());
        assert!(!registry.authenticate("acme", Some("wrong")).unwrap());
        assert!(!registry.authenticate("ghost", None).unwrap());

        registry.set_active("acme", false).unwrap();
        assert!(!registry.authenticate("acme", Some("s3cret")).unwrap());
        assert!(matches!(
            registry.get_active("acme"),
            Err(DeskError::TenantInactive(_))
        ));
    }

    #[test]
    fn test_digests_match() {
        let digest = hash_api_key("secret");
        assert!(digests_match(&digest, &hash_api_key("secret")));
        assert!(!digests_match(&digest, &hash_api_key("secreT")));
        assert!(!digests_match(&digest, &digest[..digest.len() - 1]));
        assert!(!digests_match("", &digest));
    }

    #[test]
    fn test_default_tenant_is_admin_and_idempotent() {
        let registry = registry();
        let first = registry.ensure_default_tenant().unwrap();
        let second = registry.ensure_default_tenant().unwrap();
        assert!(first.permissions.is_admin());
        assert_eq!(first.tenant_id, second.tenant_id);
        assert_eq!(registry.counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_invalid_tenant_id() {
        let registry = registry();
        let err = registry
            .create_tenant(NewTenant::new("bad id!", "Bad"))
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput(_)));
    }
}
