//! Permission system for tenant sessions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capabilities a tenant can grant its sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Ask questions over uploaded documents, ingest documents
    ReadDocuments,
    /// Call external tools and view analytics
    UseTools,
    /// Generate printable forms
    GenerateForms,
    /// Administrative access (implies everything)
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ReadDocuments,
        Permission::UseTools,
        Permission::GenerateForms,
        Permission::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadDocuments => "read_documents",
            Permission::UseTools => "use_tools",
            Permission::GenerateForms => "generate_forms",
            Permission::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read_documents" => Ok(Permission::ReadDocuments),
            "use_tools" => Ok(Permission::UseTools),
            "generate_forms" => Ok(Permission::GenerateForms),
            "admin" => Ok(Permission::Admin),
            _ => Err(format!("Unknown permission: {}", s)),
        }
    }
}

/// A set of granted permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create an empty permission set
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissions granted to a newly created tenant
    pub fn standard() -> Self {
        [
            Permission::ReadDocuments,
            Permission::UseTools,
            Permission::GenerateForms,
        ]
        .into_iter()
        .collect()
    }

    /// Standard permissions plus admin
    pub fn admin() -> Self {
        let mut set = Self::standard();
        set.grant(Permission::Admin);
        set
    }

    /// Parse a list of permission names
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        names
            .iter()
            .map(|n| n.as_ref().parse::<Permission>())
            .collect()
    }

    /// Check a permission; admin holds all of them
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&Permission::Admin) || self.permissions.contains(&permission)
    }

    pub fn is_admin(&self) -> bool {
        self.permissions.contains(&Permission::Admin)
    }

    pub fn grant(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    pub fn revoke(&mut self, permission: Permission) {
        self.permissions.remove(&permission);
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.permissions.iter().map(|p| p.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_permissions() {
        let set = PermissionSet::standard();
        assert!(set.has(Permission::ReadDocuments));
        assert!(set.has(Permission::UseTools));
        assert!(set.has(Permission::GenerateForms));
        assert!(!set.has(Permission::Admin));
    }

    #[test]
    fn test_admin_implies_all() {
        let set: PermissionSet = [Permission::Admin].into_iter().collect();
        for p in Permission::ALL {
            assert!(set.has(p));
        }
    }

    #[test]
    fn test_parse_list() {
        let set = PermissionSet::parse_list(&["read_documents", "USE_TOOLS"]).unwrap();
        assert_eq!(set.names(), vec!["read_documents", "use_tools"]);
        assert!(PermissionSet::parse_list(&["fly"]).is_err());
    }

    #[test]
    fn test_serde_as_list() {
        let set = PermissionSet::standard();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["read_documents","use_tools","generate_forms"]"#);
        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
