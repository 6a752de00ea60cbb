//! System-wide statistics for operators

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::escalation::EscalationService;
use crate::index::{IndexStats, VectorIndex};
use crate::sessions::SessionStore;
use crate::storage::{chat_queries, document_queries, Storage};
use crate::tenants::TenantRegistry;
use crate::tools::{ToolRegistry, ToolUsage};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    pub total_tenants: i64,
    pub active_tenants: i64,
    pub tenants: Vec<TenantSummary>,
    pub active_sessions: i64,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_documents: i64,
    pub open_tickets: i64,
    pub database_bytes: i64,
    pub tools: Vec<ToolUsage>,
    /// Keyed by tenant; tenants without chunks are left out
    pub index: BTreeMap<String, IndexStats>,
    pub generated_at: DateTime<Utc>,
}

impl SystemStats {
    /// Number of figures an analytics report draws on
    pub fn data_points(&self) -> usize {
        8 + self.tools.len() + self.index.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantOverview {
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub documents: i64,
    pub chunks: i64,
    pub messages: i64,
    pub max_documents: i64,
}

#[derive(Clone)]
pub struct AdminService {
    storage: Storage,
    tenants: TenantRegistry,
    sessions: SessionStore,
    index: VectorIndex,
    tools: ToolRegistry,
    escalation: EscalationService,
}

impl AdminService {
    pub fn new(
        storage: Storage,
        tenants: TenantRegistry,
        sessions: SessionStore,
        index: VectorIndex,
        tools: ToolRegistry,
        escalation: EscalationService,
    ) -> Self {
        Self {
            storage,
            tenants,
            sessions,
            index,
            tools,
            escalation,
        }
    }

    pub fn system_stats(&self) -> Result<SystemStats> {
        let (total_tenants, active_tenants) = self.tenants.counts()?;
        let tenants = self.tenants.list()?;

        let mut index = BTreeMap::new();
        for tenant in &tenants {
            if let Some(stats) = self.index.stats(&tenant.tenant_id)? {
                index.insert(tenant.tenant_id.clone(), stats);
            }
        }

        let (total_documents, total_messages) = self.storage.with_connection(|conn| {
            Ok((
                document_queries::count_documents(conn, None)?,
                chat_queries::count_messages(conn, None)?,
            ))
        })?;

        Ok(SystemStats {
            total_tenants,
            active_tenants,
            tenants: tenants
                .into_iter()
                .map(|t| TenantSummary {
                    permissions: t.permissions.names().into_iter().map(String::from).collect(),
                    tenant_id: t.tenant_id,
                    name: t.name,
                    is_active: t.is_active,
                    created_at: t.created_at,
                })
                .collect(),
            active_sessions: self.sessions.active_count()?,
            total_sessions: self.sessions.total_count()?,
            total_messages,
            total_documents,
            open_tickets: self.escalation.open_ticket_count()?,
            database_bytes: self.storage.db_size()?,
            tools: self.tools.stats(None),
            index,
            generated_at: Utc::now(),
        })
    }

    /// One row per tenant with its content counts
    pub fn tenant_overview(&self) -> Result<Vec<TenantOverview>> {
        let tenants = self.tenants.list()?;
        self.storage.with_connection(|conn| {
            tenants
                .into_iter()
                .map(|t| {
                    Ok(TenantOverview {
                        documents: document_queries::count_documents(conn, Some(&t.tenant_id))?,
                        chunks: document_queries::count_chunks(conn, &t.tenant_id)?,
                        messages: chat_queries::count_messages(conn, Some(&t.tenant_id))?,
                        max_documents: t.max_documents,
                        tenant_id: t.tenant_id,
                        name: t.name,
                        is_active: t.is_active,
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::realtime::RealtimeManager;
    use crate::tenants::NewTenant;
    use crate::types::NewTicket;
    use std::sync::Arc;

    #[test]
    fn test_stats_on_fresh_install() {
        let storage = Storage::open_in_memory().unwrap();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.ensure_default_tenant().unwrap();
        tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();
        tenants.set_active("acme", false).unwrap();

        let sessions = SessionStore::new(storage.clone(), tenants.clone());
        sessions.create_session("default", None, None).unwrap();
        let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(64)));
        let tools = ToolRegistry::new(storage.clone(), tenants.clone(), index.clone()).unwrap();
        let escalation =
            EscalationService::new(storage.clone(), tenants.clone(), RealtimeManager::new());
        escalation
            .create_ticket(NewTicket {
                tenant_id: "default".into(),
                title: "Help".into(),
                ..NewTicket::default()
            })
            .unwrap();

        let admin = AdminService::new(storage, tenants, sessions, index, tools, escalation);
        let stats = admin.system_stats().unwrap();
        assert_eq!(stats.total_tenants, 2);
        assert_eq!(stats.active_tenants, 1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.open_tickets, 1);
        assert_eq!(stats.total_documents, 0);
        assert!(stats.index.is_empty());
        assert!(stats.database_bytes > 0);

        let overview = admin.tenant_overview().unwrap();
        assert_eq!(overview.len(), 2);
        assert!(overview.iter().all(|t| t.documents == 0 && t.chunks == 0));
        assert!(overview.iter().any(|t| t.tenant_id == "acme" && !t.is_active));
    }
}
