//! Wiring for a complete desk instance
//!
//! [`Desk`] owns one of every service, all sharing the same storage
//! handle and event bus. Binaries build it from a [`DeskConfig`]; tests
//! use [`Desk::with_parts`] to inject an in-memory database and a
//! scripted chat model.

use std::fs;
use std::sync::Arc;

use crate::admin::AdminService;
use crate::agents::{AgentDeps, Agents};
use crate::chat::ChatService;
use crate::config::DeskConfig;
use crate::console::ConsoleService;
use crate::customization::CustomizationService;
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::escalation::EscalationService;
use crate::forms::HtmlFormRenderer;
use crate::index::VectorIndex;
use crate::ingest::DocumentIngestor;
use crate::llm::{create_chat_model, ChatModel};
use crate::realtime::RealtimeManager;
use crate::retrieval::Retriever;
use crate::sessions::SessionStore;
use crate::storage::Storage;
use crate::tenants::TenantRegistry;
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct Desk {
    config: DeskConfig,
    storage: Storage,
    events: RealtimeManager,
    tenants: TenantRegistry,
    sessions: SessionStore,
    index: VectorIndex,
    ingestor: DocumentIngestor,
    retriever: Retriever,
    tools: ToolRegistry,
    escalation: EscalationService,
    customization: CustomizationService,
    admin: AdminService,
    console: ConsoleService,
    agents: Agents,
    chat: ChatService,
}

impl Desk {
    /// Open the database and build every service from `config`
    pub fn open(config: DeskConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage = Storage::open(config.storage.clone())?;
        let embedder = create_embedder(&config.embedding)?;
        let model = create_chat_model(&config.llm)?;
        tracing::info!(
            "Opening desk at {} (embeddings: {}, llm: {})",
            config.data_dir.display(),
            embedder.model_name(),
            config.llm.provider
        );
        Self::with_parts(config, storage, embedder, model)
    }

    pub fn with_parts(
        config: DeskConfig,
        storage: Storage,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        config.validate()?;
        let events = RealtimeManager::new();

        let tenants = TenantRegistry::new(storage.clone());
        tenants.ensure_default_tenant()?;

        let index = VectorIndex::new(storage.clone(), embedder);
        let ingestor = DocumentIngestor::new(
            storage.clone(),
            tenants.clone(),
            index.clone(),
            config.ingest.clone(),
            config.uploads_dir(),
            events.clone(),
        )?;
        let retriever = Retriever::new(index.clone(), config.retrieval.clone());
        let sessions = SessionStore::new(storage.clone(), tenants.clone());
        let tools = ToolRegistry::new(storage.clone(), tenants.clone(), index.clone())?;
        let escalation = EscalationService::new(storage.clone(), tenants.clone(), events.clone());
        let customization = CustomizationService::new(storage.clone(), tenants.clone());
        let admin = AdminService::new(
            storage.clone(),
            tenants.clone(),
            sessions.clone(),
            index.clone(),
            tools.clone(),
            escalation.clone(),
        );
        let console = ConsoleService::new(sessions.clone(), events.clone());

        let agents = Agents::new(AgentDeps {
            storage: storage.clone(),
            model,
            retriever: retriever.clone(),
            tools: tools.clone(),
            admin: admin.clone(),
            escalation: escalation.clone(),
            customization: customization.clone(),
            renderer: Arc::new(HtmlFormRenderer::new(config.forms_dir())),
        });
        let chat = ChatService::new(
            tenants.clone(),
            sessions.clone(),
            agents.clone(),
            events.clone(),
        );

        Ok(Self {
            config,
            storage,
            events,
            tenants,
            sessions,
            index,
            ingestor,
            retriever,
            tools,
            escalation,
            customization,
            admin,
            console,
            agents,
            chat,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn events(&self) -> &RealtimeManager {
        &self.events
    }

    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn ingestor(&self) -> &DocumentIngestor {
        &self.ingestor
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn escalation(&self) -> &EscalationService {
        &self.escalation
    }

    pub fn customization(&self) -> &CustomizationService {
        &self.customization
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn console(&self) -> &ConsoleService {
        &self.console
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::llm::DisabledModel;
    use crate::types::DEFAULT_TENANT_ID;

    #[test]
    fn test_with_parts_seeds_default_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Desk::with_parts(
            DeskConfig::with_data_dir(dir.path()),
            Storage::open_in_memory().unwrap(),
            Arc::new(HashedEmbedder::new(64)),
            Arc::new(DisabledModel),
        )
        .unwrap();

        let tenants = desk.tenants().list().unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].tenant_id, DEFAULT_TENANT_ID);
        assert!(desk.config().uploads_dir().starts_with(dir.path()));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Desk::open(DeskConfig::with_data_dir(dir.path().join("data"))).unwrap();
        assert!(dir.path().join("data").join("supportdesk.db").exists());
        assert!(desk.storage().db_size().unwrap() > 0);
    }
}
