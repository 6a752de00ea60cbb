//! SupportDesk - multi-tenant customer-support chatbot core
//!
//! Tenants upload documents into a per-tenant vector index, chat sessions
//! are routed to specialised agents (document Q&A, form generation, tool
//! calls, analytics, escalation), and human agents can take conversations
//! over from a console fed by real-time events.

pub mod admin;
pub mod agents;
pub mod chat;
pub mod config;
pub mod console;
pub mod customization;
pub mod desk;
pub mod embedding;
pub mod error;
pub mod escalation;
pub mod forms;
pub mod ids;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod mcp;
pub mod realtime;
pub mod retrieval;
pub mod sessions;
pub mod storage;
pub mod tenants;
pub mod tools;
pub mod types;

pub use config::DeskConfig;
pub use desk::Desk;
pub use error::{DeskError, Result};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
