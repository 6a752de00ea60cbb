//! SupportDesk MCP Server
//!
//! Run with: supportdesk-server

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use supportdesk::config::{DeskConfig, EmbeddingConfig, IngestConfig, LlmConfig, StorageConfig};
use supportdesk::error::Result;
use supportdesk::mcp::{DeskHandler, McpServer};
use supportdesk::realtime::RealtimeServer;
use supportdesk::Desk;

#[derive(Parser, Debug)]
#[command(name = "supportdesk-server")]
#[command(about = "SupportDesk JSON-RPC server for multi-tenant support bots")]
#[command(version)]
struct Args {
    /// Directory for the database, uploads and generated forms
    #[arg(
        long,
        env = "SUPPORTDESK_DATA_DIR",
        default_value = "~/.local/share/supportdesk"
    )]
    data_dir: String,

    /// Database path (defaults to <data-dir>/supportdesk.db)
    #[arg(long, env = "SUPPORTDESK_DB_PATH")]
    db_path: Option<String>,

    /// Disable WAL journaling (network filesystems)
    #[arg(long, env = "SUPPORTDESK_NO_WAL")]
    no_wal: bool,

    /// Base URL the chat widget talks to
    #[arg(long, env = "SUPPORTDESK_PUBLIC_URL", default_value = "http://localhost:8000")]
    public_url: String,

    /// Embedding backend (hashed, openai)
    #[arg(long, env = "SUPPORTDESK_EMBEDDING_MODEL", default_value = "hashed")]
    embedding_model: String,

    /// Embedding dimensions
    #[arg(long, env = "SUPPORTDESK_EMBEDDING_DIMENSIONS", default_value = "384")]
    embedding_dimensions: usize,

    /// Chat model provider (openai, none)
    #[arg(long, env = "SUPPORTDESK_LLM_PROVIDER", default_value = "none")]
    llm_provider: String,

    /// Chat model name
    #[arg(long, env = "SUPPORTDESK_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "SUPPORTDESK_OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Chunk size in characters
    #[arg(long, env = "SUPPORTDESK_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, env = "SUPPORTDESK_CHUNK_OVERLAP", default_value = "150")]
    chunk_overlap: usize,

    /// WebSocket server port for console events (0 = disabled)
    #[arg(long, env = "SUPPORTDESK_WS_PORT", default_value = "0")]
    ws_port: u16,
}

impl Args {
    fn desk_config(&self) -> DeskConfig {
        let data_dir = PathBuf::from(shellexpand::tilde(&self.data_dir).to_string());
        let db_path = match &self.db_path {
            Some(path) => shellexpand::tilde(path).to_string(),
            None => data_dir.join("supportdesk.db").to_string_lossy().to_string(),
        };

        DeskConfig {
            data_dir,
            public_base_url: self.public_url.trim_end_matches('/').to_string(),
            storage: StorageConfig {
                db_path,
                wal: !self.no_wal,
            },
            embedding: EmbeddingConfig {
                model: self.embedding_model.clone(),
                api_key: self.openai_key.clone(),
                base_url: self.openai_base_url.clone(),
                embedding_model: None,
                dimensions: self.embedding_dimensions,
            },
            llm: LlmConfig {
                provider: self.llm_provider.clone(),
                api_key: self.openai_key.clone(),
                base_url: self.openai_base_url.clone(),
                model: self.llm_model.clone(),
                ..LlmConfig::default()
            },
            ingest: IngestConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                ..IngestConfig::default()
            },
            ..DeskConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON-RPC
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let desk = Desk::open(args.desk_config())?;

    if args.ws_port > 0 {
        let manager = desk.events().clone();
        let ws_port = args.ws_port;
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create WebSocket runtime: {}", e);
                    return;
                }
            };
            rt.block_on(async {
                tracing::info!("WebSocket server starting on port {}...", ws_port);
                if let Err(e) = RealtimeServer::new(manager, ws_port).start().await {
                    tracing::error!("WebSocket server error: {}", e);
                }
            });
        });
    }

    let server = McpServer::new(DeskHandler::new(desk)?);
    tracing::info!("SupportDesk server starting...");
    server.run()?;

    Ok(())
}
