//! SupportDesk CLI
//!
//! Command-line interface for tenant administration, documents and chat.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use supportdesk::agents::AgentKind;
use supportdesk::chat::{ChatInput, ChatReply};
use supportdesk::config::{DeskConfig, EmbeddingConfig, LlmConfig};
use supportdesk::error::{DeskError, Result};
use supportdesk::escalation::TicketUpdate;
use supportdesk::tenants::{NewTenant, PermissionSet};
use supportdesk::tools::HttpToolSpec;
use supportdesk::types::{NewMeeting, NewTicket, TicketPriority, TicketStatus};
use supportdesk::Desk;

#[derive(Parser)]
#[command(name = "supportdesk")]
#[command(about = "Multi-tenant support desk CLI")]
#[command(version)]
struct Cli {
    /// Directory for the database, uploads and generated forms
    #[arg(
        long,
        env = "SUPPORTDESK_DATA_DIR",
        default_value = "~/.local/share/supportdesk"
    )]
    data_dir: String,

    /// Embedding backend (hashed, openai)
    #[arg(long, env = "SUPPORTDESK_EMBEDDING_MODEL", default_value = "hashed")]
    embedding_model: String,

    /// Chat model provider (openai, none)
    #[arg(long, env = "SUPPORTDESK_LLM_PROVIDER", default_value = "none")]
    llm_provider: String,

    /// Chat model name
    #[arg(long, env = "SUPPORTDESK_LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Ingest files or directories into a tenant's knowledge base
    Ingest {
        tenant: String,
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Manage ingested documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
    /// Similarity search over a tenant's documents
    Search {
        tenant: String,
        query: String,
        /// Maximum results
        #[arg(short, long)]
        k: Option<usize>,
        /// Minimum cosine similarity
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Chat with a tenant's bot (interactive without a message)
    Chat {
        tenant: String,
        message: Option<String>,
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
        /// Force an agent (greeting, doc_qa, form_gen, api_exec, analytics, escalate)
        #[arg(short, long)]
        agent: Option<String>,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Escalation tickets
    Ticket {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Meetings with support agents
    Meeting {
        #[command(subcommand)]
        action: MeetingAction,
    },
    /// Per-tenant HTTP tools
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },
    /// Show system statistics
    Stats,
}

#[derive(Subcommand)]
enum TenantAction {
    Create {
        id: String,
        name: String,
        /// Permissions (comma-separated)
        #[arg(short, long)]
        permissions: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        max_documents: Option<i64>,
    },
    List,
    Activate {
        id: String,
    },
    Deactivate {
        id: String,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    List { tenant: String },
    Delete { tenant: String, document_id: String },
    /// Delete every document of a tenant
    Clear { tenant: String },
    /// Re-embed every chunk of a tenant
    Reindex { tenant: String },
}

#[derive(Subcommand)]
enum TicketAction {
    List {
        #[arg(short, long)]
        tenant: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
    },
    Create {
        tenant: String,
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: String,
    },
    Update {
        id: String,
        #[arg(short, long)]
        status: Option<String>,
        /// Assignee; empty string unassigns
        #[arg(short, long)]
        assign: Option<String>,
        #[arg(short, long)]
        priority: Option<String>,
    },
}

#[derive(Subcommand)]
enum MeetingAction {
    Schedule {
        tenant: String,
        title: String,
        /// RFC 3339 start time
        time: String,
        #[arg(short, long, default_value = "30")]
        duration: u32,
    },
    List {
        tenant: String,
    },
    Cancel {
        id: String,
    },
}

#[derive(Subcommand)]
enum ToolAction {
    List {
        tenant: String,
    },
    /// Register a tool from a JSON spec
    Register {
        tenant: String,
        /// Spec as inline JSON or @path/to/spec.json
        spec: String,
    },
    Unregister {
        tenant: String,
        name: String,
    },
    /// Register the sample public-API tools
    Samples {
        tenant: String,
    },
    /// Call counts and errors
    Usage {
        #[arg(short, long)]
        tenant: Option<String>,
    },
}

fn parse_arg<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(DeskError::InvalidInput)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DeskConfig::with_data_dir(shellexpand::tilde(&cli.data_dir).to_string());
    config.embedding = EmbeddingConfig {
        model: cli.embedding_model.clone(),
        api_key: cli.openai_key.clone(),
        ..EmbeddingConfig::default()
    };
    config.llm = LlmConfig {
        provider: cli.llm_provider.clone(),
        api_key: cli.openai_key.clone(),
        model: cli.llm_model.clone(),
        ..LlmConfig::default()
    };
    let desk = Desk::open(config)?;

    match cli.command {
        Commands::Tenant { action } => match action {
            TenantAction::Create {
                id,
                name,
                permissions,
                api_key,
                max_documents,
            } => {
                let permissions = permissions
                    .map(|p| {
                        let names: Vec<&str> = p.split(',').map(str::trim).collect();
                        PermissionSet::parse_list(&names)
                    })
                    .transpose()
                    .map_err(DeskError::InvalidInput)?;
                let tenant = desk.tenants().create_tenant(NewTenant {
                    tenant_id: id,
                    name,
                    permissions,
                    api_key,
                    max_documents,
                })?;
                println!("Created tenant {}", tenant.tenant_id);
            }
            TenantAction::List => {
                for tenant in desk.tenants().list()? {
                    println!(
                        "{} - {} [{}] {}",
                        tenant.tenant_id,
                        tenant.name,
                        tenant.permissions.names().join(", "),
                        if tenant.is_active { "" } else { "(inactive)" }
                    );
                }
            }
            TenantAction::Activate { id } => {
                desk.tenants().set_active(&id, true)?;
                println!("Activated {}", id);
            }
            TenantAction::Deactivate { id } => {
                desk.tenants().set_active(&id, false)?;
                println!("Deactivated {}", id);
            }
        },

        Commands::Ingest { tenant, paths } => {
            let ingestor = desk.ingestor();
            if let [dir] = paths.as_slice() {
                if dir.is_dir() {
                    println!("{}", ingestor.ingest_dir(&tenant, dir)?);
                    return Ok(());
                }
            }
            let summary = ingestor.ingest_many(&tenant, &paths, None);
            for outcome in &summary.results {
                println!("{}: {}", outcome.filename, outcome.message);
            }
            println!("{}", summary.summary_line());
        }

        Commands::Docs { action } => match action {
            DocsAction::List { tenant } => {
                for doc in desk.ingestor().list_documents(&tenant)? {
                    println!(
                        "{} {} ({} bytes, {} chunks) {}",
                        doc.document_id,
                        doc.original_name,
                        doc.file_size,
                        doc.chunk_count,
                        doc.uploaded_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            DocsAction::Delete {
                tenant,
                document_id,
            } => {
                let doc = desk.ingestor().delete_document(&tenant, &document_id)?;
                println!("Deleted {}", doc.original_name);
            }
            DocsAction::Clear { tenant } => {
                let removed = desk.ingestor().delete_all(&tenant)?;
                println!("Deleted {} documents", removed);
            }
            DocsAction::Reindex { tenant } => {
                let chunks = desk.ingestor().reindex(&tenant)?;
                println!("Re-embedded {} chunks", chunks);
            }
        },

        Commands::Search {
            tenant,
            query,
            k,
            min_score,
        } => {
            let retriever = desk.retriever();
            let hits = retriever.retrieve(
                &tenant,
                &query,
                k.unwrap_or(retriever.config().k),
                min_score.unwrap_or(retriever.config().min_score),
            )?;
            for hit in hits {
                println!(
                    "[{}] (score: {:.3}) - {}",
                    hit.chunk.source,
                    hit.score,
                    truncate(&hit.chunk.content, 70)
                );
            }
        }

        Commands::Chat {
            tenant,
            message,
            session,
            agent,
            user,
        } => {
            let agent = agent.as_deref().map(parse_arg::<AgentKind>).transpose()?;
            let mut session = session;
            match message {
                Some(message) => {
                    chat_turn(&desk, &tenant, &mut session, &user, agent, message).await?;
                }
                None => {
                    println!("SupportDesk chat with '{}'. Type 'quit' to exit.\n", tenant);
                    let stdin = io::stdin();
                    let mut stdout = io::stdout();
                    loop {
                        print!("you> ");
                        stdout.flush()?;
                        let mut line = String::new();
                        if stdin.read_line(&mut line)? == 0 {
                            break;
                        }
                        let line = line.trim();
                        match line {
                            "" => continue,
                            "quit" | "exit" => break,
                            _ => {
                                if let Err(e) = chat_turn(
                                    &desk,
                                    &tenant,
                                    &mut session,
                                    &user,
                                    agent,
                                    line.to_string(),
                                )
                                .await
                                {
                                    println!("Error: {}", e);
                                }
                            }
                        }
                    }
                    println!("Goodbye!");
                }
            }
        }

        Commands::Ticket { action } => match action {
            TicketAction::List { tenant, status } => {
                let status = status.as_deref().map(parse_arg::<TicketStatus>).transpose()?;
                for ticket in desk.escalation().list_tickets(tenant.as_deref(), status)? {
                    println!(
                        "{} [{} / {}] {} - {}",
                        ticket.ticket_id,
                        ticket.status.as_str(),
                        ticket.priority.as_str(),
                        ticket.tenant_id,
                        truncate(&ticket.title, 60)
                    );
                }
            }
            TicketAction::Create {
                tenant,
                title,
                description,
                priority,
            } => {
                let ticket = desk.escalation().create_ticket(NewTicket {
                    tenant_id: tenant,
                    title,
                    description,
                    priority: parse_arg::<TicketPriority>(&priority)?,
                    ..NewTicket::default()
                })?;
                println!("Created ticket {}", ticket.ticket_id);
            }
            TicketAction::Update {
                id,
                status,
                assign,
                priority,
            } => {
                let update = TicketUpdate {
                    status: status.as_deref().map(parse_arg::<TicketStatus>).transpose()?,
                    assigned_to: assign,
                    priority: priority.as_deref().map(parse_arg::<TicketPriority>).transpose()?,
                };
                print_json(&desk.escalation().update_ticket(&id, update)?)?;
            }
        },

        Commands::Meeting { action } => match action {
            MeetingAction::Schedule {
                tenant,
                title,
                time,
                duration,
            } => {
                let scheduled = desk.escalation().schedule_meeting(NewMeeting {
                    tenant_id: tenant,
                    session_id: None,
                    user_id: None,
                    title,
                    description: String::new(),
                    scheduled_time: time,
                    duration_minutes: duration,
                    meeting_type: "general".to_string(),
                    calendar_provider: None,
                })?;
                println!(
                    "Scheduled {} at {} ({})",
                    scheduled.meeting.meeting_id,
                    scheduled.meeting.scheduled_time.to_rfc3339(),
                    scheduled.calendar_link
                );
            }
            MeetingAction::List { tenant } => {
                for meeting in desk.escalation().list_meetings(&tenant)? {
                    println!(
                        "{} {} [{}] {} min - {}",
                        meeting.meeting_id,
                        meeting.scheduled_time.format("%Y-%m-%d %H:%M"),
                        meeting.status.as_str(),
                        meeting.duration_minutes,
                        meeting.title
                    );
                }
            }
            MeetingAction::Cancel { id } => {
                desk.escalation().cancel_meeting(&id)?;
                println!("Cancelled {}", id);
            }
        },

        Commands::Tool { action } => match action {
            ToolAction::List { tenant } => {
                for tool in desk.tools().list(&tenant) {
                    println!(
                        "{}{} - {}{}",
                        tool.name,
                        if tool.builtin { " (builtin)" } else { "" },
                        truncate(&tool.description, 60),
                        if tool.enabled { "" } else { " [disabled]" }
                    );
                }
            }
            ToolAction::Register { tenant, spec } => {
                let raw = match spec.strip_prefix('@') {
                    Some(path) => std::fs::read_to_string(shellexpand::tilde(path).to_string())?,
                    None => spec,
                };
                let spec: HttpToolSpec = serde_json::from_str(&raw)?;
                let name = spec.name.clone();
                let replaced = desk.tools().register(&tenant, spec)?;
                println!(
                    "{} tool {}",
                    if replaced { "Replaced" } else { "Registered" },
                    name
                );
            }
            ToolAction::Unregister { tenant, name } => {
                if desk.tools().unregister(&tenant, &name)? {
                    println!("Removed {}", name);
                } else {
                    println!("No tool named {}", name);
                }
            }
            ToolAction::Samples { tenant } => {
                let names = desk.tools().setup_sample_tools(&tenant)?;
                println!("Registered: {}", names.join(", "));
            }
            ToolAction::Usage { tenant } => {
                print_json(&desk.tools().stats(tenant.as_deref()))?;
            }
        },

        Commands::Stats => {
            print_json(&desk.admin().system_stats()?)?;
        }
    }

    Ok(())
}

async fn chat_turn(
    desk: &Desk,
    tenant: &str,
    session: &mut Option<String>,
    user: &Option<String>,
    agent: Option<AgentKind>,
    message: String,
) -> Result<()> {
    let response = desk
        .chat()
        .send(ChatInput {
            tenant_id: tenant.to_string(),
            session_id: session.clone(),
            user_id: user.clone(),
            message,
            agent,
            api_key: None,
        })
        .await?;

    if response.session_created {
        println!("(session {})", response.session_id);
    }
    *session = Some(response.session_id.clone());

    match &response.reply {
        ChatReply::Bot { reply, .. } => {
            println!("bot [{}]> {}", reply.agent, reply.content);
            if let Some(form) = &reply.form {
                println!("(form written to {})", form.rendered.path.display());
            }
        }
        ChatReply::HumanHandling { agent_id } => {
            println!("(agent {} is handling this conversation)", agent_id);
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
