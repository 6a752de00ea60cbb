//! Core types for SupportDesk

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenants::PermissionSet;

/// Tenant created on first start, carries admin rights
pub const DEFAULT_TENANT_ID: &str = "default";

/// Maximum length of a tenant identifier
pub const MAX_TENANT_ID_LENGTH: usize = 64;

/// Tenant identifier validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantIdError {
    Empty,
    TooLong,
    InvalidChars,
}

impl std::fmt::Display for TenantIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantIdError::Empty => write!(f, "Tenant id cannot be empty"),
            TenantIdError::TooLong => {
                write!(f, "Tenant id exceeds {} characters", MAX_TENANT_ID_LENGTH)
            }
            TenantIdError::InvalidChars => write!(
                f,
                "Tenant id can only contain lowercase letters, numbers, hyphens, and underscores"
            ),
        }
    }
}

impl std::error::Error for TenantIdError {}

/// Normalize and validate a tenant identifier
///
/// Trims whitespace, lowercases, and accepts only `[a-z0-9_-]`, at most
/// [`MAX_TENANT_ID_LENGTH`] characters.
pub fn normalize_tenant_id(s: &str) -> Result<String, TenantIdError> {
    let normalized = s.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(TenantIdError::Empty);
    }

    if normalized.len() > MAX_TENANT_ID_LENGTH {
        return Err(TenantIdError::TooLong);
    }

    if !normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(TenantIdError::InvalidChars);
    }

    Ok(normalized)
}

/// Tenant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub name: String,
    pub permissions: PermissionSet,
    /// Minimum seconds between calls, keyed by tool name ("default" applies to the rest)
    pub rate_limits: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub max_documents: i64,
    pub max_api_calls_per_hour: i64,
    /// Whether an API key is required to open sessions
    #[serde(default)]
    pub has_api_key: bool,
}

impl TenantConfig {
    /// Rate limit for a tool, falling back to the tenant default
    pub fn rate_limit_for(&self, tool_name: &str) -> Option<f64> {
        self.rate_limits
            .get(tool_name)
            .or_else(|| self.rate_limits.get("default"))
            .copied()
    }
}

/// Rate limits assigned to new tenants
pub fn default_rate_limits() -> HashMap<String, f64> {
    HashMap::from([
        ("default".to_string(), 0.5),
        ("search_web".to_string(), 1.0),
        ("get_weather".to_string(), 0.5),
    ])
}

/// An uploaded and (possibly) indexed document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub document_id: String,
    pub tenant_id: String,
    /// Name on disk
    pub filename: String,
    /// Name as supplied by the uploader
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    /// Lowercase extension without the dot
    pub file_type: String,
    /// `sha256:<hex>` of the file bytes
    pub file_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub chunk_count: i64,
    pub indexed: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A chunk of document text stored in the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub content: String,
    /// Source filename for display
    pub source: String,
    pub file_type: String,
    pub file_hash: String,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    /// Cosine similarity to the query
    pub score: f32,
}

/// Chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub permissions: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Human agent currently handling the conversation
    pub taken_over_by: Option<String>,
    pub taken_over_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn is_taken_over(&self) -> bool {
        self.taken_over_by.is_some()
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    /// Human support agent
    Agent,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Agent => "agent",
            MessageRole::System => "system",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "agent" => Ok(MessageRole::Agent),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// Agent type recorded for messages written by a human operator
pub const HUMAN_AGENT_TYPE: &str = "human_agent";

/// Bot handler a message is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Greeting,
    DocQa,
    FormGen,
    ApiExec,
    Analytics,
    Escalate,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Greeting,
        AgentKind::DocQa,
        AgentKind::FormGen,
        AgentKind::ApiExec,
        AgentKind::Analytics,
        AgentKind::Escalate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Greeting => "greeting",
            AgentKind::DocQa => "doc_qa",
            AgentKind::FormGen => "form_gen",
            AgentKind::ApiExec => "api_exec",
            AgentKind::Analytics => "analytics",
            AgentKind::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("Unknown agent: {}", s))
    }
}

/// A persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub session_id: String,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    /// Handler that produced the message ("doc_qa", "human_agent", ...)
    pub agent_type: Option<String>,
    #[serde(default)]
    pub document_references: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a chat message
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: String,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub agent_type: Option<String>,
    pub document_references: Vec<String>,
}

/// A single line of conversation copied into a ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for TranscriptEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Escalation ticket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" | "in-progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

/// Escalation ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            _ => Err(format!("Unknown ticket priority: {}", s)),
        }
    }
}

/// Handoff from the bot to a human operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTicket {
    pub ticket_id: String,
    pub session_id: Option<String>,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assigned_to: Option<String>,
    pub chat_context: Vec<TranscriptEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for creating a ticket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub tenant_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub chat_context: Vec<TranscriptEntry>,
}

/// Meeting status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Cancelled => "cancelled",
            MeetingStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(MeetingStatus::Scheduled),
            "cancelled" | "canceled" => Ok(MeetingStatus::Cancelled),
            "completed" => Ok(MeetingStatus::Completed),
            _ => Err(format!("Unknown meeting status: {}", s)),
        }
    }
}

/// A meeting booked with a support agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_id: String,
    pub session_id: Option<String>,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub description: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub meeting_type: String,
    /// External calendar, when one was used to book
    pub calendar_provider: Option<String>,
    pub calendar_event_id: Option<String>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for booking a meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
    pub tenant_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// RFC 3339 timestamp
    pub scheduled_time: String,
    #[serde(default = "default_meeting_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_meeting_type")]
    pub meeting_type: String,
    #[serde(default)]
    pub calendar_provider: Option<String>,
}

fn default_meeting_duration() -> u32 {
    30
}

fn default_meeting_type() -> String {
    "general".to_string()
}

/// Where the chat widget is anchored on the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl WidgetPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetPosition::BottomRight => "bottom-right",
            WidgetPosition::BottomLeft => "bottom-left",
            WidgetPosition::TopRight => "top-right",
            WidgetPosition::TopLeft => "top-left",
        }
    }
}

impl std::str::FromStr for WidgetPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bottom-right" => Ok(WidgetPosition::BottomRight),
            "bottom-left" => Ok(WidgetPosition::BottomLeft),
            "top-right" => Ok(WidgetPosition::TopRight),
            "top-left" => Ok(WidgetPosition::TopLeft),
            _ => Err(format!("Unknown widget position: {}", s)),
        }
    }
}

/// Per-tenant look and feel of the chat widget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantCustomization {
    pub tenant_id: String,
    pub theme_color: String,
    pub chat_background_color: String,
    pub welcome_message: String,
    pub logo_url: Option<String>,
    pub widget_position: WidgetPosition,
    pub custom_css: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantCustomization {
    /// Default branding for a tenant
    pub fn defaults(tenant_id: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.to_string(),
            theme_color: "#667eea".to_string(),
            chat_background_color: "#ffffff".to_string(),
            welcome_message: "Hello! How can I help you today?".to_string(),
            logo_url: None,
            widget_position: WidgetPosition::BottomRight,
            custom_css: None,
            created_at: now,
            updated_at: now,
        }
    }
}
