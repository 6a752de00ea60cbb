use super::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::Result;
use crate::llm::ChatRequest;
use crate::retrieval::build_context;
use crate::storage::document_queries;
use crate::tenants::Permission;
use crate::tools::truncate_chars;
use crate::types::{MessageRole, ScoredChunk};

/// Prior messages quoted in the prompt
const CONVERSATION_WINDOW: usize = 5;

/// Characters of each passage shown when the model is unavailable
const EXCERPT_CHARS: usize = 300;

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn excerpt_reply(hits: &[ScoredChunk]) -> String {
    if hits.is_empty() {
        return "I couldn't find anything relevant in your documents.".to_string();
    }
    let mut out = String::from("Here is what I found in your documents:\n");
    for hit in hits {
        let text = hit.chunk.content.replace('\n', " ");
        let excerpt = truncate_chars(text.trim(), EXCERPT_CHARS);
        let ellipsis = if excerpt.len() < text.trim().len() { "..." } else { "" };
        out.push_str(&format!("\n- [{}] {}{}", hit.chunk.source, excerpt, ellipsis));
    }
    out
}

impl Agents {
    pub(super) async fn doc_qa(&self, ctx: &AgentContext) -> Result<AgentReply> {
        if !ctx.allows(Permission::ReadDocuments) {
            return Ok(AgentReply::denied(AgentKind::DocQa, "document access"));
        }
        let tenant_id = ctx.tenant.tenant_id.as_str();

        let documents = self
            .deps
            .storage
            .with_connection(|conn| document_queries::list_documents(conn, tenant_id))?;
        if documents.is_empty() {
            return Ok(AgentReply::text(
                AgentKind::DocQa,
                format!(
                    "No documents indexed for tenant '{}'. Please upload documents first using the upload area.",
                    tenant_id
                ),
            ));
        }

        let config = self.deps.retriever.config();
        let hits = self
            .deps
            .retriever
            .retrieve(tenant_id, &ctx.message, config.qa_k, config.min_score)?;
        let context = build_context(&hits, &documents);

        let turns: Vec<_> = ctx
            .history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();
        let conversation: Vec<String> = turns
            .iter()
            .skip(turns.len().saturating_sub(CONVERSATION_WINDOW))
            .map(|m| format!("{}: {}", capitalize(m.role.as_str()), m.content))
            .collect();

        let mut prompt = vec![
            "You are a helpful document Q&A assistant. Answer questions based on the provided documents.".to_string(),
            "Use the conversation history to maintain context and provide coherent responses.".to_string(),
            "If the answer is not in the documents, say you don't have enough information.".to_string(),
            String::new(),
        ];
        if !conversation.is_empty() {
            prompt.push("Recent conversation:".to_string());
            prompt.extend(conversation);
            prompt.push(String::new());
        }
        prompt.extend([
            "Available documents:".to_string(),
            context.text.clone(),
            String::new(),
            format!("Current question: {}", ctx.message),
        ]);

        let request = ChatRequest::new(0.1)
            .system("Document QA mode with conversation context.")
            .user(prompt.join("\n"));
        let content = match self.deps.model.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Document answer fell back to excerpts: {}", e);
                excerpt_reply(&hits)
            }
        };

        Ok(AgentReply {
            references: context.document_ids,
            ..AgentReply::text(AgentKind::DocQa, content)
        })
    }
}
