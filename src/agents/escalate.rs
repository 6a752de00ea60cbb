use super::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::Result;
use crate::escalation::priority_from_text;
use crate::tools::truncate_chars;
use crate::types::{NewTicket, TranscriptEntry};

/// Messages copied into the ticket, the current one included
const CONTEXT_MESSAGES: usize = 5;

const TITLE_CHARS: usize = 80;

impl Agents {
    pub(super) async fn escalate(&self, ctx: &AgentContext) -> Result<AgentReply> {
        let mut chat_context: Vec<TranscriptEntry> =
            ctx.history.iter().map(TranscriptEntry::from).collect();
        chat_context.push(TranscriptEntry {
            role: "user".to_string(),
            content: ctx.message.clone(),
        });
        let skip = chat_context.len().saturating_sub(CONTEXT_MESSAGES);
        let chat_context = chat_context.split_off(skip);

        let summary = ctx.message.split_whitespace().collect::<Vec<_>>().join(" ");
        let title = if summary.is_empty() {
            "Escalation request".to_string()
        } else {
            format!("Escalation: {}", truncate_chars(&summary, TITLE_CHARS))
        };

        let ticket = self.deps.escalation.create_ticket(NewTicket {
            tenant_id: ctx.tenant.tenant_id.clone(),
            session_id: Some(ctx.session.session_id.clone()),
            user_id: ctx.session.user_id.clone(),
            title,
            description: ctx.message.clone(),
            priority: priority_from_text(&ctx.message),
            chat_context,
        });

        let ticket = match ticket {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!("Escalation failed for session {}: {}", ctx.session.session_id, e);
                return Ok(AgentReply::text(
                    AgentKind::Escalate,
                    "I apologize, but I'm having trouble escalating your request. Please try again or contact support directly.",
                ));
            }
        };

        let content = format!(
            "I've escalated your request to a human agent.\n\n\
Ticket ID: {}\n\
Your request has been logged and a human agent will assist you shortly.\n\
Please keep this ticket ID for reference.\n\n\
In the meantime, you can continue using the chatbot for other queries.",
            ticket.ticket_id
        );
        Ok(AgentReply {
            ticket_id: Some(ticket.ticket_id),
            ..AgentReply::text(AgentKind::Escalate, content)
        })
    }
}
