use chrono::Utc;
use serde_json::Value;

use super::{AgentContext, AgentKind, AgentReply, Agents};
use crate::error::Result;
use crate::forms::{FormDraft, FormFormat, ProfessionalForm};
use crate::llm::{extract_json_object, ChatRequest};
use crate::tenants::Permission;

const FORM_PROMPT: &str = r#"Create a structured form for the user's request.
Reply with a single JSON object of this shape:

{
  "title": "Form title",
  "description": "Purpose of the form and instructions",
  "company_name": "Organisation name, if any",
  "form_type": "contract|survey|registration|feedback|application|contact|other",
  "sections": [
    {
      "title": "Section title",
      "description": "Section description",
      "fields": [
        {
          "name": "field_name",
          "label": "Field label",
          "field_type": "text|email|number|date|select|textarea|checkbox|radio|tel",
          "required": true,
          "placeholder": "Placeholder text",
          "description": "Help text",
          "options": ["only for select, radio and checkbox"]
        }
      ]
    }
  ],
  "footer_text": "Footer, terms or additional information"
}

Group related fields into sections and pick field types that match the data."#;

impl Agents {
    pub(super) async fn form_gen(&self, ctx: &AgentContext) -> Result<AgentReply> {
        if !ctx.allows(Permission::GenerateForms) {
            return Ok(AgentReply::denied(AgentKind::FormGen, "form generation"));
        }

        let format = FormFormat::detect(&ctx.message);
        tracing::debug!("Form requested as {}", format.as_str());

        let request = ChatRequest::new(0.0)
            .system("You are a form generation specialist. Create comprehensive, structured forms.")
            .user(format!("{}\n\nUser request: {}", FORM_PROMPT, ctx.message));
        let answer = match self.deps.model.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Form generation failed: {}", e);
                return Ok(AgentReply::text(
                    AgentKind::FormGen,
                    format!("Error generating form: {}", e),
                ));
            }
        };

        let Some(mut data) = extract_json_object(&answer) else {
            return Ok(AgentReply::text(
                AgentKind::FormGen,
                "Unable to generate form structure. Please provide more specific requirements.",
            ));
        };
        let form = match ProfessionalForm::from_json(&data) {
            Ok(form) => form,
            Err(e) => {
                return Ok(AgentReply::text(
                    AgentKind::FormGen,
                    format!("Error parsing form structure: {}", e),
                ))
            }
        };

        match self.deps.renderer.render(&form, format) {
            Ok(rendered) => {
                let draft = FormDraft { form, rendered };
                Ok(AgentReply {
                    content: draft.summary(),
                    form: Some(draft),
                    ..AgentReply::text(AgentKind::FormGen, String::new())
                })
            }
            Err(e) => {
                tracing::error!("Form file creation failed: {}", e);
                if let Value::Object(map) = &mut data {
                    map.insert("generated_at".into(), Value::String(Utc::now().to_rfc3339()));
                    map.insert("tenant_id".into(), Value::String(ctx.tenant.tenant_id.clone()));
                    map.insert("form_id".into(), Value::String(form.form_id.clone()));
                }
                let pretty = serde_json::to_string_pretty(&data)?;
                Ok(AgentReply::text(
                    AgentKind::FormGen,
                    format!(
                        "Form structure generated, but file creation failed.\nError: {}\n\n**Form JSON Structure:**\n```json\n{}\n```",
                        e, pretty
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::fixture;
    use super::*;
    use crate::error::DeskError;
    use crate::forms::{FormRenderer, RenderedForm};
    use crate::llm::ScriptedModel;

    const CONTACT_FORM: &str = r#"```json
{"title": "Contact Us", "form_type": "contact",
 "sections": [{"title": "Details", "fields": [
   {"name": "email", "label": "Email", "field_type": "email", "required": true}
 ]}]}
```"#;

    struct FailingRenderer;

    impl FormRenderer for FailingRenderer {
        fn render(&self, _form: &ProfessionalForm, _requested: FormFormat) -> Result<RenderedForm> {
            Err(DeskError::Internal("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_form_is_rendered_and_summarised() {
        let fx = fixture(Arc::new(ScriptedModel::new([CONTACT_FORM])));
        let reply = fx
            .agents
            .run(AgentKind::FormGen, &fx.context("contact form (format: docx)"))
            .await
            .unwrap();

        let draft = reply.form.expect("form draft");
        assert_eq!(draft.form.title, "Contact Us");
        assert!(draft.rendered.path.exists());
        assert!(reply.content.contains("• Email * (email)"));
    }

    #[tokio::test]
    async fn test_render_failure_returns_json() {
        let mut fx = fixture(Arc::new(ScriptedModel::new([CONTACT_FORM])));
        fx.agents.deps.renderer = Arc::new(FailingRenderer);

        let reply = fx
            .agents
            .run(AgentKind::FormGen, &fx.context("contact form"))
            .await
            .unwrap();
        assert!(reply.form.is_none());
        assert!(reply.content.contains("file creation failed"));
        assert!(reply.content.contains("\"tenant_id\": \"acme\""));
    }

    #[tokio::test]
    async fn test_unparseable_answer() {
        let fx = fixture(Arc::new(ScriptedModel::new(["Sure, what fields do you want?"])));
        let reply = fx
            .agents
            .run(AgentKind::FormGen, &fx.context("make a form"))
            .await
            .unwrap();
        assert_eq!(
            reply.content,
            "Unable to generate form structure. Please provide more specific requirements."
        );
    }
}
