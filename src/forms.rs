//! Generated forms
//!
//! The form agent asks the model for a JSON description, parses it leniently
//! into a [`ProfessionalForm`] and hands it to a [`FormRenderer`].

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeskError, Result};
use crate::ids::hex_token;

/// Fields listed per section in a draft summary
const SUMMARY_FIELDS_PER_SECTION: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub placeholder: String,
    pub options: Vec<String>,
    pub validation: String,
    pub description: String,
    pub default_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSection {
    pub title: String,
    pub description: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfessionalForm {
    pub form_id: String,
    pub title: String,
    pub description: String,
    pub company_name: String,
    pub form_type: String,
    pub sections: Vec<FormSection>,
    pub footer_text: String,
    /// `YYYY-MM-DD`
    pub created_date: String,
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Lowercase, non-alphanumerics collapsed to single underscores
pub fn snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl FormField {
    fn from_json(value: &Value, position: usize) -> Self {
        let label = str_field(value, "label");
        let mut name = snake_case(&str_field(value, "name"));
        if name.is_empty() {
            name = snake_case(&label);
        }
        if name.is_empty() {
            name = format!("field_{}", position + 1);
        }

        let field_type = value
            .get("field_type")
            .or_else(|| value.get("type"))
            .and_then(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string());

        let options = value
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| match o {
                        Value::String(s) => Some(s.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            label: if label.is_empty() { title_case(&name) } else { label },
            name,
            field_type,
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            placeholder: str_field(value, "placeholder"),
            options,
            validation: str_field(value, "validation"),
            description: str_field(value, "description"),
            default_value: str_field(value, "default_value"),
        }
    }
}

fn parse_fields(list: Option<&Value>) -> Vec<FormField> {
    list.and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .enumerate()
                .filter(|(_, f)| f.is_object())
                .map(|(i, f)| FormField::from_json(f, i))
                .collect()
        })
        .unwrap_or_default()
}

impl ProfessionalForm {
    /// Lenient conversion from model output
    ///
    /// Accepts either a `sections` list or a flat `fields` list, which
    /// becomes a single "Form Fields" section.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(DeskError::InvalidInput(
                "Form structure must be a JSON object".to_string(),
            ));
        }

        let sections = if let Some(list) = value.get("sections").and_then(Value::as_array) {
            list.iter()
                .filter(|s| s.is_object())
                .map(|s| {
                    let title = str_field(s, "title");
                    FormSection {
                        title: if title.is_empty() { "Section".to_string() } else { title },
                        description: str_field(s, "description"),
                        fields: parse_fields(s.get("fields")),
                    }
                })
                .collect()
        } else if value.get("fields").map_or(false, Value::is_array) {
            vec![FormSection {
                title: "Form Fields".to_string(),
                description: String::new(),
                fields: parse_fields(value.get("fields")),
            }]
        } else {
            Vec::new()
        };

        let title = str_field(value, "title");
        let form_type = snake_case(&str_field(value, "form_type"));

        Ok(Self {
            form_id: hex_token(4),
            title: if title.is_empty() { "Untitled Form".to_string() } else { title },
            description: str_field(value, "description"),
            company_name: str_field(value, "company_name"),
            form_type: if form_type.is_empty() { "general".to_string() } else { form_type },
            sections,
            footer_text: str_field(value, "footer_text"),
            created_date: Utc::now().format("%Y-%m-%d").to_string(),
        })
    }

    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }

    /// File stem used by renderers: `<title>_<form_id>`
    pub fn file_stem(&self) -> String {
        let title = snake_case(&self.title);
        let title = if title.is_empty() { "form".to_string() } else { title };
        format!("{}_{}", title, self.form_id)
    }
}

/// Output format of a generated form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFormat {
    Pdf,
    Docx,
    Html,
}

impl FormFormat {
    /// Format asked for in a chat message
    ///
    /// An explicit `(format: docx)` marker wins over keywords; PDF otherwise.
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("(format: docx)") || lower.contains("(format: doc)") {
            return FormFormat::Docx;
        }
        if lower.contains("(format: pdf)") {
            return FormFormat::Pdf;
        }
        if ["docx", "doc", "word document", "microsoft word"]
            .iter()
            .any(|w| lower.contains(w))
        {
            return FormFormat::Docx;
        }
        FormFormat::Pdf
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormFormat::Pdf => "pdf",
            FormFormat::Docx => "docx",
            FormFormat::Html => "html",
        }
    }
}

/// A form written to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedForm {
    pub path: PathBuf,
    /// Format actually produced, which may differ from the one requested
    pub format: FormFormat,
}

pub trait FormRenderer: Send + Sync {
    fn render(&self, form: &ProfessionalForm, requested: FormFormat) -> Result<RenderedForm>;
}

/// Print-ready HTML; browsers save it as PDF
pub struct HtmlFormRenderer {
    output_dir: PathBuf,
}

impl HtmlFormRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn render_field(out: &mut String, field: &FormField) {
    let required = if field.required { " *" } else { "" };
    let _ = writeln!(
        out,
        "<div class=\"field\"><label for=\"{name}\">{label}{required}</label>",
        name = escape_html(&field.name),
        label = escape_html(&field.label),
    );
    if !field.description.is_empty() {
        let _ = writeln!(out, "<p class=\"help\">{}</p>", escape_html(&field.description));
    }

    let name = escape_html(&field.name);
    let placeholder = escape_html(&field.placeholder);
    match field.field_type.as_str() {
        "textarea" => {
            let _ = writeln!(
                out,
                "<textarea id=\"{name}\" name=\"{name}\" rows=\"4\" placeholder=\"{placeholder}\">{}</textarea>",
                escape_html(&field.default_value)
            );
        }
        "select" => {
            let _ = writeln!(out, "<select id=\"{name}\" name=\"{name}\">");
            for option in &field.options {
                let option = escape_html(option);
                let _ = writeln!(out, "<option value=\"{option}\">{option}</option>");
            }
            out.push_str("</select>\n");
        }
        kind @ ("radio" | "checkbox") if !field.options.is_empty() => {
            for option in &field.options {
                let option = escape_html(option);
                let _ = writeln!(
                    out,
                    "<label class=\"choice\"><input type=\"{kind}\" name=\"{name}\" value=\"{option}\"> {option}</label>"
                );
            }
        }
        kind => {
            let kind = match kind {
                "email" | "number" | "date" | "tel" | "checkbox" | "radio" => kind,
                _ => "text",
            };
            let _ = writeln!(
                out,
                "<input type=\"{kind}\" id=\"{name}\" name=\"{name}\" placeholder=\"{placeholder}\" value=\"{}\">",
                escape_html(&field.default_value)
            );
        }
    }
    out.push_str("</div>\n");
}

/// HTML document for a form
pub fn form_html(form: &ProfessionalForm) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>",
        escape_html(&form.title)
    );
    out.push_str(
        "<style>body{font-family:sans-serif;max-width:760px;margin:40px auto;color:#222}\
h1,h2{color:#1f3a93}.field{margin:0 0 16px 20px}.help{color:#777;font-size:.85em;margin:2px 0}\
input,select,textarea{display:block;width:100%;padding:6px}.choice{display:block}\
.meta,.footer{color:#777;font-size:.85em}@media print{input,select,textarea{border:none;border-bottom:1px solid #000}}</style>\n",
    );
    out.push_str("</head>\n<body>\n");

    if !form.company_name.is_empty() {
        let _ = writeln!(out, "<p class=\"company\">{}</p>", escape_html(&form.company_name));
    }
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&form.title));
    if !form.description.is_empty() {
        let _ = writeln!(out, "<p>{}</p>", escape_html(&form.description));
    }
    let _ = writeln!(
        out,
        "<p class=\"meta\">Form ID: {} | Date: {}</p>\n<form>",
        escape_html(&form.form_id),
        escape_html(&form.created_date)
    );

    for section in &form.sections {
        let _ = writeln!(out, "<h2>{}</h2>", escape_html(&section.title));
        if !section.description.is_empty() {
            let _ = writeln!(out, "<p>{}</p>", escape_html(&section.description));
        }
        for field in &section.fields {
            render_field(&mut out, field);
        }
    }

    out.push_str("</form>\n");
    if !form.footer_text.is_empty() {
        let _ = writeln!(out, "<p class=\"footer\">{}</p>", escape_html(&form.footer_text));
    }
    out.push_str("<p class=\"meta\">* Required fields</p>\n</body>\n</html>\n");
    out
}

impl FormRenderer for HtmlFormRenderer {
    fn render(&self, form: &ProfessionalForm, requested: FormFormat) -> Result<RenderedForm> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.html", form.file_stem()));
        fs::write(&path, form_html(form))?;

        if requested != FormFormat::Html {
            tracing::debug!(
                "Rendered {} form as HTML for {}",
                requested.as_str(),
                form.form_id
            );
        }
        tracing::info!("Generated form {} at {}", form.form_id, path.display());
        Ok(RenderedForm {
            path,
            format: FormFormat::Html,
        })
    }
}

/// A generated form together with where it was written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormDraft {
    pub form: ProfessionalForm,
    pub rendered: RenderedForm,
}

impl FormDraft {
    /// Chat reply describing the form
    pub fn summary(&self) -> String {
        let form = &self.form;
        let kind = title_case(&form.form_type);
        let path = self.rendered.path.display();

        let mut out = format!(
            "**{} Form Generated**\n\n**Form Details:**\n\
• Title: {}\n• Type: {}\n• Sections: {}\n• Total Fields: {}\n• Format: {}\n• File: {}\n• Form ID: {}\n\n\
**Form Structure:**\n",
            kind,
            form.title,
            kind,
            form.sections.len(),
            form.field_count(),
            self.rendered.format.as_str().to_uppercase(),
            path,
            form.form_id,
        );

        for (i, section) in form.sections.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. **{}** ({} fields)",
                i + 1,
                section.title,
                section.fields.len()
            );
            for field in section.fields.iter().take(SUMMARY_FIELDS_PER_SECTION) {
                let mark = if field.required { " *" } else { "" };
                let _ = writeln!(out, "   • {}{} ({})", field.label, mark, field.field_type);
            }
            if section.fields.len() > SUMMARY_FIELDS_PER_SECTION {
                let _ = writeln!(
                    out,
                    "   • ... and {} more fields",
                    section.fields.len() - SUMMARY_FIELDS_PER_SECTION
                );
            }
        }

        let _ = write!(out, "\n**File Location:** `{}`", path);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_defaults_and_legacy_fields() {
        let form = ProfessionalForm::from_json(&json!({
            "fields": [
                {"name": "Full Name", "label": "Full name", "type": "text", "required": true},
                {"label": "Email Address", "field_type": "email"},
                {}
            ]
        }))
        .unwrap();

        assert_eq!(form.title, "Untitled Form");
        assert_eq!(form.form_type, "general");
        assert_eq!(form.form_id.len(), 8);
        assert_eq!(form.sections.len(), 1);
        assert_eq!(form.sections[0].title, "Form Fields");

        let fields = &form.sections[0].fields;
        assert_eq!(fields[0].name, "full_name");
        assert!(fields[0].required);
        assert_eq!(fields[1].name, "email_address");
        assert_eq!(fields[1].field_type, "email");
        assert_eq!(fields[2].name, "field_3");
        assert_eq!(fields[2].field_type, "text");
        assert_eq!(fields[2].label, "Field 3");
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(ProfessionalForm::from_json(&json!(["a"])).is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FormFormat::detect("contact form (format: docx)"), FormFormat::Docx);
        assert_eq!(FormFormat::detect("a Word document please (format: pdf)"), FormFormat::Pdf);
        assert_eq!(FormFormat::detect("as a word document"), FormFormat::Docx);
        assert_eq!(FormFormat::detect("signup form"), FormFormat::Pdf);
    }

    #[test]
    fn test_html_renderer_escapes_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = HtmlFormRenderer::new(dir.path().join("forms"));
        let form = ProfessionalForm::from_json(&json!({
            "title": "Feedback <Form>",
            "sections": [{"title": "Rating", "fields": [
                {"name": "score", "label": "Score", "field_type": "radio", "options": ["1", "2"]}
            ]}]
        }))
        .unwrap();

        let rendered = renderer.render(&form, FormFormat::Pdf).unwrap();
        assert_eq!(rendered.format, FormFormat::Html);
        let html = std::fs::read_to_string(&rendered.path).unwrap();
        assert!(html.contains("<h1>Feedback &lt;Form&gt;</h1>"));
        assert!(html.contains("type=\"radio\" name=\"score\" value=\"2\""));
        assert!(rendered
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("feedback_form_"));
    }

    #[test]
    fn test_summary_limits_fields_per_section() {
        let fields: Vec<Value> = (0..5)
            .map(|i| json!({"name": format!("q{}", i), "label": format!("Question {}", i)}))
            .collect();
        let form = ProfessionalForm::from_json(&json!({
            "title": "Survey",
            "form_type": "survey",
            "sections": [{"title": "Questions", "fields": fields}]
        }))
        .unwrap();
        let draft = FormDraft {
            form,
            rendered: RenderedForm {
                path: PathBuf::from("/tmp/survey.html"),
                format: FormFormat::Html,
            },
        };

        let summary = draft.summary();
        assert!(summary.starts_with("**Survey Form Generated**"));
        assert!(summary.contains("1. **Questions** (5 fields)"));
        assert!(summary.contains("Question 2 (text)"));
        assert!(!summary.contains("Question 3 (text)"));
        assert!(summary.contains("... and 2 more fields"));
        assert!(summary.contains("• Format: HTML"));
    }
}
