//! Text extraction from uploaded files

use std::path::Path;

use pulldown_cmark::{Event, Parser, TagEnd};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{DeskError, Result};

/// Extensions accepted by [`super::DocumentIngestor::stage_upload`]
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "docx", "txt", "md", "csv", "json"];

/// Extensions never read during directory ingestion
pub const SKIPPED_EXTENSIONS: [&str; 4] = ["exe", "dll", "so", "dylib"];

/// How a file's bytes are turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Csv,
    Json,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Detect format from the extension; unknown extensions read as text
    pub fn from_path(path: &Path) -> Self {
        match file_extension(path).as_str() {
            "md" | "markdown" => DocumentFormat::Markdown,
            "csv" => DocumentFormat::Csv,
            "json" => DocumentFormat::Json,
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            _ => DocumentFormat::Text,
        }
    }
}

/// Lowercase extension without the dot, empty when absent
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

pub fn is_allowed_upload(path: &Path) -> bool {
    ALLOWED_EXTENSIONS.contains(&file_extension(path).as_str())
}

/// `sha256:<hex>` digest used for deduplication
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Details recorded while extracting a file
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExtractionMetadata {
    pub source: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub file_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub format: DocumentFormat,
    pub metadata: ExtractionMetadata,
}

/// Read a file and extract its text
pub fn extract_file(path: &Path) -> Result<ExtractedDocument> {
    let bytes = std::fs::read(path).map_err(|e| {
        DeskError::Ingest(format!("Failed to read {}: {}", path.display(), e))
    })?;
    extract_bytes(path, &bytes)
}

/// Extract text from bytes already in memory; `path` only picks the format
pub fn extract_bytes(path: &Path, bytes: &[u8]) -> Result<ExtractedDocument> {
    let format = DocumentFormat::from_path(path);
    let mut metadata = ExtractionMetadata {
        source: path.to_string_lossy().to_string(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_type: file_extension(path),
        file_size: bytes.len() as u64,
        file_hash: file_hash(bytes),
        ..ExtractionMetadata::default()
    };

    let text = match format {
        DocumentFormat::Text | DocumentFormat::Csv => String::from_utf8_lossy(bytes).into_owned(),
        DocumentFormat::Markdown => flatten_markdown(&String::from_utf8_lossy(bytes)),
        DocumentFormat::Json => {
            let value: serde_json::Value = serde_json::from_slice(bytes)
                .map_err(|e| DeskError::Ingest(format!("JSON read error: {}", e)))?;
            metadata.json_keys = Some(
                value
                    .as_object()
                    .map(|o| o.keys().cloned().collect())
                    .unwrap_or_default(),
            );
            serde_json::to_string_pretty(&value)?
        }
        DocumentFormat::Pdf => {
            let (text, pages) = extract_pdf(bytes)?;
            metadata.page_count = Some(pages);
            text
        }
        DocumentFormat::Docx => {
            let paragraphs = extract_docx(bytes)?;
            metadata.paragraph_count = Some(paragraphs.len());
            paragraphs.join("\n")
        }
    };

    Ok(ExtractedDocument {
        text,
        format,
        metadata,
    })
}

/// Markdown to plain text, one block per line group
fn flatten_markdown(content: &str) -> String {
    let mut out = String::new();

    for event in Parser::new(content) {
        match event {
            Event::Text(text) => out.push_str(&text),
            Event::Code(code) => {
                out.push('`');
                out.push_str(&code);
                out.push('`');
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::BlockQuote) => out.push_str("\n\n"),
            Event::End(TagEnd::Item) => out.push('\n'),
            _ => {}
        }
    }

    out.trim().to_string()
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> Result<(String, usize)> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DeskError::Ingest(format!("PDF read error: {}", e)))?;
    // pdf-extract separates pages with form feeds
    let pages = text.split('\x0C').filter(|p| !p.trim().is_empty()).count();
    Ok((text.replace('\x0C', "\n"), pages.max(1)))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> Result<(String, usize)> {
    Err(DeskError::Ingest(
        "PDF support requires the 'pdf' feature".to_string(),
    ))
}

#[cfg(feature = "docx")]
fn extract_docx(bytes: &[u8]) -> Result<Vec<String>> {
    use std::io::{Cursor, Read};

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DeskError::Ingest(format!("DOCX read error: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DeskError::Ingest(format!("DOCX read error: {}", e)))?
        .read_to_string(&mut xml)?;

    Ok(docx_paragraphs(&xml))
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_bytes: &[u8]) -> Result<Vec<String>> {
    Err(DeskError::Ingest(
        "DOCX support requires the 'docx' feature".to_string(),
    ))
}

/// Paragraph texts from WordprocessingML (`<w:p>` containing `<w:t>` runs)
#[cfg_attr(not(feature = "docx"), allow(dead_code))]
fn docx_paragraphs(xml: &str) -> Vec<String> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static RUN_TEXT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").unwrap());

    xml.split("</w:p>")
        .filter(|p| p.contains("<w:p"))
        .map(|p| {
            RUN_TEXT
                .captures_iter(p)
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .collect::<String>()
        })
        .collect()
}

#[cfg_attr(not(feature = "docx"), allow(dead_code))]
fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.MD")), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_path(Path::new("faq.pdf")), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_path(Path::new("notes.rst")), DocumentFormat::Text);
        assert!(is_allowed_upload(Path::new("x.docx")));
        assert!(!is_allowed_upload(Path::new("x.exe")));
        assert!(!is_allowed_upload(Path::new("README")));
    }

    #[test]
    fn test_markdown_flattened() {
        let md = "# Returns\n\nItems can be returned within **30 days**.\n\n- Keep the receipt\n- Use `RMA` form";
        let doc = extract_bytes(Path::new("policy.md"), md.as_bytes()).unwrap();
        assert!(doc.text.starts_with("Returns\n\nItems can be returned within 30 days."));
        assert!(doc.text.contains("`RMA`"));
        assert!(!doc.text.contains('#'));
    }

    #[test]
    fn test_json_pretty_printed_with_keys() {
        let doc = extract_bytes(Path::new("faq.json"), br#"{"hours":"9-5","phone":"555"}"#).unwrap();
        assert!(doc.text.contains("\"hours\": \"9-5\""));
        assert_eq!(
            doc.metadata.json_keys,
            Some(vec!["hours".to_string(), "phone".to_string()])
        );
        assert_eq!(doc.metadata.file_type, "json");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = extract_bytes(Path::new("bad.json"), b"{not json").unwrap_err();
        assert!(matches!(err, DeskError::Ingest(_)));
    }

    #[test]
    fn test_hash_shape() {
        let doc = extract_bytes(Path::new("a.txt"), b"hello").unwrap();
        assert_eq!(
            doc.metadata.file_hash,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(doc.metadata.file_size, 5);
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:body><w:p><w:r><w:t>Order &amp; Billing</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Pay </w:t></w:r><w:r><w:t>online</w:t></w:r></w:p></w:body>"#;
        assert_eq!(docx_paragraphs(xml), vec!["Order & Billing", "Pay online"]);
    }
}
