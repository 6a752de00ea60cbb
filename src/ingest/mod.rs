//! Document ingestion
//!
//! Files are hashed, extracted, split, embedded and written to the
//! tenant's index in one transaction. A file whose bytes were already
//! ingested for the tenant is reported as a duplicate and left alone.
//!
//! ```ignore
//! let outcome = ingestor.ingest_file("acme", Path::new("docs/faq.md"), None)?;
//! println!("{} chunks", outcome.chunks);
//! ```

mod chunker;
mod extract;

pub use chunker::{split_text, TextSplitter, DEFAULT_SEPARATORS};
pub use extract::{
    extract_bytes, extract_file, file_extension, file_hash, is_allowed_upload, DocumentFormat,
    ExtractedDocument, ExtractionMetadata, ALLOWED_EXTENSIONS, SKIPPED_EXTENSIONS,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::error::{DeskError, Result};
use crate::ids::url_safe_token;
use crate::index::VectorIndex;
use crate::realtime::{RealtimeEvent, RealtimeManager};
use crate::storage::{document_queries, Storage};
use crate::tenants::TenantRegistry;
use crate::types::{ChunkRecord, DocumentRecord};

/// Result of ingesting one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub filename: String,
    pub document_id: Option<String>,
    pub chunks: usize,
    pub duplicate: bool,
    pub duration_ms: u64,
}

impl IngestOutcome {
    fn failed(path: &Path, error: &DeskError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            file_path: path.to_string_lossy().to_string(),
            filename: display_name(path),
            document_id: None,
            chunks: 0,
            duplicate: false,
            duration_ms: 0,
        }
    }
}

/// Result of a multi-file ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub results: Vec<IngestOutcome>,
}

impl BatchSummary {
    pub fn summary_line(&self) -> String {
        format!(
            "Processed {} files: {} successful, {} failed, {} duplicates",
            self.total_files, self.successful, self.failed, self.duplicates
        )
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Ingests files into a tenant's vector index
#[derive(Clone)]
pub struct DocumentIngestor {
    storage: Storage,
    tenants: TenantRegistry,
    index: VectorIndex,
    splitter: TextSplitter,
    config: IngestConfig,
    uploads_dir: PathBuf,
    events: RealtimeManager,
}

impl DocumentIngestor {
    pub fn new(
        storage: Storage,
        tenants: TenantRegistry,
        index: VectorIndex,
        config: IngestConfig,
        uploads_dir: PathBuf,
        events: RealtimeManager,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            storage,
            tenants,
            index,
            splitter,
            config,
            uploads_dir,
            events,
        })
    }

    /// Ingest a file in place
    pub fn ingest_file(
        &self,
        tenant_id: &str,
        path: &Path,
        user_id: Option<&str>,
    ) -> Result<IngestOutcome> {
        self.ingest_named(tenant_id, path, &display_name(path), user_id)
    }

    /// Stage an upload into the uploads directory and ingest it
    pub fn ingest_upload(
        &self,
        tenant_id: &str,
        source: &Path,
        original_name: &str,
        user_id: Option<&str>,
    ) -> Result<IngestOutcome> {
        let staged = self.stage_upload(tenant_id, source, original_name)?;
        let outcome = self.ingest_named(tenant_id, &staged, original_name, user_id);
        // keep staged copies only for newly indexed documents
        let keep = matches!(&outcome, Ok(o) if o.success && !o.duplicate);
        if !keep {
            if let Err(e) = fs::remove_file(&staged) {
                tracing::warn!("Failed to remove staged upload {}: {}", staged.display(), e);
            }
        }
        outcome
    }

    fn ingest_named(
        &self,
        tenant_id: &str,
        path: &Path,
        original_name: &str,
        user_id: Option<&str>,
    ) -> Result<IngestOutcome> {
        let start = Instant::now();
        let tenant = self.tenants.get_active(tenant_id)?;

        if !path.is_file() {
            return Err(DeskError::InvalidInput(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let size = fs::metadata(path)?.len();
        if size > self.config.max_file_size {
            return Err(DeskError::InvalidInput(format!(
                "File too large: {} bytes (max: {} bytes)",
                size, self.config.max_file_size
            )));
        }

        let bytes = fs::read(path)?;
        let hash = file_hash(&bytes);
        let filename = display_name(path);
        let file_path = path.to_string_lossy().to_string();

        let existing = self
            .storage
            .with_connection(|conn| document_queries::find_by_hash(conn, &tenant.tenant_id, &hash))?;
        if let Some(doc) = existing {
            tracing::info!("Skipping duplicate {} for tenant {}", filename, tenant.tenant_id);
            return Ok(IngestOutcome {
                success: true,
                message: format!("Document already exists: {}", doc.filename),
                file_path,
                filename,
                document_id: Some(doc.document_id),
                chunks: doc.chunk_count as usize,
                duplicate: true,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let count = self.storage.with_connection(|conn| {
            document_queries::count_documents(conn, Some(&tenant.tenant_id))
        })?;
        if count >= tenant.max_documents {
            return Err(DeskError::InvalidInput(format!(
                "Document limit reached for tenant {} (max {})",
                tenant.tenant_id, tenant.max_documents
            )));
        }

        let extracted = extract_bytes(path, &bytes)?;
        if extracted.text.trim().is_empty() {
            return Err(DeskError::Ingest(
                "No text content found in document".to_string(),
            ));
        }

        let pieces = self.splitter.split(&extracted.text);
        let document_id = url_safe_token(16);
        let chunk_count = pieces.len() as i64;
        let file_type = extracted.metadata.file_type.clone();

        let chunks: Vec<ChunkRecord> = pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| ChunkRecord {
                chunk_id: format!("{}:{}", document_id, i),
                tenant_id: tenant.tenant_id.clone(),
                document_id: document_id.clone(),
                chunk_index: i as i64,
                chunk_count,
                content,
                source: original_name.to_string(),
                file_type: file_type.clone(),
                file_hash: hash.clone(),
            })
            .collect();
        let embedded = self.index.embed_chunks(chunks)?;

        let doc = DocumentRecord {
            document_id: document_id.clone(),
            tenant_id: tenant.tenant_id.clone(),
            filename: filename.clone(),
            original_name: original_name.to_string(),
            file_path: file_path.clone(),
            file_size: size as i64,
            file_type,
            file_hash: hash.clone(),
            uploaded_at: Utc::now(),
            user_id: user_id.map(str::to_string),
            chunk_count,
            indexed: true,
            tags: vec![],
        };

        let inserted = self.storage.with_transaction(|conn| {
            // a concurrent ingest of the same bytes may have won the race
            if let Some(existing) = document_queries::find_by_hash(conn, &doc.tenant_id, &hash)? {
                return Ok(Err(existing));
            }
            document_queries::insert_document(conn, &doc)?;
            self.index.insert_chunks(conn, &embedded)?;
            Ok(Ok(()))
        })?;

        if let Err(existing) = inserted {
            return Ok(IngestOutcome {
                success: true,
                message: format!("Document already exists: {}", existing.filename),
                file_path,
                filename,
                document_id: Some(existing.document_id),
                chunks: existing.chunk_count as usize,
                duplicate: true,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        tracing::info!(
            "Ingested {} for tenant {}: {} chunks",
            original_name,
            doc.tenant_id,
            chunk_count
        );
        self.events.broadcast(RealtimeEvent::document_ingested(
            &doc.tenant_id,
            &document_id,
            original_name,
            embedded.len(),
        ));

        Ok(IngestOutcome {
            success: true,
            message: format!("Document processed successfully: {}", original_name),
            file_path,
            filename,
            document_id: Some(document_id),
            chunks: embedded.len(),
            duplicate: false,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Ingest several files; a failing file is recorded and the batch continues
    pub fn ingest_many(
        &self,
        tenant_id: &str,
        paths: &[PathBuf],
        user_id: Option<&str>,
    ) -> BatchSummary {
        let mut summary = BatchSummary {
            total_files: paths.len(),
            ..BatchSummary::default()
        };

        for path in paths {
            let outcome = match self.ingest_file(tenant_id, path, user_id) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", path.display(), e);
                    IngestOutcome::failed(path, &e)
                }
            };

            match (outcome.success, outcome.duplicate) {
                (true, true) => summary.duplicates += 1,
                (true, false) => summary.successful += 1,
                (false, _) => summary.failed += 1,
            }
            summary.results.push(outcome);
        }

        summary
    }

    /// Recursively ingest a directory, skipping hidden files and binaries
    pub fn ingest_dir(&self, tenant_id: &str, dir: &Path) -> Result<String> {
        let mut paths = Vec::new();
        collect_files(dir, &mut paths)?;
        paths.sort();

        if paths.is_empty() {
            return Ok("No documents found to ingest.".to_string());
        }
        Ok(self.ingest_many(tenant_id, &paths, None).summary_line())
    }

    /// Copy an upload to `uploads/<tenant>/<timestamp>_<name>`
    pub fn stage_upload(&self, tenant_id: &str, source: &Path, original_name: &str) -> Result<PathBuf> {
        let name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(DeskError::InvalidInput("Upload has no file name".to_string()));
        }
        if !is_allowed_upload(Path::new(&name)) {
            return Err(DeskError::InvalidInput(format!(
                "File type not allowed: {} (allowed: {})",
                name,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let dir = self.uploads_dir.join(tenant_id);
        fs::create_dir_all(&dir)?;
        let target = dir.join(format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S%3f"), name));
        fs::copy(source, &target)?;
        Ok(target)
    }

    /// Documents of a tenant, newest first
    pub fn list_documents(&self, tenant_id: &str) -> Result<Vec<DocumentRecord>> {
        self.storage
            .with_connection(|conn| document_queries::list_documents(conn, tenant_id))
    }

    pub fn get_document(&self, tenant_id: &str, document_id: &str) -> Result<DocumentRecord> {
        self.storage
            .with_connection(|conn| document_queries::get_document(conn, tenant_id, document_id))?
            .ok_or_else(|| DeskError::not_found("Document", document_id))
    }

    /// Delete a document, its chunks and its staged file
    pub fn delete_document(&self, tenant_id: &str, document_id: &str) -> Result<DocumentRecord> {
        let doc = self.get_document(tenant_id, document_id)?;
        self.storage.with_transaction(|conn| {
            document_queries::delete_chunks_for_document(conn, tenant_id, document_id)?;
            document_queries::delete_document(conn, tenant_id, document_id)?;
            Ok(())
        })?;
        self.remove_staged_file(&doc);
        tracing::info!("Deleted document {} of tenant {}", document_id, tenant_id);
        Ok(doc)
    }

    /// Delete every document of a tenant, returning how many were removed
    pub fn delete_all(&self, tenant_id: &str) -> Result<usize> {
        let docs = self.list_documents(tenant_id)?;
        let removed = self.storage.with_transaction(|conn| {
            document_queries::delete_chunks_for_tenant(conn, tenant_id)?;
            document_queries::delete_all_documents(conn, tenant_id)
        })?;
        for doc in &docs {
            self.remove_staged_file(doc);
        }
        tracing::info!("Deleted {} documents of tenant {}", removed, tenant_id);
        Ok(removed)
    }

    /// Re-embed all chunks of a tenant
    pub fn reindex(&self, tenant_id: &str) -> Result<usize> {
        self.tenants.get(tenant_id)?;
        self.index.reembed_tenant(tenant_id)
    }

    /// Only files we staged are removed; in-place ingests belong to the caller
    fn remove_staged_file(&self, doc: &DocumentRecord) {
        let path = Path::new(&doc.file_path);
        if !path.starts_with(&self.uploads_dir) {
            return;
        }
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type()?;

        // symlinks are not followed; a link back up the tree would never end
        if file_type.is_symlink() {
            tracing::debug!("Skipping symlink {}", path.display());
            continue;
        }
        if file_type.is_dir() {
            collect_files(&path, out)?;
            continue;
        }
        if name.starts_with('.') {
            continue;
        }
        if SKIPPED_EXTENSIONS.contains(&file_extension(&path).as_str()) {
            continue;
        }
        out.push(path);
    }
    Ok(())
}
