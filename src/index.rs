//! Tenant-isolated vector index over the `chunks` table
//!
//! Every read and write is keyed by tenant; a search only ever scores the
//! requesting tenant's chunks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Result;
use crate::storage::{document_queries, Storage};
use crate::types::{ChunkRecord, ScoredChunk};

/// Sample sources reported by [`VectorIndex::stats`]
pub const MAX_SAMPLE_SOURCES: usize = 10;

/// A chunk paired with its embedding, ready to insert
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: ChunkRecord,
    pub vector: Vec<f32>,
}

/// Summary of what a tenant has indexed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub total_chunks: i64,
    pub unique_sources: usize,
    /// Chunks per file type
    pub file_types: BTreeMap<String, i64>,
    pub sample_sources: Vec<String>,
}

impl IndexStats {
    /// Human readable report used by the document stats tool
    pub fn report(&self, tenant_id: &str) -> String {
        let file_types = self
            .file_types
            .iter()
            .map(|(k, v)| format!("{}({})", k, v))
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = format!(
            "Document Statistics for tenant '{}':\n- Total chunks: {}\n- Unique sources: {}\n- File types: {}\n",
            tenant_id, self.total_chunks, self.unique_sources, file_types
        );
        if !self.sample_sources.is_empty() {
            let sample: Vec<&str> = self
                .sample_sources
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            out.push_str(&format!("- Sample sources: {}...", sample.join(", ")));
        }
        out
    }
}

/// Cosine-similarity index backed by SQLite BLOBs
#[derive(Clone)]
pub struct VectorIndex {
    storage: Storage,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    pub fn new(storage: Storage, embedder: Arc<dyn Embedder>) -> Self {
        Self { storage, embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed chunk contents in one batch
    pub fn embed_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect())
    }

    /// Insert embedded chunks using the caller's connection (and transaction)
    pub fn insert_chunks(&self, conn: &Connection, chunks: &[EmbeddedChunk]) -> Result<usize> {
        let model = self.embedder.model_name();
        for item in chunks {
            document_queries::insert_chunk(conn, &item.chunk, &item.vector, model)?;
        }
        Ok(chunks.len())
    }

    /// Top `k` chunks of `tenant_id` by cosine similarity, best first
    pub fn search(&self, tenant_id: &str, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let rows = self
            .storage
            .with_connection(|conn| document_queries::load_tenant_vectors(conn, tenant_id))?;

        let mut mismatched = 0usize;
        let mut scored: Vec<ScoredChunk> = rows
            .into_iter()
            .filter_map(|(chunk, vector)| {
                if vector.len() != query.len() {
                    mismatched += 1;
                    return None;
                }
                let score = cosine_similarity(query, &vector);
                Some(ScoredChunk { chunk, score })
            })
            .collect();

        if mismatched > 0 {
            tracing::warn!(
                "Skipped {} chunks of tenant {} with stale embedding dimensions; run reindex",
                mismatched,
                tenant_id
            );
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Embed `query` and search
    pub fn search_text(&self, tenant_id: &str, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed(query)?;
        self.search(tenant_id, &vector, k)
    }

    pub fn remove_document(&self, tenant_id: &str, document_id: &str) -> Result<usize> {
        self.storage.with_connection(|conn| {
            document_queries::delete_chunks_for_document(conn, tenant_id, document_id)
        })
    }

    pub fn clear_tenant(&self, tenant_id: &str) -> Result<usize> {
        self.storage
            .with_connection(|conn| document_queries::delete_chunks_for_tenant(conn, tenant_id))
    }

    pub fn chunk_count(&self, tenant_id: &str) -> Result<i64> {
        self.storage
            .with_connection(|conn| document_queries::count_chunks(conn, tenant_id))
    }

    /// Index summary, `None` when the tenant has nothing indexed
    pub fn stats(&self, tenant_id: &str) -> Result<Option<IndexStats>> {
        let sources = self
            .storage
            .with_connection(|conn| document_queries::chunk_sources(conn, tenant_id))?;
        if sources.is_empty() {
            return Ok(None);
        }

        let mut file_types: BTreeMap<String, i64> = BTreeMap::new();
        let mut unique = BTreeSet::new();
        let mut sample_sources = Vec::new();
        let mut total_chunks = 0;

        for (source, file_type, count) in sources {
            *file_types.entry(file_type).or_insert(0) += count;
            total_chunks += count;
            if unique.insert(source.clone()) && sample_sources.len() < MAX_SAMPLE_SOURCES {
                sample_sources.push(source);
            }
        }

        Ok(Some(IndexStats {
            total_chunks,
            unique_sources: unique.len(),
            file_types,
            sample_sources,
        }))
    }

    /// Re-embed every chunk of a tenant with the current embedder
    pub fn reembed_tenant(&self, tenant_id: &str) -> Result<usize> {
        let chunks = self
            .storage
            .with_connection(|conn| document_queries::list_chunks(conn, tenant_id))?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let embedded = self.embed_chunks(chunks)?;
        let model = self.embedder.model_name().to_string();
        self.storage.with_transaction(|conn| {
            for item in &embedded {
                document_queries::update_chunk_embedding(
                    conn,
                    &item.chunk.chunk_id,
                    &item.vector,
                    &model,
                )?;
            }
            Ok(())
        })?;

        tracing::info!(
            "Re-embedded {} chunks for tenant {} with {}",
            embedded.len(),
            tenant_id,
            model
        );
        Ok(embedded.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::storage::document_queries::insert_document;
    use crate::tenants::{NewTenant, TenantRegistry};
    use crate::types::DocumentRecord;
    use chrono::Utc;

    fn setup() -> (Storage, VectorIndex) {
        let storage = Storage::open_in_memory().unwrap();
        let tenants = TenantRegistry::new(storage.clone());
        tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();
        tenants.create_tenant(NewTenant::new("globex", "Globex")).unwrap();
        let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(128)));
        (storage, index)
    }

    fn add_doc(storage: &Storage, index: &VectorIndex, tenant: &str, name: &str, texts: &[&str]) {
        let doc_id = format!("{}-{}", tenant, name);
        let doc = DocumentRecord {
            document_id: doc_id.clone(),
            tenant_id: tenant.to_string(),
            filename: name.to_string(),
            original_name: name.to_string(),
            file_path: format!("/tmp/{}", name),
            file_size: 10,
            file_type: "md".to_string(),
            file_hash: format!("sha256:{}", doc_id),
            uploaded_at: Utc::now(),
            user_id: None,
            chunk_count: texts.len() as i64,
            indexed: true,
            tags: vec![],
        };
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| ChunkRecord {
                chunk_id: format!("{}:{}", doc_id, i),
                tenant_id: tenant.to_string(),
                document_id: doc_id.clone(),
                chunk_index: i as i64,
                chunk_count: texts.len() as i64,
                content: t.to_string(),
                source: name.to_string(),
                file_type: "md".to_string(),
                file_hash: doc.file_hash.clone(),
            })
            .collect();
        let embedded = index.embed_chunks(chunks).unwrap();
        storage
            .with_transaction(|conn| {
                insert_document(conn, &doc)?;
                index.insert_chunks(conn, &embedded)
            })
            .unwrap();
    }

    #[test]
    fn test_search_ranks_relevant_first() {
        let (storage, index) = setup();
        add_doc(
            &storage,
            &index,
            "acme",
            "faq.md",
            &[
                "Refunds are issued to the original payment method within 5 days",
                "Our office is open Monday to Friday",
            ],
        );

        let hits = index.search_text("acme", "how are refunds issued", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].chunk.content.starts_with("Refunds"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_is_tenant_isolated() {
        let (storage, index) = setup();
        add_doc(&storage, &index, "acme", "acme.md", &["acme secret pricing sheet"]);
        add_doc(&storage, &index, "globex", "globex.md", &["globex holiday schedule"]);

        let hits = index.search_text("globex", "acme secret pricing", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.chunk.tenant_id == "globex"));
    }

    #[test]
    fn test_stats_and_report() {
        let (storage, index) = setup();
        assert!(index.stats("acme").unwrap().is_none());

        add_doc(&storage, &index, "acme", "a.md", &["one", "two"]);
        add_doc(&storage, &index, "acme", "b.md", &["three"]);

        let stats = index.stats("acme").unwrap().unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.unique_sources, 2);
        assert_eq!(stats.file_types.get("md"), Some(&3));

        let report = stats.report("acme");
        assert!(report.starts_with("Document Statistics for tenant 'acme':\n- Total chunks: 3\n"));
        assert!(report.contains("- File types: md(3)\n"));
        assert!(report.ends_with("- Sample sources: a.md, b.md..."));
    }

    #[test]
    fn test_remove_and_clear() {
        let (storage, index) = setup();
        add_doc(&storage, &index, "acme", "a.md", &["one", "two"]);
        add_doc(&storage, &index, "acme", "b.md", &["three"]);

        assert_eq!(index.remove_document("acme", "acme-a.md").unwrap(), 2);
        assert_eq!(index.chunk_count("acme").unwrap(), 1);
        assert_eq!(index.clear_tenant("acme").unwrap(), 1);
        assert!(index.stats("acme").unwrap().is_none());
    }

    #[test]
    fn test_reembed_replaces_dimensions() {
        let (storage, index) = setup();
        add_doc(&storage, &index, "acme", "a.md", &["password reset steps"]);

        let wider = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(256)));
        assert!(wider.search_text("acme", "password", 4).unwrap().is_empty());
        assert_eq!(wider.reembed_tenant("acme").unwrap(), 1);
        assert_eq!(wider.search_text("acme", "password", 4).unwrap().len(), 1);
    }
}
