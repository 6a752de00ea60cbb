//! Similarity retrieval with a relevance floor
//!
//! The index is asked for twice as many candidates as needed; those above
//! `min_score` are kept. When nothing clears the floor the best `k` are
//! returned anyway so the answering agent always has some context.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::types::{DocumentRecord, ScoredChunk};

#[derive(Clone)]
pub struct Retriever {
    index: VectorIndex,
    config: RetrievalConfig,
}

/// Prompt-ready context assembled from retrieved chunks
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RetrievedContext {
    pub text: String,
    /// Documents that contributed, in first-hit order
    pub document_ids: Vec<String>,
}

impl Retriever {
    pub fn new(index: VectorIndex, config: RetrievalConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn retrieve(
        &self,
        tenant_id: &str,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let candidates = self.index.search_text(tenant_id, query, k.saturating_mul(2))?;
        Ok(apply_floor(candidates, k, min_score))
    }

    /// Retrieve with the configured `k` and `min_score`
    pub fn retrieve_default(&self, tenant_id: &str, query: &str) -> Result<Vec<ScoredChunk>> {
        self.retrieve(tenant_id, query, self.config.k, self.config.min_score)
    }
}

/// Keep candidates scoring at least `min_score`, falling back to the top `k`
pub fn apply_floor(candidates: Vec<ScoredChunk>, k: usize, min_score: f32) -> Vec<ScoredChunk> {
    let passing: Vec<ScoredChunk> = candidates
        .iter()
        .filter(|c| c.score >= min_score)
        .take(k)
        .cloned()
        .collect();

    if passing.is_empty() {
        candidates.into_iter().take(k).collect()
    } else {
        passing
    }
}

/// Group hits by document under `[Document: name]` headers
///
/// `documents` supplies display names; hits whose document is unknown fall
/// back to the chunk's source name.
pub fn build_context(hits: &[ScoredChunk], documents: &[DocumentRecord]) -> RetrievedContext {
    let names: HashMap<&str, &str> = documents
        .iter()
        .map(|d| (d.document_id.as_str(), d.original_name.as_str()))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&str>> = HashMap::new();
    for hit in hits {
        let doc_id = hit.chunk.document_id.as_str();
        if !grouped.contains_key(doc_id) {
            order.push(doc_id);
        }
        grouped.entry(doc_id).or_default().push(hit.chunk.content.as_str());
    }

    let mut sections = Vec::with_capacity(order.len());
    for doc_id in &order {
        let name = names.get(doc_id).copied().unwrap_or_else(|| {
            hits.iter()
                .find(|h| h.chunk.document_id == *doc_id)
                .map(|h| h.chunk.source.as_str())
                .unwrap_or("unknown")
        });
        let body = grouped
            .get(doc_id)
            .map(|parts| parts.join("\n\n"))
            .unwrap_or_default();
        sections.push(format!("[Document: {}]\n{}", name, body));
    }

    RetrievedContext {
        text: sections.join("\n\n---\n\n"),
        document_ids: order.into_iter().map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkRecord;

    fn hit(doc: &str, content: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: ChunkRecord {
                chunk_id: format!("{}:{}", doc, content),
                tenant_id: "acme".into(),
                document_id: doc.into(),
                chunk_index: 0,
                chunk_count: 1,
                content: content.into(),
                source: format!("{}.txt", doc),
                file_type: "txt".into(),
                file_hash: String::new(),
            },
            score,
        }
    }

    #[test]
    fn test_floor_filters_and_truncates() {
        let candidates = vec![
            hit("d1", "a", 0.9),
            hit("d1", "b", 0.8),
            hit("d2", "c", 0.5),
            hit("d2", "d", 0.1),
        ];
        let kept = apply_floor(candidates, 2, 0.3);
        let contents: Vec<_> = kept.iter().map(|h| h.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn test_floor_falls_back_to_top_k() {
        let candidates = vec![hit("d1", "a", 0.2), hit("d1", "b", 0.1), hit("d1", "c", 0.05)];
        let kept = apply_floor(candidates, 2, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].chunk.content, "a");
    }

    #[test]
    fn test_build_context_groups_by_document() {
        let hits = vec![hit("d1", "first", 0.9), hit("d2", "second", 0.8), hit("d1", "third", 0.7)];
        let ctx = build_context(&hits, &[]);
        assert_eq!(ctx.document_ids, vec!["d1", "d2"]);
        assert_eq!(
            ctx.text,
            "[Document: d1.txt]\nfirst\n\nthird\n\n---\n\n[Document: d2.txt]\nsecond"
        );
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[], &[]), RetrievedContext::default());
    }
}
