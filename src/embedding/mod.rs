//! Embedding generation
//!
//! Supports two backends:
//! - `hashed`: feature-hashing bag of words, no external dependencies
//! - `openai`: OpenAI-compatible `/embeddings` API (requires the `openai`
//!   feature and an API key)

mod hashed;

pub use hashed::HashedEmbedder;

use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{DeskError, Result};

/// Trait for embedding generators
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible embedding client
///
/// Works with OpenAI, OpenRouter, Azure OpenAI and local gateways that
/// expose `/embeddings`. The sync [`Embedder`] methods block on the
/// ambient multi-threaded runtime and fail without one.
#[cfg(feature = "openai")]
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[cfg(feature = "openai")]
impl OpenAIEmbedder {
    pub fn with_config(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        dimensions: Option<usize>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
            dimensions: dimensions.unwrap_or(1536),
        }
    }

    /// Async batch embedding (up to 2048 inputs per call)
    pub async fn embed_batch_async(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(2048) {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({
                    "input": chunk,
                    "model": self.model,
                }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(DeskError::Embedding(format!(
                    "Embedding API error {}: {}",
                    status, text
                )));
            }

            let data: serde_json::Value = response.json().await?;
            let items = data["data"]
                .as_array()
                .ok_or_else(|| DeskError::Embedding("Invalid response format".to_string()))?;

            for item in items {
                let embedding: Vec<f32> = item["embedding"]
                    .as_array()
                    .ok_or_else(|| DeskError::Embedding("Missing embedding array".to_string()))?
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect();

                if embedding.len() != self.dimensions {
                    return Err(DeskError::Embedding(format!(
                        "Embedding dimensions mismatch: expected {}, got {}. Set SUPPORTDESK_EMBEDDING_DIMENSIONS={} to match your model.",
                        self.dimensions,
                        embedding.len(),
                        embedding.len()
                    )));
                }
                all_embeddings.push(embedding);
            }
        }

        Ok(all_embeddings)
    }
}

#[cfg(feature = "openai")]
impl Embedder for OpenAIEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| DeskError::Embedding("Empty embedding response".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            DeskError::Embedding("OpenAI embeddings must run inside a Tokio runtime".to_string())
        })?;
        if !matches!(handle.runtime_flavor(), tokio::runtime::RuntimeFlavor::MultiThread) {
            return Err(DeskError::Embedding(
                "OpenAI embeddings need a multi-threaded Tokio runtime".to_string(),
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(self.embed_batch_async(texts)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Create an embedder from configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.model.as_str() {
        #[cfg(feature = "openai")]
        "openai" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                DeskError::Config(
                    "OPENAI_API_KEY required when SUPPORTDESK_EMBEDDING_MODEL=openai".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAIEmbedder::with_config(
                api_key,
                config.base_url.clone(),
                config.embedding_model.clone(),
                Some(config.dimensions),
            )))
        }
        #[cfg(not(feature = "openai"))]
        "openai" => Err(DeskError::Config(
            "OpenAI embeddings require the 'openai' feature to be enabled".to_string(),
        )),
        "hashed" => Ok(Arc::new(HashedEmbedder::new(config.dimensions))),
        _ => Err(DeskError::Config(format!(
            "Unknown embedding model: '{}'. Use 'openai' or 'hashed'",
            config.model
        ))),
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Serialize a vector as little-endian f32 bytes
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]; trailing partial floats are dropped
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "openai")]
    #[test]
    fn test_openai_embedder_without_runtime_errors() {
        let embedder = OpenAIEmbedder::with_config(
            "test-key".to_string(),
            Some("http://127.0.0.1:9".to_string()),
            None,
            Some(8),
        );
        assert!(matches!(embedder.embed("refund"), Err(DeskError::Embedding(_))));

        let current = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let _guard = current.enter();
        assert!(matches!(embedder.embed("refund"), Err(DeskError::Embedding(_))));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_vector_blob_layout() {
        let v = vec![0.5_f32, -1.25, 3.0];
        let bytes = encode_vector(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &0.5_f32.to_le_bytes());
        assert_eq!(decode_vector(&bytes), v);
    }

    #[test]
    fn test_create_embedder() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "hashed");
        assert_eq!(embedder.dimensions(), 384);

        let bad = EmbeddingConfig {
            model: "word2vec".into(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&bad).is_err());
    }
}
