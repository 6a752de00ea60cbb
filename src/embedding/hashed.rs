//! Feature-hashing embedder
//!
//! Offline and deterministic. Vectors are persisted in the index, so the
//! token hash must stay stable across builds (FNV-1a, not `DefaultHasher`).

use std::collections::HashMap;

use crate::embedding::Embedder;
use crate::error::Result;

/// Bag-of-words embedder using the hashing trick
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Tokenize text into lowercase words
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() > 1)
            .map(String::from)
            .collect()
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in bytes {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = Self::fnv1a(token.as_bytes());
        let idx = (hash % self.dimensions as u64) as usize;
        // high bit picks the sign, spreading collisions around zero
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }
}

impl Embedder for HashedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];

        if tokens.is_empty() {
            return Ok(embedding);
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let doc_len = tokens.len() as f32;
        for (token, count) in tf {
            let tf_score = (1.0 + count / doc_len).ln();
            // longer tokens tend to be rarer
            let idf_score = 1.0 + (token.chars().count() as f32 * 0.1);
            let (idx, sign) = self.bucket(token);
            embedding[idx] += tf_score * idf_score * sign;
        }

        for window in tokens.windows(2) {
            let bigram = format!("{}_{}", window[0], window[1]);
            let (idx, sign) = self.bucket(&bigram);
            embedding[idx] += 0.5 * sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hashed"
    }
}
