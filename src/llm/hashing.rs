use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::Embedder;
use crate::core::errors::ResearchError;
use crate::research::dedup::normalize_text;

/// Offline feature-hashing embedder.
///
/// Each normalized word is hashed with SHA-256 into one of `dimension`
/// buckets with a hash-derived sign; the bag is then L2-normalized. Same
/// text, same vector, on every platform.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, ResearchError> {
        if dimension == 0 {
            return Err(ResearchError::BadRequest(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_id: format!("hashing-sha256-{}", dimension),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for token in normalize_text(text).split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ResearchError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_deterministic_and_unit_length() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed_one("Dog rose grows in hedgerows");
        let b = embedder.embed_one("dog-rose GROWS in hedgerows!");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_score_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_one("oak timber");
        let related = embedder.embed_one("oak timber is used for beams");
        let unrelated = embedder.embed_one("sonnets of the elizabethan era");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert!(embedder.embed_one("  ...  ").iter().all(|x| *x == 0.0));
        assert!(HashingEmbedder::new(0).is_err());
        assert_eq!(embedder.model_id(), "hashing-sha256-8");
    }
}
