//! In-memory vector index over L2-normalized embeddings.
//!
//! Rebuilt wholesale per session; entries are never appended to or
//! diffed against an earlier build.

use ndarray::{Array1, Array2};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::errors::ResearchError;

pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    /// Sequential insertion id, starting at 0.
    pub id: usize,
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimension: usize,
    /// One unit-length row per document, in insertion order.
    vectors: Array2<f32>,
    documents: Vec<IndexedDocument>,
}

impl VectorIndex {
    pub fn build(
        embedding_model: &str,
        texts: Vec<String>,
        metadata: Vec<Metadata>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, ResearchError> {
        if texts.len() != metadata.len() {
            return Err(ResearchError::DimensionMismatch {
                texts: texts.len(),
                metadata: metadata.len(),
            });
        }
        if embeddings.len() != texts.len() {
            return Err(ResearchError::Embedding(format!(
                "{} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        if !embeddings.is_empty() && dimension == 0 {
            return Err(ResearchError::Embedding("embedding vectors are empty".into()));
        }
        if let Some(bad) = embeddings.iter().position(|v| v.len() != dimension) {
            return Err(ResearchError::Embedding(format!(
                "embedding {} has dimension {}, expected {}",
                bad,
                embeddings[bad].len(),
                dimension
            )));
        }

        let rows = embeddings.len();
        let flat: Vec<f32> = embeddings.into_iter().flatten().collect();
        let mut vectors =
            Array2::from_shape_vec((rows, dimension), flat).map_err(ResearchError::internal)?;
        for mut row in vectors.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|x| x / norm);
            }
        }

        let documents = texts
            .into_iter()
            .zip(metadata)
            .enumerate()
            .map(|(id, (text, metadata))| IndexedDocument { id, text, metadata })
            .collect();

        Ok(Self {
            embedding_model: embedding_model.to_string(),
            dimension,
            vectors,
            documents,
        })
    }

    pub fn ntotal(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn document(&self, id: usize) -> Option<&IndexedDocument> {
        self.documents.get(id)
    }

    /// Top `min(k, ntotal)` `(id, similarity)` pairs, highest similarity
    /// first; equal scores go to the lower id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, ResearchError> {
        if self.is_empty() {
            return Err(ResearchError::EmptyIndex);
        }
        if k == 0 {
            return Err(ResearchError::BadRequest("k must be positive".into()));
        }
        if query.len() != self.dimension {
            return Err(ResearchError::Embedding(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut query = Array1::from_vec(query.to_vec());
        let norm = query.dot(&query).sqrt();
        if norm > 0.0 {
            query.mapv_inplace(|x| x / norm);
        }

        let scores = self.vectors.dot(&query);
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k.min(self.ntotal()));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(source: &str) -> Metadata {
        json!({ "source": source }).as_object().cloned().unwrap_or_default()
    }

    fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let n = vectors.len();
        VectorIndex::build(
            "test-model",
            (0..n).map(|i| format!("doc {i}")).collect(),
            (0..n).map(|i| meta(&format!("s{i}"))).collect(),
            vectors,
        )
        .unwrap()
    }

    #[test]
    fn ranks_by_similarity_with_normalized_rows() {
        let index = index(vec![vec![0.0, 3.0], vec![2.0, 0.1], vec![1.0, 1.0]]);
        let hits = index.search(&[10.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert!(hits[0].1 <= 1.0 + 1e-6);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn ties_go_to_lower_id() {
        let index = index(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn k_is_clamped_to_ntotal() {
        let index = index(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.search(&[1.0, 1.0], 50).unwrap().len(), 2);
        assert!(matches!(index.search(&[1.0, 1.0], 0), Err(ResearchError::BadRequest(_))));
    }

    #[test]
    fn empty_index_refuses_queries() {
        let index = VectorIndex::build("m", vec![], vec![], vec![]).unwrap();
        assert_eq!(index.ntotal(), 0);
        assert!(matches!(index.search(&[1.0], 1), Err(ResearchError::EmptyIndex)));
    }

    #[test]
    fn malformed_builds_are_rejected() {
        let err = VectorIndex::build("m", vec!["a".into()], vec![], vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, ResearchError::DimensionMismatch { texts: 1, metadata: 0 }));

        let err = VectorIndex::build(
            "m",
            vec!["a".into(), "b".into()],
            vec![meta("a"), meta("b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, ResearchError::Embedding(_)));

        let index = index(vec![vec![1.0, 0.0]]);
        assert!(matches!(index.search(&[1.0], 1), Err(ResearchError::Embedding(_))));
    }

    #[test]
    fn documents_keep_insertion_ids_and_metadata() {
        let index = index(vec![vec![1.0], vec![2.0]]);
        let doc = index.document(1).unwrap();
        assert_eq!(doc.id, 1);
        assert_eq!(doc.text, "doc 1");
        assert_eq!(doc.metadata["source"], "s1");
        assert_eq!(index.embedding_model(), "test-model");
        assert_eq!(index.dimension(), 1);
    }
}
