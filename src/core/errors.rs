use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("dimension mismatch: {texts} texts but {metadata} metadata entries")]
    DimensionMismatch { texts: usize, metadata: usize },
    #[error("index is empty")]
    EmptyIndex,
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("embedding model mismatch: index built with '{index}', query uses '{query}'")]
    EmbeddingModelMismatch { index: String, query: String },
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResearchError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ResearchError::Internal(err.to_string())
    }

    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        ResearchError::ProviderUnavailable(err.to_string())
    }

    /// Transient provider faults worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResearchError::ProviderUnavailable(_) | ResearchError::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_faults_are_retryable() {
        assert!(ResearchError::unavailable("timeout").is_retryable());
        assert!(ResearchError::MalformedResponse("no json".into()).is_retryable());
        assert!(!ResearchError::EmptyIndex.is_retryable());
        assert!(!ResearchError::ModelLoad("weights".into()).is_retryable());
    }

    #[test]
    fn dimension_mismatch_names_both_lengths() {
        let err = ResearchError::DimensionMismatch {
            texts: 2,
            metadata: 1,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: 2 texts but 1 metadata entries"
        );
    }
}
