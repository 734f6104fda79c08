use thiserror::Error;

/// Error taxonomy shared by every layer of the pipeline.
///
/// Validation errors (`InvalidConfiguration`, `InvalidArgument`, ...) are
/// raised before any external call and are never retried. Backend variants
/// wrap the original failure so callers can apply their own retry/backoff
/// policy; the core performs no implicit retries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("query cannot be empty")]
    EmptyQuery,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding backend error: {0}")]
    EmbeddingBackend(#[source] anyhow::Error),

    #[error("retrieval backend error: {0}")]
    RetrievalBackend(#[source] anyhow::Error),

    #[error("generation backend error: {0}")]
    GenerationBackend(#[source] anyhow::Error),

    #[error("operation cancelled: deadline exceeded")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
