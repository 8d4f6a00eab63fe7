use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Folder '{0}' not found in file store")]
    FolderNotFound(String),

    #[error("No PDF documents found in folder '{0}'")]
    NoDocumentsFound(String),

    #[error("{documents} document(s) found but none yielded extractable text")]
    NoExtractableContent { documents: usize },

    #[error("Vector index not found: {0}")]
    IndexNotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{provider} call failed: {message}")]
    Provider { provider: String, message: String, retryable: bool },

    #[error("Document '{name}' could not be read: {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("add() requires equal lengths: {vectors} vectors vs {records} records")]
    LengthMismatch { vectors: usize, records: usize },

    #[error("Index is inconsistent ({vectors} vectors vs {records} metadata records); rebuild with a full re-ingestion")]
    IndexCorrupted { vectors: usize, records: usize },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider { provider: provider.into(), message: message.into(), retryable }
    }

    /// Transient provider failures (timeouts, throttling, 5xx) are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
