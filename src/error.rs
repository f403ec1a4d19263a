// Core error contract. This is the one error type callers of the index and the
// analyses see, regardless of which embedder or vector store sits underneath.
//
// Stores and embedders report failures as anyhow errors. The index converts
// them at its boundary: failures while indexing become `Indexing`, failures
// while querying become `BackingService`.

use thiserror::Error;

/// Errors surfaced by the retrieval core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller error: bad result count, bad batch size, malformed corpus row.
    /// Not worth retrying.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding or store failure while indexing. The failing batch was
    /// rolled back as a unit; batches committed before it remain.
    #[error("indexing failed at batch {batch}: {message}")]
    Indexing { batch: usize, message: String },

    /// The embedding function or the vector store failed, timed out, or was
    /// unreachable while answering a query.
    #[error("backing service error: {0}")]
    BackingService(String),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidArgument(message.into())
    }

    pub fn indexing(batch: usize, message: impl std::fmt::Display) -> Self {
        CoreError::Indexing {
            batch,
            message: message.to_string(),
        }
    }

    /// Wrap a backend failure, keeping the whole anyhow context chain.
    pub fn backing(err: impl std::fmt::Display) -> Self {
        CoreError::BackingService(format!("{err:#}"))
    }
}

/// Result alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
