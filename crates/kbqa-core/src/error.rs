//! Error types for the retrieval layer.
//!
//! Only structural violations are errors. Empty queries, zero limits,
//! non-positive TTLs, and unknown keys or clients all have well-defined
//! results and never surface here.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a document was refused at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDocument {
    #[error("document '{0}' has no chunks")]
    NoChunks(String),

    #[error("chunk '{chunk_id}' belongs to document '{found}', expected '{expected}'")]
    ForeignChunk {
        chunk_id: String,
        expected: String,
        found: String,
    },

    #[error("chunk id '{0}' appears more than once in the document")]
    DuplicateChunk(String),

    #[error("chunk id '{chunk_id}' is already owned by document '{owner}'")]
    ChunkOwnedElsewhere { chunk_id: String, owner: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] InvalidDocument),
}

/// Failures surfaced by the [`Retriever`](crate::retriever::Retriever) facade.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("rate limit exceeded for client '{client}'")]
    RateLimited {
        client: String,
        retry_at: Option<DateTime<Utc>>,
    },

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
