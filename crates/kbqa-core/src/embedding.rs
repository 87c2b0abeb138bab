//! Embedding provider trait and vector similarity.
//!
//! Defines the [`EmbeddingProvider`] trait that upstream embedding backends
//! implement, plus the cosine similarity used by the vector store.
//!
//! Concrete providers (remote APIs, local models) are supplied by the
//! caller; this crate never talks to one directly.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Calls may be slow and fallible; the [`Retriever`](crate::retriever::Retriever)
/// memoizes them through a [`TtlCache`](crate::cache::TtlCache).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Compute cosine similarity between two embedding vectors in `f64`.
///
/// Returns `None` when the vectors have different lengths. Returns
/// `Some(0.0)` when either vector is empty or has zero magnitude, so a
/// degenerate vector never produces `NaN`.
///
/// ```rust
/// use kbqa_core::embedding::cosine_similarity;
///
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), None);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Some(0.0);
    }

    Some(dot / denom)
}
