//! # kbqa Core
//!
//! In-process retrieval and resource-control layer for kbqa: document
//! models, an exact-search vector store, a TTL cache for memoizing expensive
//! upstream calls, and a per-client sliding-window rate limiter.
//!
//! This crate performs no network or disk I/O. Embedding providers, HTTP
//! transport, and answer synthesis live with the caller; the
//! [`retriever::Retriever`] facade shows how the pieces compose.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Document`, `Chunk`, `SearchResult` |
//! | [`error`] | `StoreError`, `InvalidDocument`, `RetrievalError` |
//! | [`clock`] | Injectable time source (`SystemClock`, `ManualClock`) |
//! | [`coverage`] | Knowledge-base coverage and gap analysis |
//! | [`embedding`] | `EmbeddingProvider` trait and cosine similarity |
//! | [`store`] | `VectorStore` trait and `InMemoryVectorStore` |
//! | [`cache`] | `TtlCache` and `CacheKey` fingerprinting |
//! | [`rate_limit`] | Sliding-window `RateLimiter` |
//! | [`retriever`] | Rate-limited, cache-wrapped retrieval facade |

pub mod cache;
pub mod clock;
pub mod coverage;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod retriever;
pub mod store;

pub use cache::{CacheKey, CacheStats, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coverage::{CoverageReport, CoverageStatus};
pub use error::{InvalidDocument, RetrievalError, StoreError};
pub use models::{Chunk, Document, SearchResult};
pub use rate_limit::{RateLimitStats, RateLimiter};
pub use store::{memory::InMemoryVectorStore, SearchOutcome, StoreStats, VectorStore};
