//! Rate-limited, cache-wrapped retrieval facade.
//!
//! [`Retriever`] is where the independent components meet. Nothing in the
//! store, cache, or limiter knows about the others; the facade admits the
//! caller through a rate-limit tier, memoizes the query embedding and the
//! search outcome, and delegates storage and ranking to the [`VectorStore`].
//!
//! # Request flow
//!
//! ```text
//! ingest:   upload limiter ─▶ store.store(doc) ─▶ clear search cache
//! search:   general limiter ─▶ embedding cache ─▶ search cache ─▶ store.search
//! ```
//!
//! Search outcomes are cached under a key that includes the ingest
//! generation observed before the store is read. An ingest bumps the
//! generation after the document is visible, so an outcome computed against
//! the previous index can only land under a key no later search asks for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheKey, TtlCache};
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::models::{Document, SearchResult};
use crate::rate_limit::RateLimiter;
use crate::store::{SearchOutcome, VectorStore};

/// The caches a [`Retriever`] memoizes through.
#[derive(Clone)]
pub struct RetrievalCaches {
    pub embeddings: Arc<TtlCache<Vec<f32>>>,
    pub searches: Arc<TtlCache<SearchOutcome>>,
}

/// The admission tiers a [`Retriever`] gates calls with.
#[derive(Clone)]
pub struct RateLimits {
    /// Applied to document ingestion.
    pub upload: Arc<RateLimiter>,
    /// Applied to queries.
    pub general: Arc<RateLimiter>,
}

/// Search results plus an overall confidence for answer synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub results: Vec<SearchResult>,
    /// Mean result score capped at `1.0`; `0.0` when nothing matched.
    pub confidence: f64,
}

impl RetrievedContext {
    pub fn from_results(results: Vec<SearchResult>) -> Self {
        let confidence = if results.is_empty() {
            0.0
        } else {
            let mean = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
            mean.min(1.0)
        };
        Self {
            results,
            confidence,
        }
    }
}

pub struct Retriever<S, E> {
    store: Arc<S>,
    embedder: Arc<E>,
    caches: RetrievalCaches,
    limits: RateLimits,
    generation: AtomicU64,
}

impl<S: VectorStore, E: EmbeddingProvider> Retriever<S, E> {
    pub fn new(store: Arc<S>, embedder: Arc<E>, caches: RetrievalCaches, limits: RateLimits) -> Self {
        Self {
            store,
            embedder,
            caches,
            limits,
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn admit(limiter: &RateLimiter, client: &str) -> Result<(), RetrievalError> {
        if limiter.is_allowed(client) {
            Ok(())
        } else {
            Err(RetrievalError::RateLimited {
                client: client.to_string(),
                retry_at: limiter.reset_time(client),
            })
        }
    }

    /// Store a document on behalf of `client`.
    ///
    /// Cached search outcomes are dropped since they may now be stale.
    pub fn ingest(&self, client: &str, document: Document) -> Result<(), RetrievalError> {
        Self::admit(&self.limits.upload, client)?;
        let id = document.id.clone();
        self.store.store(document)?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.caches.searches.clear();
        info!(client, document_id = %id, "ingested document");
        Ok(())
    }

    /// Embed `text`, reusing a cached vector when one is live.
    ///
    /// The provider must return exactly one vector of its advertised
    /// dimensionality; anything else is an embedding error.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let key = CacheKey::new("embed_query")
            .arg(text)
            .kwarg("model", self.embedder.model_name())
            .build()
            .map_err(|e| RetrievalError::Embedding(e.into()))?;

        self.caches
            .embeddings
            .get_or_try_insert_with(&key, None, || async {
                let vectors = self.embedder.embed(&[text.to_string()]).await;
                let embedded: Result<Vec<f32>, RetrievalError> = match vectors {
                    Ok(mut vectors) if vectors.len() == 1 => {
                        let v = vectors.remove(0);
                        let dims = self.embedder.dims();
                        if v.is_empty() || v.len() != dims {
                            Err(RetrievalError::Embedding(anyhow!(
                                "provider '{}' returned a {}-dim vector, expected {}",
                                self.embedder.model_name(),
                                v.len(),
                                dims
                            )))
                        } else {
                            Ok(v)
                        }
                    }
                    Ok(vectors) => Err(RetrievalError::Embedding(anyhow!(
                        "provider '{}' returned {} vectors for one input",
                        self.embedder.model_name(),
                        vectors.len()
                    ))),
                    Err(e) => Err(RetrievalError::Embedding(e)),
                };
                embedded
            })
            .await
    }

    /// Search the store for chunks similar to `query` on behalf of `client`.
    ///
    /// A blank query returns an empty outcome without calling the embedder.
    pub async fn search_text(
        &self,
        client: &str,
        query: &str,
        limit: i64,
    ) -> Result<SearchOutcome, RetrievalError> {
        Self::admit(&self.limits.general, client)?;
        if query.trim().is_empty() || limit <= 0 {
            return Ok(SearchOutcome::default());
        }

        let vector = self.embed_query(query).await?;
        let generation = self.generation.load(Ordering::Acquire);
        let key = CacheKey::new("search")
            .arg(&vector)
            .arg(&limit)
            .kwarg("generation", &generation)
            .build()
            .map_err(|e| RetrievalError::Embedding(e.into()))?;

        let outcome = self
            .caches
            .searches
            .get_or_insert_with(&key, None, || self.store.search(&vector, limit));
        debug!(
            client,
            results = outcome.results.len(),
            skipped = outcome.skipped,
            "text search complete"
        );
        Ok(outcome)
    }

    /// Retrieve ranked context for answering `question`.
    pub async fn retrieve_context(
        &self,
        client: &str,
        question: &str,
        limit: i64,
    ) -> Result<RetrievedContext, RetrievalError> {
        let outcome = self.search_text(client, question, limit).await?;
        Ok(RetrievedContext::from_results(outcome.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::memory::InMemoryVectorStore;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use crate::error::StoreError;
    use crate::models::Chunk;
    use crate::store::StoreStats;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;

    struct FakeEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: pairs
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }

        fn dims(&self) -> usize {
            3
        }

        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.vectors
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow!("unknown text: {}", t))
                })
                .collect()
        }
    }

    /// Returns two vectors no matter how many texts it is given.
    struct BatchEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BatchEmbedder {
        fn model_name(&self) -> &str {
            "batch"
        }

        fn dims(&self) -> usize {
            3
        }

        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
        }
    }

    /// Store whose first search reads the index, then parks until released.
    struct GatedStore {
        inner: InMemoryVectorStore,
        armed: AtomicBool,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: InMemoryVectorStore::new(),
                armed: AtomicBool::new(true),
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl VectorStore for GatedStore {
        fn store(&self, document: Document) -> Result<(), StoreError> {
            self.inner.store(document)
        }

        fn get_document(&self, id: &str) -> Option<Document> {
            self.inner.get_document(id)
        }

        fn get_chunk(&self, id: &str) -> Option<Chunk> {
            self.inner.get_chunk(id)
        }

        fn list_documents(&self) -> Vec<Document> {
            self.inner.list_documents()
        }

        fn delete_document(&self, id: &str) -> bool {
            self.inner.delete_document(id)
        }

        fn search(&self, query: &[f32], limit: i64) -> SearchOutcome {
            let outcome = self.inner.search(query, limit);
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.wait();
                self.release.wait();
            }
            outcome
        }

        fn stats(&self) -> StoreStats {
            self.inner.stats()
        }
    }

    fn retriever(
        embedder: FakeEmbedder,
        upload_limit: usize,
        general_limit: usize,
    ) -> (Retriever<InMemoryVectorStore, FakeEmbedder>, Arc<FakeEmbedder>) {
        retriever_over(InMemoryVectorStore::new(), embedder, upload_limit, general_limit)
    }

    fn retriever_over<S: VectorStore, E: EmbeddingProvider>(
        store: S,
        embedder: E,
        upload_limit: usize,
        general_limit: usize,
    ) -> (Retriever<S, E>, Arc<E>) {
        let clock = Arc::new(ManualClock::default());
        let embedder = Arc::new(embedder);
        let caches = RetrievalCaches {
            embeddings: Arc::new(TtlCache::with_clock(TimeDelta::hours(24), clock.clone())),
            searches: Arc::new(TtlCache::with_clock(TimeDelta::minutes(30), clock.clone())),
        };
        let limits = RateLimits {
            upload: Arc::new(RateLimiter::with_clock(
                upload_limit,
                TimeDelta::seconds(60),
                clock.clone(),
            )),
            general: Arc::new(RateLimiter::with_clock(
                general_limit,
                TimeDelta::seconds(60),
                clock,
            )),
        };
        let r = Retriever::new(
            Arc::new(store),
            embedder.clone(),
            caches,
            limits,
        );
        (r, embedder)
    }

    fn sample_doc() -> Document {
        Document::from_embedded_chunks(
            "d1",
            "guide.md",
            "install\n\ndeploy",
            vec![
                ("install".to_string(), vec![1.0, 0.0, 0.0]),
                ("deploy".to_string(), vec![0.0, 1.0, 0.0]),
            ],
        )
    }

    #[tokio::test]
    async fn test_search_text_uses_embedding_cache() {
        let (r, embedder) = retriever(
            FakeEmbedder::new(&[("how to deploy", vec![0.1, 1.0, 0.0])]),
            10,
            60,
        );
        r.ingest("ip-1", sample_doc()).unwrap();

        let first = r.search_text("ip-1", "how to deploy", 5).await.unwrap();
        let second = r.search_text("ip-1", "how to deploy", 5).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.results[0].chunk.text, "deploy");
        assert_eq!(first.results[0].document_filename, "guide.md");
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_ingest_invalidates_search_cache() {
        let (r, _) = retriever(
            FakeEmbedder::new(&[("q", vec![0.0, 0.0, 1.0])]),
            10,
            60,
        );
        r.ingest("ip-1", sample_doc()).unwrap();
        assert!(r.search_text("ip-1", "q", 5).await.unwrap().is_empty());

        let extra = Document::from_embedded_chunks(
            "d2",
            "ops.md",
            "rollback",
            vec![("rollback".to_string(), vec![0.0, 0.0, 1.0])],
        );
        r.ingest("ip-1", extra).unwrap();
        let outcome = r.search_text("ip-1", "q", 5).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].chunk.text, "rollback");
    }

    #[tokio::test]
    async fn test_upload_tier_rejects() {
        let (r, _) = retriever(FakeEmbedder::new(&[]), 1, 60);
        r.ingest("ip-1", sample_doc()).unwrap();
        match r.ingest("ip-1", sample_doc()) {
            Err(RetrievalError::RateLimited { client, retry_at }) => {
                assert_eq!(client, "ip-1");
                assert!(retry_at.is_some());
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        // Another client is unaffected.
        r.ingest("ip-2", sample_doc()).unwrap();
    }

    #[tokio::test]
    async fn test_general_tier_rejects() {
        let (r, _) = retriever(FakeEmbedder::new(&[("q", vec![1.0, 0.0, 0.0])]), 10, 2);
        assert!(r.search_text("ip-1", "q", 3).await.is_ok());
        assert!(r.search_text("ip-1", "q", 3).await.is_ok());
        assert!(matches!(
            r.search_text("ip-1", "q", 3).await,
            Err(RetrievalError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_document_surfaces_store_error() {
        let (r, _) = retriever(FakeEmbedder::new(&[]), 10, 60);
        let empty = Document::from_embedded_chunks("d1", "empty.md", "", Vec::new());
        assert!(matches!(r.ingest("ip-1", empty), Err(RetrievalError::Store(_))));
        assert_eq!(r.store().stats().total_documents, 0);
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedder() {
        let (r, embedder) = retriever(FakeEmbedder::new(&[]), 10, 60);
        assert!(r.search_text("ip-1", "   ", 5).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_not_cached() {
        let (r, embedder) = retriever(FakeEmbedder::new(&[]), 10, 60);
        assert!(matches!(
            r.search_text("ip-1", "unknown", 5).await,
            Err(RetrievalError::Embedding(_))
        ));
        assert!(r.search_text("ip-1", "unknown", 5).await.is_err());
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_context_confidence() {
        let (r, _) = retriever(
            FakeEmbedder::new(&[
                ("install", vec![1.0, 0.0, 0.0]),
                ("nothing", vec![0.0, 0.0, 1.0]),
            ]),
            10,
            60,
        );
        r.ingest("ip-1", sample_doc()).unwrap();

        let ctx = r.retrieve_context("ip-1", "install", 3).await.unwrap();
        assert_eq!(ctx.results.len(), 1);
        assert!((ctx.confidence - 1.0).abs() < 1e-9);

        let none = r.retrieve_context("ip-1", "nothing", 3).await.unwrap();
        assert!(none.results.is_empty());
        assert_eq!(none.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_embedding_must_be_single_vector_of_provider_dims() {
        let (r, _) = retriever_over(InMemoryVectorStore::new(), BatchEmbedder, 10, 60);
        assert!(matches!(
            r.embed_query("anything").await,
            Err(RetrievalError::Embedding(_))
        ));

        let (r, _) = retriever(FakeEmbedder::new(&[("short", vec![1.0, 0.0])]), 10, 60);
        assert!(matches!(
            r.embed_query("short").await,
            Err(RetrievalError::Embedding(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_racing_ingest_is_not_served_afterwards() {
        let (r, _) = retriever_over(
            GatedStore::new(),
            FakeEmbedder::new(&[("q", vec![1.0, 0.0, 0.0])]),
            10,
            60,
        );
        let r = Arc::new(r);

        let in_flight = {
            let r = r.clone();
            tokio::spawn(async move { r.search_text("ip-1", "q", 5).await })
        };

        // The spawned search has read the empty index and is parked.
        r.store().entered.wait();
        r.ingest("ip-1", sample_doc()).unwrap();
        r.store().release.wait();

        let stale = in_flight.await.unwrap().unwrap();
        assert!(stale.is_empty());

        let fresh = r.search_text("ip-1", "q", 5).await.unwrap();
        assert_eq!(fresh.results.len(), 1);
        assert_eq!(fresh.results[0].chunk.text, "install");
    }
}
