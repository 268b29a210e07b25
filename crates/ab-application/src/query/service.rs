//! Query orchestrator
//!
//! Routes a query through its retrieval mode, executes the underlying
//! searches (concurrently for `multi`), and shapes fused, deterministic
//! results. Score thresholds apply to the vector and hybrid modes only.

use std::collections::HashMap;
use std::sync::Arc;

use ab_domain::constants::search::{
    DEFAULT_HYBRID_ALPHA, DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K, MULTI_WEIGHT_GRAPH,
    MULTI_WEIGHT_KEYWORD, MULTI_WEIGHT_VECTOR, SEARCH_OVERFETCH_MULTIPLIER,
};
use ab_domain::entities::Document;
use ab_domain::error::{Error, Result};
use ab_domain::ports::{EmbeddingProvider, GraphStore, StorageBackend};
use ab_domain::value_objects::{
    QueryMode, QueryResult, ScoreBreakdown, SearchFilters, SearchHit,
};
use ab_providers::storage::rrf;

use crate::graph::graph_search;

/// Per-query options with spec defaults
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Retrieval mode
    pub mode: QueryMode,
    /// Results returned
    pub top_k: usize,
    /// Minimum score for vector/hybrid results
    pub threshold: f32,
    /// Vector weight in hybrid fusion
    pub alpha: f32,
    /// Metadata predicates
    pub filters: SearchFilters,
    /// Graph traversal depth override
    pub traversal_depth: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            mode: QueryMode::Hybrid,
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_SCORE_THRESHOLD,
            alpha: DEFAULT_HYBRID_ALPHA,
            filters: SearchFilters::default(),
            traversal_depth: None,
        }
    }
}

/// Multi-mode fusion weights; must sum to 1
#[derive(Debug, Clone, Copy)]
pub struct MultiWeights {
    /// Vector ranking weight
    pub vector: f32,
    /// Keyword ranking weight
    pub keyword: f32,
    /// Graph ranking weight
    pub graph: f32,
}

impl Default for MultiWeights {
    fn default() -> Self {
        Self {
            vector: MULTI_WEIGHT_VECTOR,
            keyword: MULTI_WEIGHT_KEYWORD,
            graph: MULTI_WEIGHT_GRAPH,
        }
    }
}

/// The query orchestrator
pub struct QueryService {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    graph: Option<Arc<dyn GraphStore>>,
    graph_enabled: bool,
    default_traversal_depth: usize,
    multi_weights: MultiWeights,
}

impl QueryService {
    /// Wire the orchestrator's collaborators
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        graph: Option<Arc<dyn GraphStore>>,
        graph_enabled: bool,
        default_traversal_depth: usize,
    ) -> Self {
        Self {
            backend,
            embedder,
            graph,
            graph_enabled,
            default_traversal_depth: default_traversal_depth.max(1),
            multi_weights: MultiWeights::default(),
        }
    }

    /// Override the multi-mode fusion weights. Callers hand in a triple
    /// summing to 1 (configuration loading validates this).
    #[must_use]
    pub fn with_multi_weights(mut self, weights: MultiWeights) -> Self {
        self.multi_weights = weights;
        self
    }

    /// Execute a query under the given options.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for empty queries or zero `top_k`,
    /// `GraphDisabled` for graph mode without the graph index, and
    /// backend/provider errors verbatim.
    pub async fn query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        if text.trim().is_empty() {
            return Err(Error::invalid_argument("query text cannot be empty"));
        }
        if options.top_k == 0 {
            return Err(Error::invalid_argument("top_k must be positive"));
        }

        match options.mode {
            QueryMode::Vector => self.vector_query(text, options).await,
            QueryMode::Bm25 => self.keyword_query(text, options).await,
            QueryMode::Hybrid => self.hybrid_query(text, options).await,
            QueryMode::Graph => self.graph_query(text, options).await,
            QueryMode::Multi => self.multi_query(text, options).await,
        }
    }

    async fn query_vector(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embedder.embed(text).await?.normalized().vector)
    }

    async fn vector_query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let qvec = self.query_vector(text).await?;
        let hits = self
            .backend
            .vector_search(&qvec, options.top_k, &options.filters)
            .await?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= options.threshold)
            .map(|hit| {
                let breakdown = ScoreBreakdown {
                    vector: Some(hit.score),
                    ..ScoreBreakdown::default()
                };
                to_result(hit, breakdown)
            })
            .collect())
    }

    async fn keyword_query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let hits = self
            .backend
            .keyword_search(text, options.top_k, &options.filters)
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let breakdown = ScoreBreakdown {
                    keyword: Some(hit.score),
                    ..ScoreBreakdown::default()
                };
                to_result(hit, breakdown)
            })
            .collect())
    }

    async fn hybrid_query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let qvec = self.query_vector(text).await?;
        let hits = self
            .backend
            .hybrid_search_with_rrf(&qvec, text, options.top_k, options.alpha, &options.filters)
            .await?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= options.threshold)
            .map(|hit| to_result(hit, ScoreBreakdown::default()))
            .collect())
    }

    fn graph_store(&self) -> Result<&Arc<dyn GraphStore>> {
        match (&self.graph, self.graph_enabled) {
            (Some(store), true) => Ok(store),
            _ => Err(Error::GraphDisabled),
        }
    }

    async fn graph_query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let store = self.graph_store()?;
        let depth = options
            .traversal_depth
            .unwrap_or(self.default_traversal_depth);
        let hits = graph_search(store, &self.backend, text, options.top_k, depth).await?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let breakdown = ScoreBreakdown {
                    graph: Some(hit.score),
                    ..ScoreBreakdown::default()
                };
                to_result(hit, breakdown)
            })
            .collect())
    }

    async fn multi_query(&self, text: &str, options: &QueryOptions) -> Result<Vec<QueryResult>> {
        let fetch = options.top_k * SEARCH_OVERFETCH_MULTIPLIER;
        let depth = options
            .traversal_depth
            .unwrap_or(self.default_traversal_depth);

        let qvec = self.query_vector(text).await?;
        let graph_future = async {
            match self.graph_store() {
                Ok(store) => graph_search(store, &self.backend, text, fetch, depth).await,
                // Multi-mode degrades to vector+keyword when the graph
                // index is off; the weights renormalize below.
                Err(_) => Ok(Vec::new()),
            }
        };

        let (vector_hits, keyword_hits, graph_hits) = tokio::join!(
            self.backend.vector_search(&qvec, fetch, &options.filters),
            self.backend.keyword_search(text, fetch, &options.filters),
            graph_future,
        );
        let vector_hits = vector_hits?;
        let keyword_hits = keyword_hits?;
        let graph_hits = graph_hits?;

        let mut weights = self.multi_weights;
        if graph_hits.is_empty() && self.graph_store().is_err() {
            let remaining = weights.vector + weights.keyword;
            if remaining > 0.0 {
                weights.vector /= remaining;
                weights.keyword /= remaining;
                weights.graph = 0.0;
            }
        }

        let vector_ids: Vec<String> = vector_hits.iter().map(|h| h.chunk_id.clone()).collect();
        let keyword_ids: Vec<String> = keyword_hits.iter().map(|h| h.chunk_id.clone()).collect();
        let graph_ids: Vec<String> = graph_hits.iter().map(|h| h.chunk_id.clone()).collect();

        let mut fused = rrf::fuse(&[
            rrf::WeightedRanking {
                chunk_ids: &vector_ids,
                weight: weights.vector,
            },
            rrf::WeightedRanking {
                chunk_ids: &keyword_ids,
                weight: weights.keyword,
            },
            rrf::WeightedRanking {
                chunk_ids: &graph_ids,
                weight: weights.graph,
            },
        ]);
        for (_, score) in &mut fused {
            *score = rrf::normalize(*score);
        }

        let mut documents: HashMap<String, Document> = HashMap::new();
        let mut breakdowns: HashMap<String, ScoreBreakdown> = HashMap::new();
        for hit in &vector_hits {
            breakdowns.entry(hit.chunk_id.clone()).or_default().vector = Some(hit.score);
            documents
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| hit.document.clone());
        }
        for hit in &keyword_hits {
            breakdowns.entry(hit.chunk_id.clone()).or_default().keyword = Some(hit.score);
            documents
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| hit.document.clone());
        }
        for hit in &graph_hits {
            breakdowns.entry(hit.chunk_id.clone()).or_default().graph = Some(hit.score);
            documents
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| hit.document.clone());
        }

        Ok(fused
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let document = documents.remove(&chunk_id)?;
                let breakdown = breakdowns.remove(&chunk_id).unwrap_or_default();
                Some(to_result(
                    SearchHit {
                        chunk_id,
                        score,
                        document,
                    },
                    breakdown,
                ))
            })
            .take(options.top_k)
            .collect())
    }
}

fn to_result(hit: SearchHit, scores: ScoreBreakdown) -> QueryResult {
    QueryResult {
        chunk_id: hit.chunk_id,
        text: hit.document.text,
        source: hit.document.source_path,
        score: hit.score,
        scores,
        metadata: hit.document.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_domain::constants::graph::DEFAULT_TRAVERSAL_DEPTH;
    use ab_domain::entities::EmbeddedDocument;
    use ab_domain::value_objects::Embedding;
    use ab_providers::embedding::HashEmbeddings;
    use ab_providers::storage::EmbeddedBackend;

    /// Orthogonal 8-dim fixtures with distinct keyword content, seeded
    /// through an embedder stub that maps known queries onto the axes.
    struct AxisEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let axis = match t.as_str() {
                        t if t.contains("alpha") => 0,
                        t if t.contains("beta") => 1,
                        t if t.contains("gamma") => 2,
                        _ => 3,
                    };
                    let mut v = vec![0.0f32; 8];
                    v[axis] = 1.0;
                    Embedding::new(v, "axis")
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn provider_name(&self) -> &str {
            "axis"
        }
    }

    fn axis_doc(id: &str, axis: usize, text: &str) -> EmbeddedDocument {
        let mut v = vec![0.0f32; 8];
        v[axis] = 1.0;
        EmbeddedDocument {
            document: Document::test_fixture(id, text),
            embedding: Embedding::new(v, "axis"),
        }
    }

    async fn service_with_corpus() -> (QueryService, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend: Arc<dyn StorageBackend> =
            Arc::new(EmbeddedBackend::new(dir.path().join("data")));
        backend.initialize().await.expect("init");
        backend
            .upsert_documents(&[
                axis_doc("a", 0, "notes about the alpha subsystem"),
                axis_doc("b", 1, "notes about the beta subsystem"),
                axis_doc("c", 2, "notes about the gamma subsystem"),
            ])
            .await
            .expect("seed");

        let service = QueryService::new(
            backend,
            Arc::new(AxisEmbedder),
            None,
            false,
            DEFAULT_TRAVERSAL_DEPTH,
        );
        (service, dir)
    }

    #[tokio::test]
    async fn hybrid_puts_the_matching_document_first() {
        let (service, _dir) = service_with_corpus().await;
        let results = service
            .query("gamma", &QueryOptions::default())
            .await
            .expect("query");

        assert_eq!(results[0].chunk_id, "c");
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        // Each chunk id appears exactly once.
        let mut ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[tokio::test]
    async fn vector_threshold_filters_low_scores() {
        let (service, _dir) = service_with_corpus().await;
        let options = QueryOptions {
            mode: QueryMode::Vector,
            threshold: 0.9,
            ..QueryOptions::default()
        };
        let results = service.query("alpha", &options).await.expect("query");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn graph_mode_without_graph_is_graph_disabled() {
        let (service, _dir) = service_with_corpus().await;
        let options = QueryOptions {
            mode: QueryMode::Graph,
            ..QueryOptions::default()
        };
        let result = service.query("anything", &options).await;
        assert!(matches!(result, Err(Error::GraphDisabled)));
    }

    #[tokio::test]
    async fn multi_without_graph_degrades_to_two_rankings() {
        let (service, _dir) = service_with_corpus().await;
        let options = QueryOptions {
            mode: QueryMode::Multi,
            ..QueryOptions::default()
        };
        let results = service.query("beta", &options).await.expect("query");
        assert_eq!(results[0].chunk_id, "b");
        assert!(results[0].scores.vector.is_some());
        assert!(results[0].scores.keyword.is_some());
        assert!(results[0].scores.graph.is_none());
    }

    #[tokio::test]
    async fn multi_weights_steer_the_fusion() {
        // "alpha alpha gamma gamma gamma" embeds onto `a`'s axis, while its
        // keyword mass favors `c`; the configured weights decide the winner.
        let query_text = "alpha alpha gamma gamma gamma";
        let options = QueryOptions {
            mode: QueryMode::Multi,
            ..QueryOptions::default()
        };

        let (service, _dir) = service_with_corpus().await;
        let vector_heavy = service.with_multi_weights(MultiWeights {
            vector: 1.0,
            keyword: 0.0,
            graph: 0.0,
        });
        let results = vector_heavy.query(query_text, &options).await.expect("query");
        assert_eq!(results[0].chunk_id, "a");

        let (service, _dir) = service_with_corpus().await;
        let keyword_heavy = service.with_multi_weights(MultiWeights {
            vector: 0.0,
            keyword: 1.0,
            graph: 0.0,
        });
        let results = keyword_heavy.query(query_text, &options).await.expect("query");
        assert_eq!(results[0].chunk_id, "c");
    }

    #[tokio::test]
    async fn empty_query_is_invalid() {
        let (service, _dir) = service_with_corpus().await;
        let result = service.query("   ", &QueryOptions::default()).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn repeated_queries_are_deterministic() {
        let (service, _dir) = service_with_corpus().await;
        let first = service
            .query("gamma subsystem", &QueryOptions::default())
            .await
            .expect("query");
        let second = service
            .query("gamma subsystem", &QueryOptions::default())
            .await
            .expect("query");
        let ids = |rs: &[QueryResult]| rs.iter().map(|r| r.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn hash_embedder_works_end_to_end() {
        // The default offline provider produces usable rankings too.
        let dir = tempfile::tempdir().expect("tempdir");
        let backend: Arc<dyn StorageBackend> =
            Arc::new(EmbeddedBackend::new(dir.path().join("data")));
        backend.initialize().await.expect("init");
        let embedder = Arc::new(HashEmbeddings::new(16));

        let texts = ["configure the parser", "render the page"];
        let mut docs = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let embedding = embedder.embed(text).await.expect("embed");
            docs.push(EmbeddedDocument {
                document: Document::test_fixture(format!("d{i}"), *text),
                embedding,
            });
        }
        backend.upsert_documents(&docs).await.expect("seed");

        let service = QueryService::new(backend, embedder, None, false, DEFAULT_TRAVERSAL_DEPTH);
        let options = QueryOptions {
            mode: QueryMode::Vector,
            threshold: 0.0,
            ..QueryOptions::default()
        };
        let results = service
            .query("configure the parser", &options)
            .await
            .expect("query");
        assert_eq!(results[0].chunk_id, "d0");
    }
}
