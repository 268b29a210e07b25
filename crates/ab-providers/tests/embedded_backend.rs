//! Storage contract tests against the embedded backend

use std::sync::Arc;

use ab_domain::entities::{Document, EmbeddedDocument, SourceType};
use ab_domain::error::Error;
use ab_domain::ports::StorageBackend;
use ab_domain::value_objects::{Embedding, Language, SearchFilters};
use ab_providers::storage::EmbeddedBackend;

fn doc(id: &str, text: &str, axis: usize) -> EmbeddedDocument {
    let mut vector = vec![0.0f32; 8];
    vector[axis % 8] = 1.0;
    EmbeddedDocument {
        document: Document::test_fixture(id, text),
        embedding: Embedding::new(vector, "test"),
    }
}

async fn backend(dir: &std::path::Path) -> Arc<dyn StorageBackend> {
    let backend: Arc<dyn StorageBackend> = Arc::new(EmbeddedBackend::new(dir.join("data")));
    backend.initialize().await.expect("init");
    backend
}

fn corpus() -> Vec<EmbeddedDocument> {
    vec![
        doc("a", "alpha parser reads configuration files", 0),
        doc("b", "beta renderer draws the interface", 1),
        doc("c", "gamma scheduler dispatches background jobs", 2),
        doc("d", "delta cache stores hot entries", 3),
        doc("e", "epsilon logger writes structured events", 4),
    ]
}

#[tokio::test]
async fn count_tracks_new_documents_and_replacements() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;

    let inserted = backend.upsert_documents(&corpus()).await.expect("upsert");
    assert_eq!(inserted, 5);
    assert_eq!(backend.get_count().await.expect("count"), 5);

    // Replacing an existing id does not change the count.
    let replacement = vec![doc("c", "gamma scheduler, rewritten text", 2)];
    let inserted = backend.upsert_documents(&replacement).await.expect("upsert");
    assert_eq!(inserted, 0);
    assert_eq!(backend.get_count().await.expect("count"), 5);

    let fetched = backend
        .get_documents(&["c".to_owned()])
        .await
        .expect("get");
    assert!(fetched[0].text.contains("rewritten"));
}

#[tokio::test]
async fn dimension_mismatch_rejects_and_preserves_prior_data() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    let wrong = vec![EmbeddedDocument {
        document: Document::test_fixture("f", "wrong dimension"),
        embedding: Embedding::new(vec![1.0, 0.0, 0.0], "test"),
    }];
    let result = backend.upsert_documents(&wrong).await;
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 8,
            actual: 3
        })
    ));
    assert_eq!(backend.get_count().await.expect("count"), 5);

    // Mismatched query vectors are rejected the same way.
    let result = backend
        .vector_search(&[1.0, 0.0], 5, &SearchFilters::default())
        .await;
    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
}

#[tokio::test]
async fn search_orderings_are_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    let mut qvec = vec![0.0f32; 8];
    qvec[2] = 1.0;

    for _ in 0..3 {
        let hits = backend
            .vector_search(&qvec, 5, &SearchFilters::default())
            .await
            .expect("search");
        assert_eq!(hits[0].chunk_id, "c");
        // Strictly descending scores with ascending-id tie-break.
        for pair in hits.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].chunk_id < pair[1].chunk_id)
            );
        }
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    }
}

#[tokio::test]
async fn hybrid_ranks_the_keyword_and_vector_match_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    let mut qvec = vec![0.0f32; 8];
    qvec[2] = 1.0;
    let hits = backend
        .hybrid_search_with_rrf(&qvec, "gamma scheduler", 5, 0.5, &SearchFilters::default())
        .await
        .expect("hybrid");

    assert_eq!(hits[0].chunk_id, "c");
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    let mut ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), hits.len(), "chunk ids appear once each");
}

#[tokio::test]
async fn alpha_extremes_match_the_pure_rankings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    // Vector points at `a`, keywords match `e`.
    let mut qvec = vec![0.0f32; 8];
    qvec[0] = 1.0;
    let query = "epsilon logger structured";

    let keyword_only = backend
        .hybrid_search_with_rrf(&qvec, query, 5, 0.0, &SearchFilters::default())
        .await
        .expect("hybrid");
    let keyword_direct = backend
        .keyword_search(query, 5, &SearchFilters::default())
        .await
        .expect("keyword");
    assert_eq!(keyword_only[0].chunk_id, keyword_direct[0].chunk_id);

    let vector_only = backend
        .hybrid_search_with_rrf(&qvec, query, 5, 1.0, &SearchFilters::default())
        .await
        .expect("hybrid");
    let vector_direct = backend
        .vector_search(&qvec, 5, &SearchFilters::default())
        .await
        .expect("vector");
    assert_eq!(vector_only[0].chunk_id, vector_direct[0].chunk_id);
}

#[tokio::test]
async fn stopword_only_query_returns_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    let hits = backend
        .keyword_search("the and of that", 5, &SearchFilters::default())
        .await
        .expect("keyword");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn filters_push_down_before_truncation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;

    let mut code = doc("code-1", "alpha parser implemented in rust", 0);
    code.document.source_type = SourceType::Code;
    code.document.language = Some(Language::Rust);
    let mut items = corpus();
    items.push(code);
    backend.upsert_documents(&items).await.expect("upsert");

    let filters = SearchFilters {
        source_types: Some(vec![SourceType::Code]),
        languages: Some(vec![Language::Rust]),
    };
    let hits = backend
        .keyword_search("alpha parser", 5, &filters)
        .await
        .expect("keyword");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "code-1");
}

#[tokio::test]
async fn reset_then_upsert_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;
    backend.upsert_documents(&corpus()).await.expect("upsert");

    backend.reset().await.expect("reset");
    assert_eq!(backend.get_count().await.expect("count"), 0);

    // The dimension metadata was cleared: a different dimension is fine now.
    let redimensioned = vec![EmbeddedDocument {
        document: Document::test_fixture("x", "fresh corpus"),
        embedding: Embedding::new(vec![1.0, 0.0], "test"),
    }];
    backend
        .upsert_documents(&redimensioned)
        .await
        .expect("upsert");
    assert_eq!(backend.get_count().await.expect("count"), 1);
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let backend = backend(dir.path()).await;
        backend.upsert_documents(&corpus()).await.expect("upsert");
    }

    let reopened = backend(dir.path()).await;
    assert_eq!(reopened.get_count().await.expect("count"), 5);

    let hits = reopened
        .keyword_search("gamma scheduler", 5, &SearchFilters::default())
        .await
        .expect("keyword");
    assert_eq!(hits[0].chunk_id, "c");
}

#[tokio::test]
async fn counts_by_type_partition_the_corpus() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = backend(dir.path()).await;

    let mut test_doc = doc("t", "integration test fixture", 5);
    test_doc.document.source_type = SourceType::Test;
    let mut items = corpus();
    items.push(test_doc);
    backend.upsert_documents(&items).await.expect("upsert");

    let counts = backend.get_counts_by_type().await.expect("counts");
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    assert_eq!(total, backend.get_count().await.expect("count"));
    assert!(counts.contains(&("doc".to_owned(), 5)));
    assert!(counts.contains(&("test".to_owned(), 1)));
}
