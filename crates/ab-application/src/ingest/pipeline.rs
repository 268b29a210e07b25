//! Ingestion pipeline
//!
//! One job runs the staged pipeline: discover → chunk → embed → upsert →
//! graph → finalize. Individual chunk failures in the middle stages are
//! isolated (skip and warn); a backend failure is fatal for the job. The
//! cancellation flag is honored between stages and between embedding
//! batches.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::watch;

use ab_domain::constants::embedding::DEFAULT_EMBED_BATCH_SIZE;
use ab_domain::entities::{Document, EmbeddedDocument, Job, SourceType};
use ab_domain::error::{Error, Result};
use ab_domain::ports::{DocumentChunker, EmbeddingProvider, GraphStore, StorageBackend, Summarizer};
use ab_providers::chunking::{CodeChunker, TextChunker};

use super::discovery::{DiscoveredFile, discover_files};
use crate::graph::{llm_triples, structural_triples};
use crate::jobs::queue::CancelFlag;

/// Documents per upsert batch (each batch commits all-or-nothing)
const UPSERT_BATCH: usize = 256;

/// Graph build settings threaded in from configuration
#[derive(Debug, Clone, Default)]
pub struct GraphBuildSettings {
    /// Whether the graph stage runs at all
    pub enabled: bool,
    /// Cap on LLM-extracted triples per prose chunk
    pub max_triplets_per_chunk: usize,
}

/// What a completed job did
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestReport {
    /// Files discovered and routed to a chunker
    pub files: usize,
    /// Files that failed to read or chunk (skipped)
    pub skipped_files: usize,
    /// Chunks produced
    pub chunks: usize,
    /// Chunks dropped after embedding retries
    pub dropped_chunks: usize,
    /// Documents upserted
    pub upserted: usize,
    /// Triples added to the graph
    pub triples: usize,
}

/// The ingestion orchestrator
pub struct IngestService {
    backend: Arc<dyn StorageBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    summarizer: Arc<dyn Summarizer>,
    graph: Option<Arc<dyn GraphStore>>,
    graph_settings: GraphBuildSettings,
}

impl IngestService {
    /// Wire the orchestrator's collaborators
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
        graph: Option<Arc<dyn GraphStore>>,
        graph_settings: GraphBuildSettings,
    ) -> Self {
        Self {
            backend,
            embedder,
            summarizer,
            graph,
            graph_settings,
        }
    }

    /// Run one job end to end. Progress fractions are sent at stage
    /// boundaries through `progress`.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the flag is raised, `InvalidArgument` for a
    /// bad folder, and storage backend errors verbatim (always fatal for
    /// the job).
    pub async fn run_job(
        &self,
        job: &Job,
        cancel: &CancelFlag,
        progress: &watch::Sender<f32>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let folder = Path::new(&job.request.folder_path).to_path_buf();

        // Stage 1: discover.
        check_cancel(cancel)?;
        let request = job.request.clone();
        let files = tokio::task::spawn_blocking(move || discover_files(&folder, &request))
            .await
            .map_err(|e| Error::internal(format!("discovery task panicked: {e}")))??;
        report.files = files.len();
        let _ = progress.send(0.05);
        tracing::info!(job_id = %job.job_id, files = files.len(), "discovery complete");

        // Stage 2: chunk (CPU-bound, off the scheduler).
        check_cancel(cancel)?;
        let cancel_for_chunking = Arc::clone(cancel);
        let (documents, skipped) =
            tokio::task::spawn_blocking(move || chunk_files(&files, &cancel_for_chunking))
                .await
                .map_err(|e| Error::internal(format!("chunking task panicked: {e}")))?;
        check_cancel(cancel)?;
        report.chunks = documents.len();
        report.skipped_files = skipped;
        let _ = progress.send(0.3);
        tracing::info!(job_id = %job.job_id, chunks = documents.len(), skipped, "chunking complete");

        // Stage 3: embed, in provider-sized batches.
        let embedded = self
            .embed_documents(documents, cancel, progress, &mut report)
            .await?;

        // Stage 4: upsert, all-or-nothing per batch; backend failure is fatal.
        check_cancel(cancel)?;
        for batch in embedded.chunks(UPSERT_BATCH) {
            check_cancel(cancel)?;
            report.upserted += self.backend.upsert_documents(batch).await?;
        }
        let _ = progress.send(0.8);

        // Stage 5: graph build (optional).
        if self.graph_settings.enabled {
            if let Some(graph) = &self.graph {
                check_cancel(cancel)?;
                report.triples = self
                    .build_graph(graph, &embedded, job, cancel)
                    .await?;
            }
        }
        let _ = progress.send(0.95);

        // Stage 6: finalize.
        let _ = progress.send(1.0);
        Ok(report)
    }

    async fn embed_documents(
        &self,
        documents: Vec<Document>,
        cancel: &CancelFlag,
        progress: &watch::Sender<f32>,
        report: &mut IngestReport,
    ) -> Result<Vec<EmbeddedDocument>> {
        let total = documents.len().max(1);
        let mut embedded = Vec::with_capacity(documents.len());
        let mut processed = 0usize;

        for batch in documents.chunks(DEFAULT_EMBED_BATCH_SIZE) {
            check_cancel(cancel)?;
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();

            match self.embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for (doc, vector) in batch.iter().zip(vectors) {
                        embedded.push(EmbeddedDocument {
                            document: doc.clone(),
                            embedding: vector,
                        });
                    }
                }
                Ok(_) | Err(_) => {
                    // One more attempt per chunk in singleton batches; chunks
                    // that still fail are dropped with a warning.
                    for doc in batch {
                        check_cancel(cancel)?;
                        match self.embedder.embed(&doc.text).await {
                            Ok(vector) => embedded.push(EmbeddedDocument {
                                document: doc.clone(),
                                embedding: vector,
                            }),
                            Err(Error::Cancelled) => return Err(Error::Cancelled),
                            Err(e) => {
                                report.dropped_chunks += 1;
                                tracing::warn!(
                                    chunk_id = %doc.chunk_id,
                                    error = %e,
                                    "dropping chunk after failed embedding retries"
                                );
                            }
                        }
                    }
                }
            }

            processed += batch.len();
            let fraction = 0.3 + 0.4 * (processed as f32 / total as f32);
            let _ = progress.send(fraction);
        }
        Ok(embedded)
    }

    async fn build_graph(
        &self,
        graph: &Arc<dyn GraphStore>,
        embedded: &[EmbeddedDocument],
        job: &Job,
        cancel: &CancelFlag,
    ) -> Result<usize> {
        if job.request.rebuild_graph {
            graph.clear().await?;
            tracing::info!(job_id = %job.job_id, "graph cleared for rebuild");
        }

        let max_triplets = self.graph_settings.max_triplets_per_chunk;
        let mut added = 0usize;
        for item in embedded {
            check_cancel(cancel)?;
            let doc = &item.document;

            let mut triples = structural_triples(doc);
            if doc.source_type == SourceType::Doc && max_triplets > 0 {
                match llm_triples(self.summarizer.as_ref(), doc, max_triplets).await {
                    Ok(extracted) => triples.extend(extracted),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        // Non-fatal: the chunk is indexed without graph
                        // contribution.
                        tracing::warn!(
                            chunk_id = %doc.chunk_id,
                            error = %e,
                            "triple extraction failed, continuing without graph contribution"
                        );
                    }
                }
            }

            for triple in triples {
                graph.add_triple(triple).await?;
                added += 1;
            }
        }

        graph.persist().await?;
        tracing::info!(job_id = %job.job_id, triples = added, "graph persisted");
        Ok(added)
    }
}

fn check_cancel(cancel: &CancelFlag) -> Result<()> {
    if cancel.load(Ordering::SeqCst) {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn chunk_files(files: &[DiscoveredFile], cancel: &CancelFlag) -> (Vec<Document>, usize) {
    let text_chunker = TextChunker::new();
    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for file in files {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        let content = match std::fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(e) => {
                skipped += 1;
                tracing::warn!(path = %file.path.display(), error = %e, "unreadable file skipped");
                continue;
            }
        };

        let chunked = match (file.classification, file.language) {
            (SourceType::Doc, _) => text_chunker.chunk(&content, &file.source_path),
            (_, Some(language)) => {
                CodeChunker::new(language).chunk(&content, &file.source_path)
            }
            (_, None) => continue,
        };

        match chunked {
            Ok(mut chunks) => {
                for chunk in &mut chunks {
                    // Discovery's classification wins (test files keep their
                    // language but are typed `test`).
                    chunk.source_type = file.classification;
                }
                documents.extend(chunks);
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!(path = %file.path.display(), error = %e, "unchunkable file skipped");
            }
        }
    }
    (documents, skipped)
}
