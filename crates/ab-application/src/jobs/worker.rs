//! The single ingestion worker
//!
//! Exactly one worker per instance drains pending jobs FIFO. Progress
//! updates flow through a watch channel so the pipeline never blocks on
//! the queue's lock mid-stage.

use std::sync::Arc;

use tokio::sync::watch;

use ab_domain::entities::JobStatus;
use ab_domain::error::{Error, ErrorKind};

use super::queue::JobQueue;
use crate::ingest::IngestService;

/// Spawn the worker loop. Abort the handle on shutdown; every transition
/// is already durable in the log, so an abort at worst leaves a `running`
/// record that replay rewrites to `failed`.
pub fn spawn_worker(queue: Arc<JobQueue>, service: Arc<IngestService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let claimed = match queue.claim_next().await {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(error = %e, "job claim failed, backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };

            let Some((job, cancel)) = claimed else {
                queue.wait_for_work().await;
                continue;
            };

            tracing::info!(job_id = %job.job_id, folder = %job.request.folder_path, "job started");
            let (progress_tx, mut progress_rx) = watch::channel(job.progress);
            let forwarder = tokio::spawn({
                let queue = Arc::clone(&queue);
                let job_id = job.job_id.clone();
                async move {
                    while progress_rx.changed().await.is_ok() {
                        let fraction = *progress_rx.borrow();
                        queue.update_progress(&job_id, fraction).await;
                    }
                }
            });

            let result = service.run_job(&job, &cancel, &progress_tx).await;
            drop(progress_tx);
            let _ = forwarder.await;

            let (status, error) = match result {
                Ok(report) => {
                    tracing::info!(
                        job_id = %job.job_id,
                        files = report.files,
                        chunks = report.chunks,
                        upserted = report.upserted,
                        dropped = report.dropped_chunks,
                        triples = report.triples,
                        "job done"
                    );
                    (JobStatus::Done, None)
                }
                Err(Error::Cancelled) => {
                    tracing::info!(job_id = %job.job_id, "job cancelled");
                    (JobStatus::Cancelled, None)
                }
                Err(e) => {
                    let fatal = e.kind() == ErrorKind::BackendUnavailable;
                    tracing::error!(job_id = %job.job_id, error = %e, fatal, "job failed");
                    (JobStatus::Failed, Some(e.to_string()))
                }
            };

            if let Err(e) = queue.finish(&job.job_id, status, error).await {
                tracing::error!(job_id = %job.job_id, error = %e, "failed to record job outcome");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ab_domain::entities::JobRequest;
    use ab_domain::ports::StorageBackend;
    use ab_providers::embedding::{HashEmbeddings, HashSummarizer};
    use ab_providers::storage::EmbeddedBackend;

    use crate::ingest::GraphBuildSettings;
    use crate::jobs::log::JobLog;

    async fn wait_terminal(queue: &JobQueue, job_id: &str) -> JobStatus {
        for _ in 0..200 {
            if let Some(job) = queue.get(job_id).await {
                if job.status.is_terminal() {
                    return job.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn worker_drains_submitted_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus).expect("mkdir");
        std::fs::write(corpus.join("a.md"), "# A\n\nsome documentation text\n").expect("write");

        let backend: Arc<dyn StorageBackend> =
            Arc::new(EmbeddedBackend::new(dir.path().join("data")));
        backend.initialize().await.expect("init");
        let service = Arc::new(IngestService::new(
            Arc::clone(&backend),
            Arc::new(HashEmbeddings::new(16)),
            Arc::new(HashSummarizer),
            None,
            GraphBuildSettings::default(),
        ));
        let queue = Arc::new(
            JobQueue::open(JobLog::at(dir.path().join("queue.log"))).expect("open"),
        );

        let worker = spawn_worker(Arc::clone(&queue), service);
        let job_id = queue
            .submit(JobRequest::new(corpus.to_string_lossy().to_string()))
            .await
            .expect("submit");

        let status = wait_terminal(&queue, &job_id).await;
        assert_eq!(status, JobStatus::Done);
        assert!(backend.get_count().await.expect("count") > 0);

        let job = queue.get(&job_id).await.expect("job");
        assert!((job.progress - 1.0).abs() < f32::EPSILON);
        worker.abort();
    }

    #[tokio::test]
    async fn worker_fails_jobs_on_bad_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend: Arc<dyn StorageBackend> =
            Arc::new(EmbeddedBackend::new(dir.path().join("data")));
        backend.initialize().await.expect("init");
        let service = Arc::new(IngestService::new(
            backend,
            Arc::new(HashEmbeddings::new(16)),
            Arc::new(HashSummarizer),
            None,
            GraphBuildSettings::default(),
        ));
        let queue = Arc::new(
            JobQueue::open(JobLog::at(dir.path().join("queue.log"))).expect("open"),
        );

        let worker = spawn_worker(Arc::clone(&queue), service);
        let job_id = queue
            .submit(JobRequest::new("/definitely/not/a/folder"))
            .await
            .expect("submit");

        let status = wait_terminal(&queue, &job_id).await;
        assert_eq!(status, JobStatus::Failed);
        let job = queue.get(&job_id).await.expect("job");
        assert!(job.error.is_some());
        worker.abort();
    }
}
