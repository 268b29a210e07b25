//! Persistent, deduplicated job queue
//!
//! Submission is deduplicated on the deterministic job id: while an
//! identical job is pending or running, re-submission returns the existing
//! id. One worker per instance drains pending jobs FIFO. Every transition
//! is appended to the log before it becomes observable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify};

use ab_domain::entities::{Job, JobRequest, JobStatus};
use ab_domain::error::{Error, Result};

use super::log::{JobLog, JobRecord};

/// Cooperative cancellation flag handed to the worker; checked between
/// pipeline stages.
pub type CancelFlag = Arc<AtomicBool>;

/// Summary of queue state for health reporting
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueSummary {
    /// Number of pending jobs
    pub pending: usize,
    /// Id of the running job, if any
    pub running_job_id: Option<String>,
    /// Progress of the running job
    pub running_progress: Option<f32>,
}

#[derive(Default)]
struct QueueState {
    /// Jobs in submission order
    jobs: Vec<Job>,
    /// Cancellation flags for live jobs
    cancel_flags: HashMap<String, CancelFlag>,
}

impl QueueState {
    fn find(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    fn find_mut(&mut self, job_id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }
}

/// The job queue service
pub struct JobQueue {
    log: JobLog,
    state: Mutex<QueueState>,
    work_available: Notify,
}

impl JobQueue {
    /// Open the queue, replaying the log (crash recovery included).
    ///
    /// # Errors
    ///
    /// Returns `Io` when the log cannot be read.
    pub fn open(log: JobLog) -> Result<Self> {
        let jobs = log.replay()?;
        let mut state = QueueState::default();
        for job in &jobs {
            if !job.status.is_terminal() {
                state
                    .cancel_flags
                    .insert(job.job_id.clone(), Arc::new(AtomicBool::new(false)));
            }
        }
        state.jobs = jobs;

        let queue = Self {
            log,
            state: Mutex::new(state),
            work_available: Notify::new(),
        };
        Ok(queue)
    }

    /// Submit a request. Returns the existing job id when an identical job
    /// is still live (deduplication), a fresh pending job's id otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the submission record cannot be appended.
    pub async fn submit(&self, request: JobRequest) -> Result<String> {
        let job_id = request.job_id();
        let mut state = self.state.lock().await;

        if let Some(existing) = state.find(&job_id) {
            if !existing.status.is_terminal() {
                tracing::debug!(%job_id, "identical job already live, deduplicating");
                return Ok(job_id);
            }
            // Terminal history with the same id: drop it so the re-run
            // starts clean.
            state.jobs.retain(|j| j.job_id != job_id);
        }

        let job = Job::new(request);
        self.log.append(&JobRecord::from_job(&job, true))?;
        state
            .cancel_flags
            .insert(job_id.clone(), Arc::new(AtomicBool::new(false)));
        state.jobs.push(job);
        drop(state);

        self.work_available.notify_one();
        Ok(job_id)
    }

    /// Cancel a job. Pending jobs become `cancelled` immediately; running
    /// jobs get their flag raised (the worker honors it between stages).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids, `InvalidArgument` for jobs
    /// already terminal.
    pub async fn cancel(&self, job_id: &str) -> Result<JobStatus> {
        let mut state = self.state.lock().await;
        let Some(job) = state.find_mut(job_id) else {
            return Err(Error::not_found(format!("job {job_id}")));
        };

        match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Cancelled;
                job.finished_at = Some(chrono::Utc::now().timestamp());
                let record = JobRecord::from_job(job, false);
                self.log.append(&record)?;
                state.cancel_flags.remove(job_id);
                Ok(JobStatus::Cancelled)
            }
            JobStatus::Running => {
                if let Some(flag) = state.cancel_flags.get(job_id) {
                    flag.store(true, Ordering::SeqCst);
                }
                Ok(JobStatus::Running)
            }
            status => Err(Error::invalid_argument(format!(
                "job {job_id} is already {status}"
            ))),
        }
    }

    /// Look up one job
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.state.lock().await.find(job_id).cloned()
    }

    /// All jobs in submission order
    pub async fn list(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }

    /// Queue summary for health reporting
    pub async fn summary(&self) -> QueueSummary {
        let state = self.state.lock().await;
        let running = state.jobs.iter().find(|j| j.status == JobStatus::Running);
        QueueSummary {
            pending: state
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Pending)
                .count(),
            running_job_id: running.map(|j| j.job_id.clone()),
            running_progress: running.map(|j| j.progress),
        }
    }

    /// Worker side: claim the oldest pending job, marking it running.
    /// Returns the job plus its cancellation flag.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the transition record cannot be appended.
    pub async fn claim_next(&self) -> Result<Option<(Job, CancelFlag)>> {
        let mut state = self.state.lock().await;
        if state.jobs.iter().any(|j| j.status == JobStatus::Running) {
            // I5: at most one running job per backend.
            return Ok(None);
        }
        let Some(position) = state.jobs.iter().position(|j| j.status == JobStatus::Pending)
        else {
            return Ok(None);
        };

        let job = &mut state.jobs[position];
        job.status = JobStatus::Running;
        job.started_at = Some(chrono::Utc::now().timestamp());
        let record = JobRecord::from_job(job, false);
        let claimed = job.clone();
        self.log.append(&record)?;

        let flag = state
            .cancel_flags
            .entry(claimed.job_id.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        Ok(Some((claimed, flag)))
    }

    /// Worker side: record progress at a stage boundary
    pub async fn update_progress(&self, job_id: &str, progress: f32) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.find_mut(job_id) {
            job.progress = progress.clamp(0.0, 1.0);
            let record = JobRecord::from_job(job, false);
            drop(state);
            if let Err(e) = self.log.append(&record) {
                tracing::warn!(%job_id, error = %e, "failed to log progress");
            }
        }
    }

    /// Worker side: move a running job to a terminal state
    ///
    /// # Errors
    ///
    /// Returns `Io` when the transition record cannot be appended.
    pub async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<()> {
        debug_assert!(status.is_terminal());
        let mut state = self.state.lock().await;
        let Some(job) = state.find_mut(job_id) else {
            return Err(Error::not_found(format!("job {job_id}")));
        };
        job.status = status;
        job.error = error;
        job.finished_at = Some(chrono::Utc::now().timestamp());
        if status == JobStatus::Done {
            job.progress = 1.0;
        }
        let record = JobRecord::from_job(job, false);
        state.cancel_flags.remove(job_id);
        self.log.append(&record)?;
        drop(state);

        // More pending work may be waiting behind the finished job.
        self.work_available.notify_one();
        Ok(())
    }

    /// Worker side: wait until submit/finish signals possible work
    pub async fn wait_for_work(&self) {
        self.work_available.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_in(dir: &std::path::Path) -> JobQueue {
        JobQueue::open(JobLog::at(dir.join("queue.log"))).expect("open")
    }

    #[tokio::test]
    async fn identical_live_jobs_deduplicate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = queue_in(dir.path());

        let first = queue.submit(JobRequest::new("/tmp/docs")).await.expect("submit");
        let second = queue.submit(JobRequest::new("/tmp/docs")).await.expect("submit");
        assert_eq!(first, second);
        assert_eq!(queue.list().await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_jobs_do_not_deduplicate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = queue_in(dir.path());

        let id = queue.submit(JobRequest::new("/tmp/docs")).await.expect("submit");
        let (job, _) = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(job.job_id, id);
        queue.finish(&id, JobStatus::Done, None).await.expect("finish");

        let re_submitted = queue.submit(JobRequest::new("/tmp/docs")).await.expect("submit");
        assert_eq!(re_submitted, id);
        let job = queue.get(&id).await.expect("job");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn claim_is_fifo_and_single_runner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = queue_in(dir.path());

        let a = queue.submit(JobRequest::new("/tmp/a")).await.expect("submit");
        let b = queue.submit(JobRequest::new("/tmp/b")).await.expect("submit");

        let (first, _) = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(first.job_id, a);
        // I5: nothing else can run while `a` is running.
        assert!(queue.claim_next().await.expect("claim").is_none());

        queue.finish(&a, JobStatus::Done, None).await.expect("finish");
        let (second, _) = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(second.job_id, b);
    }

    #[tokio::test]
    async fn cancel_pending_is_immediate_and_running_is_cooperative() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = queue_in(dir.path());

        let a = queue.submit(JobRequest::new("/tmp/a")).await.expect("submit");
        let b = queue.submit(JobRequest::new("/tmp/b")).await.expect("submit");

        let (running, flag) = queue.claim_next().await.expect("claim").expect("job");
        assert_eq!(running.job_id, a);

        // Pending cancel flips immediately.
        assert_eq!(queue.cancel(&b).await.expect("cancel"), JobStatus::Cancelled);
        // Running cancel raises the cooperative flag.
        assert_eq!(queue.cancel(&a).await.expect("cancel"), JobStatus::Running);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn queue_state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let queue = queue_in(dir.path());
            let id = queue.submit(JobRequest::new("/tmp/a")).await.expect("submit");
            queue.claim_next().await.expect("claim").expect("job");
            id
        };

        // Reopen simulates a crash while running: the job must be failed.
        let queue = queue_in(dir.path());
        let job = queue.get(&id).await.expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some(ab_domain::constants::jobs::CRASH_FAILURE_REASON)
        );
    }

    #[tokio::test]
    async fn unknown_job_operations_are_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = queue_in(dir.path());
        assert!(matches!(
            queue.cancel("missing").await,
            Err(Error::NotFound { .. })
        ));
        assert!(queue.get("missing").await.is_none());
    }
}
