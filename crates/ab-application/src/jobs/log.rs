//! Append-only job transition log
//!
//! One self-contained JSON record per line at `jobs/queue.log`. Replay
//! folds the records into current job state; jobs found `running` with no
//! terminal record died with the process and are rewritten as `failed`.
//! Oversized logs are compacted on replay, keeping all live jobs and the
//! most recent terminal ones.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ab_domain::constants::jobs::{
    CRASH_FAILURE_REASON, JOB_LOG_COMPACT_THRESHOLD, RETAINED_TERMINAL_JOBS,
};
use ab_domain::entities::{Job, JobRequest, JobStatus};
use ab_domain::error::Result;

/// One transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job this record belongs to
    pub job_id: String,
    /// Status after this transition
    pub status: JobStatus,
    /// When the transition happened (Unix epoch seconds)
    pub timestamp: i64,
    /// Progress fraction after this transition
    pub progress: f32,
    /// The request, present on the submission record only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<JobRequest>,
    /// Error message on `failed` records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// Record for a job's current state
    #[must_use]
    pub fn from_job(job: &Job, include_request: bool) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            timestamp: chrono::Utc::now().timestamp(),
            progress: job.progress,
            request: include_request.then(|| job.request.clone()),
            error: job.error.clone(),
        }
    }
}

/// The on-disk log
#[derive(Debug, Clone)]
pub struct JobLog {
    path: PathBuf,
}

impl JobLog {
    /// Log at the given path (created on first append)
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record, flushed before returning
    ///
    /// # Errors
    ///
    /// Returns `Io` on write failure.
    pub fn append(&self, record: &JobRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Replay the log into current job state, in submission order.
    ///
    /// Jobs whose last record is `running` are rewritten as `failed` with
    /// reason "process terminated" (a crash interrupted them), and the
    /// failure records are appended so the log stays self-consistent.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the log cannot be read. Corrupt lines are skipped
    /// with a warning rather than poisoning the whole log.
    pub fn replay(&self) -> Result<Vec<Job>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut jobs: Vec<Job> = Vec::new();
        let mut record_count = 0usize;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: JobRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(line = line_no + 1, error = %e, "skipping corrupt job record");
                    continue;
                }
            };
            record_count += 1;
            apply(&mut jobs, record);
        }

        // Crash recovery: anything still running did not survive.
        for job in &mut jobs {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Failed;
                job.error = Some(CRASH_FAILURE_REASON.to_owned());
                job.finished_at = Some(chrono::Utc::now().timestamp());
                self.append(&JobRecord::from_job(job, false))?;
            }
        }

        if record_count > JOB_LOG_COMPACT_THRESHOLD {
            self.compact(&jobs)?;
        }
        Ok(jobs)
    }

    /// Rewrite the log from current state, bounding retained terminal jobs
    fn compact(&self, jobs: &[Job]) -> Result<()> {
        let terminal: Vec<&Job> = jobs.iter().filter(|j| j.status.is_terminal()).collect();
        let drop_terminal = terminal.len().saturating_sub(RETAINED_TERMINAL_JOBS);
        let dropped: std::collections::HashSet<&str> = terminal
            .iter()
            .take(drop_terminal)
            .map(|j| j.job_id.as_str())
            .collect();

        let tmp = self.path.with_extension("log.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            for job in jobs {
                if dropped.contains(job.job_id.as_str()) {
                    continue;
                }
                let mut line = serde_json::to_vec(&JobRecord::from_job(job, true))?;
                line.push(b'\n');
                file.write_all(&line)?;
            }
            file.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(dropped = drop_terminal, "job log compacted");
        Ok(())
    }
}

fn apply(jobs: &mut Vec<Job>, record: JobRecord) {
    if let Some(job) = jobs.iter_mut().find(|j| j.job_id == record.job_id) {
        job.status = record.status;
        job.progress = record.progress;
        if record.error.is_some() {
            job.error = record.error;
        }
        match record.status {
            JobStatus::Running => job.started_at = Some(record.timestamp),
            status if status.is_terminal() => job.finished_at = Some(record.timestamp),
            _ => {}
        }
        return;
    }

    // First sighting: reconstruct from the submission record.
    let Some(request) = record.request else {
        tracing::warn!(job_id = %record.job_id, "transition for unknown job, skipping");
        return;
    };
    let mut job = Job::new(request);
    job.job_id = record.job_id;
    job.status = record.status;
    job.progress = record.progress;
    job.error = record.error;
    job.created_at = record.timestamp;
    jobs.push(job);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_record(job_id: &str, folder: &str) -> JobRecord {
        let request = JobRequest::new(folder);
        JobRecord {
            job_id: job_id.to_owned(),
            status: JobStatus::Pending,
            timestamp: 1_700_000_000,
            progress: 0.0,
            request: Some(request),
            error: None,
        }
    }

    fn status_record(job_id: &str, status: JobStatus, progress: f32) -> JobRecord {
        JobRecord {
            job_id: job_id.to_owned(),
            status,
            timestamp: 1_700_000_100,
            progress,
            request: None,
            error: None,
        }
    }

    #[test]
    fn replay_reconstructs_submission_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = JobLog::at(dir.path().join("queue.log"));

        log.append(&pending_record("a", "/tmp/a")).expect("append");
        log.append(&pending_record("b", "/tmp/b")).expect("append");
        log.append(&status_record("a", JobStatus::Done, 1.0))
            .expect("append");

        let jobs = log.replay().expect("replay");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "a");
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(jobs[1].status, JobStatus::Pending);
    }

    #[test]
    fn running_jobs_fail_on_replay() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = JobLog::at(dir.path().join("queue.log"));

        log.append(&pending_record("crashed", "/tmp/x")).expect("append");
        log.append(&status_record("crashed", JobStatus::Running, 0.4))
            .expect("append");

        let jobs = log.replay().expect("replay");
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(jobs[0].error.as_deref(), Some(CRASH_FAILURE_REASON));

        // The rewrite is durable: a second replay sees the failure directly.
        let again = log.replay().expect("replay");
        assert_eq!(again[0].status, JobStatus::Failed);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.log");
        let log = JobLog::at(&path);
        log.append(&pending_record("ok", "/tmp/ok")).expect("append");
        std::fs::write(
            &path,
            format!(
                "{}not json at all\n",
                std::fs::read_to_string(&path).expect("read")
            ),
        )
        .expect("write");

        let jobs = log.replay().expect("replay");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "ok");
    }

    #[test]
    fn missing_log_is_empty() {
        let log = JobLog::at("/tmp/agent-brain-no-such-dir/queue.log");
        assert!(log.replay().expect("replay").is_empty());
    }
}
