//! Ingestion job entity
//!
//! Jobs are identified by a content hash over their request, which is what
//! makes submission deduplication work: an identical request maps to the
//! identical id while an earlier identical job is still live.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Parameters of an ingestion job, hashed into its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Folder to ingest
    pub folder_path: String,
    /// Whether code files are ingested (false = docs only)
    pub include_code: bool,
    /// Language tags to restrict code ingestion to (empty = all supported)
    pub languages: Vec<String>,
    /// Glob patterns excluded from discovery
    pub exclude_patterns: Vec<String>,
    /// Re-embed and re-upsert even if content appears unchanged
    pub rebuild: bool,
    /// Clear and re-extract the graph index
    pub rebuild_graph: bool,
}

impl JobRequest {
    /// Create a request for a folder with defaults
    #[must_use]
    pub fn new(folder_path: impl Into<String>) -> Self {
        Self {
            folder_path: folder_path.into(),
            include_code: false,
            languages: Vec::new(),
            exclude_patterns: Vec::new(),
            rebuild: false,
            rebuild_graph: false,
        }
    }

    /// Deterministic job id: hash of the canonicalized request.
    ///
    /// Languages and exclude patterns are sorted before hashing so that
    /// argument order does not produce distinct ids.
    #[must_use]
    pub fn job_id(&self) -> String {
        let mut languages = self.languages.clone();
        languages.sort();
        let mut excludes = self.exclude_patterns.clone();
        excludes.sort();

        let canonical = format!(
            "{}|code={}|langs={}|excl={}|rebuild={}|rebuild_graph={}",
            self.folder_path,
            self.include_code,
            languages.join(","),
            excludes.join(","),
            self.rebuild,
            self.rebuild_graph,
        );
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue
    Pending,
    /// Currently executing (at most one per backend)
    Running,
    /// Completed successfully
    Done,
    /// Terminated with an error
    Failed,
    /// Cancelled before or during execution
    Cancelled,
}

impl JobStatus {
    /// Returns `true` if the job is in a terminal state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// The string representation of this status
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Deterministic identifier (hash of the request)
    pub job_id: String,
    /// The request this job executes
    pub request: JobRequest,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Error message, set when `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Progress fraction in `[0, 1]`, updated at stage boundaries
    pub progress: f32,
    /// When the job was submitted (Unix epoch seconds)
    pub created_at: i64,
    /// When the job started running (Unix epoch seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// When the job reached a terminal state (Unix epoch seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
}

impl Job {
    /// Create a new pending job from a request
    #[must_use]
    pub fn new(request: JobRequest) -> Self {
        Self {
            job_id: request.job_id(),
            request,
            status: JobStatus::Pending,
            error: None,
            progress: 0.0,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_order_insensitive() {
        let mut a = JobRequest::new("/tmp/docs");
        a.languages = vec!["rust".to_owned(), "python".to_owned()];
        a.exclude_patterns = vec!["*.lock".to_owned(), "target/**".to_owned()];

        let mut b = a.clone();
        b.languages.reverse();
        b.exclude_patterns.reverse();

        assert_eq!(a.job_id(), b.job_id());
    }

    #[test]
    fn job_id_depends_on_every_flag() {
        let base = JobRequest::new("/tmp/docs");
        let mut with_code = base.clone();
        with_code.include_code = true;
        let mut with_rebuild = base.clone();
        with_rebuild.rebuild = true;

        assert_ne!(base.job_id(), with_code.job_id());
        assert_ne!(base.job_id(), with_rebuild.job_id());
        assert_ne!(with_code.job_id(), with_rebuild.job_id());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
