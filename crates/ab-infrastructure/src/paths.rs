//! State directory layout
//!
//! Deterministic map from a project root to its state directory and every
//! sub-path the instance uses. Same project root, same paths, always.

use std::path::{Path, PathBuf};

use ab_domain::error::Result;

/// State directory name under the project's `.claude/` directory
pub const STATE_DIR_NAME: &str = "agent-brain";

/// All on-disk locations of one instance's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// `<project_root>/.claude/agent-brain/`
    pub state_dir: PathBuf,
}

impl StatePaths {
    /// Derive the paths for a project root (no directories are created)
    #[must_use]
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            state_dir: project_root.join(".claude").join(STATE_DIR_NAME),
        }
    }

    /// Create every directory the instance writes into. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Io` when a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.data_dir(),
            self.vectors_dir(),
            self.keyword_dir(),
            self.graph_dir(),
            self.jobs_dir(),
            self.logs_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// `data/` root for the storage backend
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.state_dir.join("data")
    }

    /// `data/vectors/`
    #[must_use]
    pub fn vectors_dir(&self) -> PathBuf {
        self.data_dir().join("vectors")
    }

    /// `data/keyword/`
    #[must_use]
    pub fn keyword_dir(&self) -> PathBuf {
        self.data_dir().join("keyword")
    }

    /// `data/graph/`
    #[must_use]
    pub fn graph_dir(&self) -> PathBuf {
        self.data_dir().join("graph")
    }

    /// `jobs/` directory holding the queue log
    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.state_dir.join("jobs")
    }

    /// Append-only job transition log
    #[must_use]
    pub fn jobs_log(&self) -> PathBuf {
        self.jobs_dir().join("queue.log")
    }

    /// Rendezvous descriptor
    #[must_use]
    pub fn runtime_file(&self) -> PathBuf {
        self.state_dir.join("runtime.json")
    }

    /// Advisory exclusive lock file
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("agent-brain.lock")
    }

    /// Diagnostic pid file beside the lock
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.state_dir.join("agent-brain.pid")
    }

    /// Project-level configuration file
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.state_dir.join("config.toml")
    }

    /// `logs/` directory for the rolling file appender
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_root_same_paths() {
        let a = StatePaths::for_project(Path::new("/tmp/repo"));
        let b = StatePaths::for_project(Path::new("/tmp/repo"));
        assert_eq!(a, b);
        assert_eq!(
            a.state_dir,
            PathBuf::from("/tmp/repo/.claude/agent-brain")
        );
        assert_eq!(a.jobs_log(), a.state_dir.join("jobs/queue.log"));
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("first");
        paths.ensure_dirs().expect("second");
        assert!(paths.vectors_dir().is_dir());
        assert!(paths.keyword_dir().is_dir());
        assert!(paths.graph_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
