//! Job queue constants

/// Terminal jobs retained in the queue log after compaction
pub const RETAINED_TERMINAL_JOBS: usize = 500;

/// Log size (in records) that triggers compaction on startup replay
pub const JOB_LOG_COMPACT_THRESHOLD: usize = 5_000;

/// Failure reason recorded when replay finds a job that died with the process
pub const CRASH_FAILURE_REASON: &str = "process terminated";
