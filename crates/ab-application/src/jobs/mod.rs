//! Job queue: persistent log, deduplicated submission, single worker

/// Append-only transition log
pub mod log;
/// Queue service
pub mod queue;
/// Worker loop
pub mod worker;

pub use log::{JobLog, JobRecord};
pub use queue::{CancelFlag, JobQueue, QueueSummary};
pub use worker::spawn_worker;
