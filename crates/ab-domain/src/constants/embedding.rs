//! Embedding provider constants

/// Default number of texts submitted per provider batch
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Maximum embed/summarize attempts per request
pub const PROVIDER_RETRY_MAX_ATTEMPTS: u32 = 3;
/// Base backoff delay in milliseconds (doubles per attempt: 1s, 2s, 4s)
pub const PROVIDER_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Per-request provider timeout in seconds
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;
