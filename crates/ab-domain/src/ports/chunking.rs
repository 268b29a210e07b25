//! Chunker port

use crate::entities::Document;
use crate::error::Result;

/// Splits one file's content into indexable documents.
///
/// Chunking is CPU-bound and synchronous; callers on the async scheduler
/// run it on a blocking worker thread. Given the same input bytes and
/// settings, chunk ids and boundaries match byte-for-byte.
pub trait DocumentChunker: Send + Sync {
    /// Chunk `content` read from `source_path`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for content the chunker cannot process at
    /// all (fallback splitting handles merely-invalid syntax).
    fn chunk(&self, content: &str, source_path: &str) -> Result<Vec<Document>>;

    /// Name of this chunker, for warnings and diagnostics
    fn chunker_name(&self) -> &str;
}
