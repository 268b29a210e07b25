//! Chunking constants

/// Target size of a prose chunk, in approximate tokens
pub const DOC_TARGET_TOKENS: usize = 512;
/// Overlap carried between adjacent prose chunks, in approximate tokens
pub const DOC_OVERLAP_TOKENS: usize = 50;
/// Minimum prose chunk size; smaller fragments are merged forward
pub const DOC_MIN_TOKENS: usize = 64;

/// Target size of a code chunk, in lines
pub const CODE_TARGET_LINES: usize = 50;
/// Overlap carried between adjacent fallback code chunks, in lines
pub const CODE_OVERLAP_LINES: usize = 20;
/// Hard cap on a code chunk's size, in characters
pub const CODE_MAX_CHUNK_CHARS: usize = 2000;
