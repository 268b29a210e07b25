//! Chunker implementations
//!
//! Code goes through the tree-sitter chunker, prose through the structural
//! splitter. The ingestion pipeline routes files here by classification.

/// AST-aware code chunker
pub mod code;
/// Per-language grammar tables
pub mod languages;
/// Structured prose chunker
pub mod text;

pub use code::CodeChunker;
pub use text::TextChunker;
