//! Document entity
//!
//! The atomic indexable unit produced by the chunker. A document's identity
//! is its `chunk_id`, content-addressed over source path, chunk index, and
//! normalized text, so re-chunking identical input yields identical ids.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::value_objects::{Embedding, Language};

/// Classification of a document's origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Prose documentation (markdown, restructured text, plain text)
    Doc,
    /// Production source code
    Code,
    /// Test source code
    Test,
}

impl SourceType {
    /// The string representation of this source type
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Code => "code",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "doc" => Ok(Self::Doc),
            "code" => Ok(Self::Code),
            "test" => Ok(Self::Test),
            other => Err(Error::invalid_argument(format!(
                "Unknown source type '{other}' (expected doc, code, or test)"
            ))),
        }
    }
}

/// Kind of the symbol a code chunk centers on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// File- or module-level chunk
    Module,
    /// Class, struct, interface, or trait definition
    Class,
    /// Free function
    Function,
    /// Class-scoped function
    Method,
}

impl SymbolKind {
    /// The string representation of this symbol kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The atomic indexable unit, addressed by a stable content hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable content-addressed identifier
    pub chunk_id: String,
    /// Chunk text
    pub text: String,
    /// Path of the file this chunk came from (relative to the indexed folder)
    pub source_path: String,
    /// Origin classification
    pub source_type: SourceType,
    /// Language tag, for code chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Name of the symbol this chunk centers on, for code chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_name: Option<String>,
    /// Kind of that symbol, for code chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<SymbolKind>,
    /// First line of the chunk in the source file (1-indexed), for code chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    /// Last line of the chunk in the source file (1-indexed), for code chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    /// `" > "`-joined ancestor headings, for prose chunks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_path: Option<String>,
    /// Zero-based position of this chunk within its file
    pub chunk_index: usize,
    /// Number of chunks produced from the file
    pub total_chunks: usize,
    /// Opaque short key/value metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Optional natural-language description of the chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Document {
    /// Compute the stable chunk id for a chunk's identity triple.
    ///
    /// Text is normalized (CRLF → LF, trailing whitespace stripped per line)
    /// before hashing, so cosmetic whitespace differences do not change ids.
    #[must_use]
    pub fn compute_chunk_id(source_path: &str, chunk_index: usize, text: &str) -> String {
        let normalized = normalize_for_hash(text);
        let mut hasher = Sha256::new();
        hasher.update(source_path.as_bytes());
        hasher.update(b":");
        hasher.update(chunk_index.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    /// Minimal document for tests and fixtures
    #[must_use]
    pub fn test_fixture(chunk_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            chunk_id: chunk_id.into(),
            text,
            source_path: "fixture.md".to_owned(),
            source_type: SourceType::Doc,
            language: None,
            symbol_name: None,
            symbol_kind: None,
            start_line: None,
            end_line: None,
            heading_path: None,
            chunk_index: 0,
            total_chunks: 1,
            metadata: BTreeMap::new(),
            summary: None,
        }
    }
}

/// A document paired with its embedding, ready for upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    /// The document
    pub document: Document,
    /// Its embedding
    pub embedding: Embedding,
}

fn normalize_for_hash(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let a = Document::compute_chunk_id("src/lib.rs", 0, "fn main() {}\n");
        let b = Document::compute_chunk_id("src/lib.rs", 0, "fn main() {}\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn chunk_id_ignores_line_ending_style() {
        let unix = Document::compute_chunk_id("a.md", 1, "hello\nworld");
        let dos = Document::compute_chunk_id("a.md", 1, "hello\r\nworld");
        let trailing = Document::compute_chunk_id("a.md", 1, "hello  \nworld");
        assert_eq!(unix, dos);
        assert_eq!(unix, trailing);
    }

    #[test]
    fn chunk_id_varies_with_identity_parts() {
        let base = Document::compute_chunk_id("a.md", 0, "text");
        assert_ne!(base, Document::compute_chunk_id("b.md", 0, "text"));
        assert_ne!(base, Document::compute_chunk_id("a.md", 1, "text"));
        assert_ne!(base, Document::compute_chunk_id("a.md", 0, "other"));
    }
}
