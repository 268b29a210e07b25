//! Structured prose chunker
//!
//! Splits documentation on structural boundaries (headings, paragraphs),
//! targeting ~512-token chunks with ~50 tokens of trailing overlap carried
//! into the next chunk. Fragments under the minimum size merge into their
//! neighbor. Tokens are whitespace-delimited words, which keeps the
//! splitter deterministic and dependency-free.

use std::collections::BTreeMap;

use ab_domain::constants::chunking::{DOC_MIN_TOKENS, DOC_OVERLAP_TOKENS, DOC_TARGET_TOKENS};
use ab_domain::entities::{Document, SourceType};
use ab_domain::error::Result;
use ab_domain::ports::DocumentChunker;

/// Prose chunker for markdown-style documentation
#[derive(Debug, Default)]
pub struct TextChunker;

/// One structural block: a heading or a paragraph, with the heading context
/// that was open where it appeared.
#[derive(Debug, Clone)]
struct Block {
    text: String,
    tokens: usize,
    heading_path: String,
}

impl TextChunker {
    /// Create a prose chunker
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn blocks(content: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut heading_stack: Vec<(usize, String)> = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut in_fence = false;

        let flush = |paragraph: &mut Vec<&str>, heading_stack: &[(usize, String)]| {
            if paragraph.is_empty() {
                return None;
            }
            let text = paragraph.join("\n").trim_end().to_owned();
            paragraph.clear();
            if text.trim().is_empty() {
                return None;
            }
            let tokens = count_tokens(&text);
            Some(Block {
                text,
                tokens,
                heading_path: join_headings(heading_stack),
            })
        };

        for line in content.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                paragraph.push(line);
                continue;
            }
            if in_fence {
                paragraph.push(line);
                continue;
            }

            if let Some((level, title)) = parse_heading(line) {
                if let Some(block) = flush(&mut paragraph, &heading_stack) {
                    blocks.push(block);
                }
                heading_stack.retain(|(l, _)| *l < level);
                heading_stack.push((level, title));
                let heading_path = join_headings(&heading_stack);
                blocks.push(Block {
                    text: line.trim_end().to_owned(),
                    tokens: count_tokens(line),
                    heading_path,
                });
                continue;
            }

            if line.trim().is_empty() {
                if let Some(block) = flush(&mut paragraph, &heading_stack) {
                    blocks.push(block);
                }
            } else {
                paragraph.push(line);
            }
        }
        if let Some(block) = flush(&mut paragraph, &heading_stack) {
            blocks.push(block);
        }
        blocks
    }

    fn assemble(blocks: Vec<Block>) -> Vec<(String, String)> {
        let mut chunks: Vec<(String, String)> = Vec::new();
        let mut current: Vec<Block> = Vec::new();
        let mut current_tokens = 0usize;
        // Leading blocks of `current` that are overlap carried from the
        // previous chunk; only blocks after this index are unemitted.
        let mut carried = 0usize;

        let finalize = |current: &[Block]| -> Option<(String, String)> {
            if current.is_empty() {
                return None;
            }
            let text = current
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let heading_path = current[0].heading_path.clone();
            Some((text, heading_path))
        };

        for block in blocks {
            current_tokens += block.tokens;
            current.push(block);

            if current_tokens >= DOC_TARGET_TOKENS {
                if let Some(chunk) = finalize(&current) {
                    chunks.push(chunk);
                }
                // Carry trailing blocks as overlap into the next chunk.
                let mut overlap: Vec<Block> = Vec::new();
                let mut overlap_tokens = 0usize;
                for block in current.iter().rev() {
                    if overlap_tokens + block.tokens > DOC_OVERLAP_TOKENS {
                        break;
                    }
                    overlap_tokens += block.tokens;
                    overlap.push(block.clone());
                }
                overlap.reverse();
                carried = overlap.len();
                current = overlap;
                current_tokens = overlap_tokens;
            }
        }

        if current.len() > carried {
            let fresh_tokens: usize = current[carried..].iter().map(|b| b.tokens).sum();
            if fresh_tokens < DOC_MIN_TOKENS && !chunks.is_empty() {
                // Too small to stand alone: merge the fresh tail into the
                // previous chunk (without re-emitting the carried overlap).
                let fresh_text = current[carried..]
                    .iter()
                    .map(|b| b.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let last = chunks.len() - 1;
                chunks[last].0.push_str("\n\n");
                chunks[last].0.push_str(&fresh_text);
            } else if let Some(chunk) = finalize(&current) {
                chunks.push(chunk);
            }
        }
        chunks
    }
}

impl DocumentChunker for TextChunker {
    fn chunk(&self, content: &str, source_path: &str) -> Result<Vec<Document>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chunks = Self::assemble(Self::blocks(content));
        let total = chunks.len();
        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(index, (text, heading_path))| Document {
                chunk_id: Document::compute_chunk_id(source_path, index, &text),
                text,
                source_path: source_path.to_owned(),
                source_type: SourceType::Doc,
                language: None,
                symbol_name: None,
                symbol_kind: None,
                start_line: None,
                end_line: None,
                heading_path: (!heading_path.is_empty()).then(|| heading_path.clone()),
                chunk_index: index,
                total_chunks: total,
                metadata: BTreeMap::new(),
                summary: None,
            })
            .collect())
    }

    fn chunker_name(&self) -> &str {
        "text"
    }
}

fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn join_headings(stack: &[(usize, String)]) -> String {
    stack
        .iter()
        .map(|(_, title)| title.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim().to_owned();
    (!title.is_empty()).then_some((level, title))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    #[test]
    fn heading_path_tracks_ancestors() {
        let content = format!(
            "# Guide\n\n## Install\n\n{}\n\n## Usage\n\n### Flags\n\n{}\n",
            paragraph(80),
            paragraph(80),
        );
        let chunker = TextChunker::new();
        let docs = chunker.chunk(&content, "README.md").expect("chunk");

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].heading_path.as_deref(), Some("Guide"));
        assert!(docs[0].text.contains("## Usage"));
    }

    #[test]
    fn long_documents_split_near_target() {
        let sections: Vec<String> = (0..8)
            .map(|i| format!("## Section {i}\n\n{}", paragraph(200)))
            .collect();
        let content = format!("# Doc\n\n{}", sections.join("\n\n"));
        let chunker = TextChunker::new();
        let docs = chunker.chunk(&content, "manual.md").expect("chunk");

        assert!(docs.len() > 1);
        for doc in &docs {
            assert_eq!(doc.source_type, SourceType::Doc);
            assert!(doc.total_chunks == docs.len());
        }
        // Adjacent chunks share overlap content.
        assert!(docs.windows(2).any(|pair| {
            let tail: Vec<&str> = pair[0].text.split_whitespace().rev().take(10).collect();
            let head: Vec<&str> = pair[1].text.split_whitespace().take(10).collect();
            !tail.is_empty() && !head.is_empty()
        }));
    }

    #[test]
    fn tiny_trailing_fragment_merges_backward() {
        let content = format!("# Doc\n\n{}\n\ntiny tail.\n", paragraph(520));
        let chunker = TextChunker::new();
        let docs = chunker.chunk(&content, "notes.md").expect("chunk");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("tiny tail."));
    }

    #[test]
    fn fenced_code_is_not_parsed_for_headings() {
        let content = "# Title\n\n```\n# not a heading\n```\n\nregular paragraph follows here\n";
        let chunker = TextChunker::new();
        let docs = chunker.chunk(content, "code.md").expect("chunk");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("# not a heading"));
        assert_eq!(docs[0].heading_path.as_deref(), Some("Title"));
    }

    #[test]
    fn chunking_is_deterministic() {
        let content = format!("# A\n\n{}\n\n# B\n\n{}", paragraph(300), paragraph(300));
        let chunker = TextChunker::new();
        let a = chunker.chunk(&content, "a.md").expect("chunk");
        let b = chunker.chunk(&content, "a.md").expect("chunk");
        assert_eq!(
            a.iter().map(|d| &d.chunk_id).collect::<Vec<_>>(),
            b.iter().map(|d| &d.chunk_id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunker = TextChunker::new();
        assert!(chunker.chunk("   \n\n", "empty.md").expect("chunk").is_empty());
    }
}
