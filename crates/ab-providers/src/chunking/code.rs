//! AST-aware code chunker
//!
//! Chunks center on top-level or class-scoped callables and on class
//! definitions, found by walking the tree-sitter parse tree with the
//! language's kind tables. Class chunks cover the definition header up to
//! the first member callable, so method bodies are not duplicated. Imports
//! are attached to the file's first chunk. Files that fail to parse fall
//! back to a line-window splitter and surface a warning.

use std::collections::BTreeMap;

use tree_sitter::{Node, Parser};

use ab_domain::constants::chunking::{
    CODE_MAX_CHUNK_CHARS, CODE_OVERLAP_LINES, CODE_TARGET_LINES,
};
use ab_domain::entities::{Document, SourceType, SymbolKind};
use ab_domain::error::{Error, Result};
use ab_domain::ports::DocumentChunker;
use ab_domain::value_objects::Language;

use super::languages::{LanguageSpec, grammar, spec_for};

/// Language-aware code chunker
pub struct CodeChunker {
    language: Language,
}

#[derive(Debug)]
struct Symbol {
    kind: SymbolKind,
    name: String,
    start_line: usize,
    end_line: usize,
    text: String,
    parent: Option<String>,
    extends: Vec<String>,
}

impl CodeChunker {
    /// Create a chunker for one language
    #[must_use]
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn parse_symbols(
        &self,
        content: &str,
        source_path: &str,
    ) -> Option<(Vec<Symbol>, Vec<String>, Vec<String>)> {
        let spec = spec_for(self.language);
        let mut parser = Parser::new();
        parser.set_language(&grammar(self.language)).ok()?;
        let tree = parser.parse(content, None)?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::warn!(
                path = source_path,
                language = %self.language,
                "syntax errors in source file, falling back to line-based chunking"
            );
            return None;
        }

        let mut symbols = Vec::new();
        let mut import_texts = Vec::new();
        let mut import_targets = Vec::new();
        walk(
            root,
            content,
            spec,
            None,
            &mut symbols,
            &mut import_texts,
            &mut import_targets,
        );

        if symbols.is_empty() {
            return None;
        }
        symbols.sort_by_key(|s| s.start_line);
        Some((symbols, import_texts, import_targets))
    }

    fn documents_from_symbols(
        &self,
        symbols: Vec<Symbol>,
        import_texts: &[String],
        import_targets: Vec<String>,
        source_path: &str,
    ) -> Vec<Document> {
        let total = symbols.len();
        symbols
            .into_iter()
            .enumerate()
            .map(|(index, symbol)| {
                let mut text = truncate_at_line_boundary(&symbol.text, CODE_MAX_CHUNK_CHARS);
                let mut metadata = BTreeMap::new();

                if index == 0 && !import_texts.is_empty() {
                    text = format!("{}\n\n{text}", import_texts.join("\n"));
                    metadata.insert(
                        "imports".to_owned(),
                        serde_json::Value::from(import_targets.clone()),
                    );
                }
                if !symbol.extends.is_empty() {
                    metadata.insert(
                        "extends".to_owned(),
                        serde_json::Value::from(symbol.extends.clone()),
                    );
                }
                if let Some(parent) = &symbol.parent {
                    metadata.insert("parent".to_owned(), serde_json::Value::from(parent.clone()));
                }

                Document {
                    chunk_id: Document::compute_chunk_id(source_path, index, &text),
                    text,
                    source_path: source_path.to_owned(),
                    source_type: SourceType::Code,
                    language: Some(self.language),
                    symbol_name: Some(symbol.name),
                    symbol_kind: Some(symbol.kind),
                    start_line: Some(symbol.start_line),
                    end_line: Some(symbol.end_line),
                    heading_path: None,
                    chunk_index: index,
                    total_chunks: total,
                    metadata,
                    summary: None,
                }
            })
            .collect()
    }

    fn fallback_documents(&self, content: &str, source_path: &str) -> Vec<Document> {
        split_line_windows(content)
            .into_iter()
            .enumerate()
            .map(|(index, window)| {
                let mut metadata = BTreeMap::new();
                metadata.insert("fallback".to_owned(), serde_json::Value::from(true));
                Document {
                    chunk_id: Document::compute_chunk_id(source_path, index, &window.text),
                    text: window.text,
                    source_path: source_path.to_owned(),
                    source_type: SourceType::Code,
                    language: Some(self.language),
                    symbol_name: None,
                    symbol_kind: Some(SymbolKind::Module),
                    start_line: Some(window.start_line),
                    end_line: Some(window.end_line),
                    heading_path: None,
                    chunk_index: index,
                    total_chunks: 0, // patched below
                    metadata,
                    summary: None,
                }
            })
            .collect()
    }
}

impl DocumentChunker for CodeChunker {
    fn chunk(&self, content: &str, source_path: &str) -> Result<Vec<Document>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let documents = match self.parse_symbols(content, source_path) {
            Some((symbols, import_texts, import_targets)) => {
                self.documents_from_symbols(symbols, &import_texts, import_targets, source_path)
            }
            None => {
                let mut docs = self.fallback_documents(content, source_path);
                let total = docs.len();
                for doc in &mut docs {
                    doc.total_chunks = total;
                }
                docs
            }
        };

        if documents.is_empty() {
            return Err(Error::invalid_argument(format!(
                "no chunkable content in {source_path}"
            )));
        }
        Ok(documents)
    }

    fn chunker_name(&self) -> &str {
        "code"
    }
}

/// A fallback line window
struct LineWindow {
    text: String,
    start_line: usize,
    end_line: usize,
}

fn split_line_windows(content: &str) -> Vec<LineWindow> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let step = CODE_TARGET_LINES.saturating_sub(CODE_OVERLAP_LINES).max(1);
    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + CODE_TARGET_LINES).min(lines.len());
        let text = truncate_at_line_boundary(&lines[start..end].join("\n"), CODE_MAX_CHUNK_CHARS);
        windows.push(LineWindow {
            text,
            start_line: start + 1,
            end_line: end,
        });
        if end == lines.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Cut `text` at the last line boundary that keeps it within `max_chars`.
/// A single oversized line is truncated mid-line as a last resort.
fn truncate_at_line_boundary(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_owned();
    }
    let mut kept = 0usize;
    let mut out = String::new();
    for line in text.lines() {
        let cost = line.len() + usize::from(!out.is_empty());
        if kept + cost > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        kept += cost;
    }
    if out.is_empty() {
        let boundary = text
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        out = text[..boundary].to_owned();
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn walk(
    node: Node<'_>,
    src: &str,
    spec: &LanguageSpec,
    parent_class: Option<&str>,
    symbols: &mut Vec<Symbol>,
    import_texts: &mut Vec<String>,
    import_targets: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();

        if spec.import_kinds.contains(&kind) {
            if let Some(text) = node_text(child, src) {
                if let Some(target) = import_target(&text) {
                    import_targets.push(target);
                }
                import_texts.push(text);
            }
            continue;
        }

        if spec.class_kinds.contains(&kind) {
            let name = symbol_name(child, src).unwrap_or_else(|| "anonymous".to_owned());
            let extends = extends_names(child, src, spec);
            push_class_header(child, src, spec, &name, extends, symbols);
            walk(
                child,
                src,
                spec,
                Some(name.as_str()),
                symbols,
                import_texts,
                import_targets,
            );
            continue;
        }

        if spec.callable_kinds.contains(&kind) {
            let name = symbol_name(child, src).unwrap_or_else(|| "anonymous".to_owned());
            if let Some(text) = node_text(child, src) {
                symbols.push(Symbol {
                    kind: if parent_class.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    },
                    name,
                    start_line: child.start_position().row + 1,
                    end_line: child.end_position().row + 1,
                    text,
                    parent: parent_class.map(str::to_owned),
                    extends: Vec::new(),
                });
            }
            // Nested callables fold into their enclosing chunk.
            continue;
        }

        walk(
            child,
            src,
            spec,
            parent_class,
            symbols,
            import_texts,
            import_targets,
        );
    }
}

/// Emit the class-definition chunk: the header region up to the first
/// member callable, so member bodies live in their own chunks only.
fn push_class_header(
    class_node: Node<'_>,
    src: &str,
    spec: &LanguageSpec,
    name: &str,
    extends: Vec<String>,
    symbols: &mut Vec<Symbol>,
) {
    let start_byte = class_node.start_byte();
    let mut end_byte = class_node.end_byte();
    let mut end_line = class_node.end_position().row + 1;

    if let Some(first_callable) = first_descendant_of_kinds(class_node, spec.callable_kinds) {
        if first_callable.start_byte() > start_byte {
            end_byte = first_callable.start_byte();
            end_line = first_callable.start_position().row.max(1);
        }
    }

    let text = src
        .get(start_byte..end_byte)
        .map(|t| t.trim_end().to_owned())
        .unwrap_or_default();
    if text.is_empty() {
        return;
    }
    symbols.push(Symbol {
        kind: SymbolKind::Class,
        name: name.to_owned(),
        start_line: class_node.start_position().row + 1,
        end_line,
        text,
        parent: None,
        extends,
    });
}

fn node_text(node: Node<'_>, src: &str) -> Option<String> {
    node.utf8_text(src.as_bytes()).ok().map(str::to_owned)
}

/// Resolve the name of a definition node: the `name` field when the grammar
/// has one, otherwise the declarator chain (C-family), otherwise the first
/// identifier-like descendant (Rust `impl`, Go `type` blocks).
fn symbol_name(node: Node<'_>, src: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return node_text(name, src);
    }
    if let Some(declarator) = node.child_by_field_name("declarator") {
        if let Some(found) = first_identifier(declarator, src) {
            return Some(found);
        }
    }
    if let Some(ty) = node.child_by_field_name("type") {
        if let Some(found) = first_identifier(ty, src) {
            return Some(found);
        }
    }
    first_identifier(node, src)
}

fn first_identifier(node: Node<'_>, src: &str) -> Option<String> {
    if node.kind().ends_with("identifier") {
        return node_text(node, src);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_identifier(child, src) {
            return Some(found);
        }
    }
    None
}

fn first_descendant_of_kinds<'tree>(node: Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
    drop(cursor);
    for child in children {
        if kinds.contains(&child.kind()) {
            return Some(child);
        }
        if let Some(found) = first_descendant_of_kinds(child, kinds) {
            return Some(found);
        }
    }
    None
}

/// Names of parent classes/interfaces from the inheritance clause nodes
fn extends_names(class_node: Node<'_>, src: &str, spec: &LanguageSpec) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = class_node.walk();
    for child in class_node.named_children(&mut cursor) {
        if spec.extends_kinds.contains(&child.kind()) {
            collect_type_identifiers(child, src, &mut names);
        }
    }
    names.dedup();
    names
}

fn collect_type_identifiers(node: Node<'_>, src: &str, out: &mut Vec<String>) {
    let kind = node.kind();
    if kind.ends_with("identifier") || kind == "dotted_name" || kind == "user_type" {
        if let Some(text) = node_text(node, src) {
            if !out.contains(&text) {
                out.push(text);
            }
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_type_identifiers(child, src, out);
    }
}

/// Best-effort module/file target of an import statement's text
fn import_target(text: &str) -> Option<String> {
    // Quoted sources first (JS/TS/Go/C includes).
    for quote in ['"', '\'', '<'] {
        if let Some(start) = text.find(quote) {
            let close = match quote {
                '<' => '>',
                q => q,
            };
            if let Some(len) = text[start + 1..].find(close) {
                let target = &text[start + 1..start + 1 + len];
                if !target.is_empty() {
                    return Some(target.to_owned());
                }
            }
        }
    }

    // Keyword-prefixed forms: `from x import y`, `import x`, `use a::b`,
    // `using A.B;`, `package x`.
    let mut tokens = text.split_whitespace();
    let keyword = tokens.next()?;
    let target = match keyword {
        "from" => tokens.next(),
        "import" | "use" | "using" | "package" => tokens.next(),
        "#include" => tokens.next(),
        _ => None,
    }?;
    let target = target
        .trim_end_matches(';')
        .split("::")
        .next()
        .unwrap_or(target);
    (!target.is_empty()).then(|| target.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUST_SAMPLE: &str = r#"use std::collections::HashMap;

pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }
}

fn helper() -> usize {
    42
}
"#;

    #[test]
    fn rust_symbols_are_extracted() {
        let chunker = CodeChunker::new(Language::Rust);
        let docs = chunker.chunk(RUST_SAMPLE, "src/config.rs").expect("chunk");

        let names: Vec<&str> = docs
            .iter()
            .filter_map(|d| d.symbol_name.as_deref())
            .collect();
        assert!(names.contains(&"Config"));
        assert!(names.contains(&"get"));
        assert!(names.contains(&"insert"));
        assert!(names.contains(&"helper"));

        let get = docs
            .iter()
            .find(|d| d.symbol_name.as_deref() == Some("get"))
            .expect("get chunk");
        assert_eq!(get.symbol_kind, Some(SymbolKind::Method));
        assert_eq!(get.metadata.get("parent"), Some(&serde_json::json!("Config")));

        let helper = docs
            .iter()
            .find(|d| d.symbol_name.as_deref() == Some("helper"))
            .expect("helper chunk");
        assert_eq!(helper.symbol_kind, Some(SymbolKind::Function));
    }

    #[test]
    fn imports_attach_to_first_chunk() {
        let chunker = CodeChunker::new(Language::Rust);
        let docs = chunker.chunk(RUST_SAMPLE, "src/config.rs").expect("chunk");
        assert!(docs[0].text.contains("use std::collections::HashMap;"));
        assert_eq!(
            docs[0].metadata.get("imports"),
            Some(&serde_json::json!(["std"]))
        );
        // Only the first chunk carries the imports block.
        assert!(!docs[1].text.contains("use std::collections::HashMap;"));
    }

    #[test]
    fn python_extends_is_recorded() {
        let source = "class Base:\n    pass\n\nclass Child(Base):\n    def run(self):\n        return 1\n";
        let chunker = CodeChunker::new(Language::Python);
        let docs = chunker.chunk(source, "pkg/models.py").expect("chunk");

        let child = docs
            .iter()
            .find(|d| d.symbol_name.as_deref() == Some("Child"))
            .expect("Child chunk");
        assert_eq!(child.symbol_kind, Some(SymbolKind::Class));
        assert_eq!(
            child.metadata.get("extends"),
            Some(&serde_json::json!(["Base"]))
        );
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = CodeChunker::new(Language::Rust);
        let a = chunker.chunk(RUST_SAMPLE, "src/config.rs").expect("chunk");
        let b = chunker.chunk(RUST_SAMPLE, "src/config.rs").expect("chunk");
        let ids_a: Vec<&str> = a.iter().map(|d| d.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|d| d.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn invalid_syntax_falls_back_to_line_windows() {
        let broken = "fn broken( {{{ this is not rust at all }}}\n".repeat(30);
        let chunker = CodeChunker::new(Language::Rust);
        let docs = chunker.chunk(&broken, "src/broken.rs").expect("chunk");
        assert!(!docs.is_empty());
        assert!(docs.iter().all(|d| d.metadata.get("fallback").is_some()));
    }

    #[test]
    fn chunks_respect_hard_char_cap() {
        let long_fn = format!(
            "fn big() {{\n{}}}\n",
            "    let x = \"padding line to inflate the function body\";\n".repeat(100)
        );
        let chunker = CodeChunker::new(Language::Rust);
        let docs = chunker.chunk(&long_fn, "src/big.rs").expect("chunk");
        assert!(docs.iter().all(|d| d.text.len() <= CODE_MAX_CHUNK_CHARS));
    }

    #[test]
    fn import_target_extraction() {
        assert_eq!(
            import_target("import { x } from 'react'"),
            Some("react".to_owned())
        );
        assert_eq!(import_target("#include <stdio.h>"), Some("stdio.h".to_owned()));
        assert_eq!(
            import_target("use std::collections::HashMap;"),
            Some("std".to_owned())
        );
        assert_eq!(import_target("from os import path"), Some("os".to_owned()));
    }
}
