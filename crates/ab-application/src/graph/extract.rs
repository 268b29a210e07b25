//! Triple extraction
//!
//! Two sources feed the graph: deterministic rules over chunk metadata for
//! code, and a constrained LLM prompt for prose. Extraction failures never
//! fail the chunk's indexing; the chunk just contributes no triples.

use ab_domain::entities::{Document, Entity, EntityType, Predicate, SourceType, SymbolKind, Triple};
use ab_domain::error::Result;
use ab_domain::ports::Summarizer;

/// Deterministic triples from a code chunk's AST metadata:
/// `defined_in` for every named symbol, `contains` for class→method,
/// `extends` from inheritance clauses, `imports` from the file's imports.
#[must_use]
pub fn structural_triples(document: &Document) -> Vec<Triple> {
    if document.source_type == SourceType::Doc {
        return Vec::new();
    }

    let mut triples = Vec::new();
    let module = Entity::new(&document.source_path, EntityType::Module);

    if let (Some(name), Some(kind)) = (&document.symbol_name, document.symbol_kind) {
        let entity_type = match kind {
            SymbolKind::Class => EntityType::Class,
            SymbolKind::Function | SymbolKind::Method => EntityType::Function,
            SymbolKind::Module => EntityType::Module,
        };
        let symbol = Entity::new(name, entity_type);

        triples.push(Triple::new(
            symbol.clone(),
            Predicate::DefinedIn,
            module.clone(),
            &document.chunk_id,
        ));

        if let Some(parent) = document.metadata.get("parent").and_then(|v| v.as_str()) {
            triples.push(Triple::new(
                Entity::new(parent, EntityType::Class),
                Predicate::Contains,
                symbol.clone(),
                &document.chunk_id,
            ));
        }

        for parent in string_array(document, "extends") {
            triples.push(Triple::new(
                symbol.clone(),
                Predicate::Extends,
                Entity::new(parent, EntityType::Class),
                &document.chunk_id,
            ));
        }
    }

    for target in string_array(document, "imports") {
        triples.push(Triple::new(
            module.clone(),
            Predicate::Imports,
            Entity::new(target, EntityType::Module),
            &document.chunk_id,
        ));
    }

    triples
}

fn string_array<'a>(document: &'a Document, key: &str) -> Vec<&'a str> {
    document
        .metadata
        .get(key)
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

/// Extraction prompt for prose chunks. The predicate vocabulary is closed;
/// anything outside it is dropped at parse time.
fn extraction_prompt(text: &str, max_triplets: usize) -> String {
    format!(
        "Extract up to {max_triplets} knowledge triples from the text below.\n\
         Output one triple per line in the exact form: subject | predicate | object\n\
         Allowed predicates: imports, contains, extends, calls, uses, references, \
         defined_in, implements, depends_on, part_of, describes, configures.\n\
         Output nothing else.\n\n{text}"
    )
}

/// LLM-extracted triples for a prose chunk, bounded to `max_triplets`.
///
/// # Errors
///
/// Returns `ProviderUnavailable` when the provider fails after retries;
/// callers treat this as skip-and-warn, not as a chunk failure.
pub async fn llm_triples(
    summarizer: &dyn Summarizer,
    document: &Document,
    max_triplets: usize,
) -> Result<Vec<Triple>> {
    let response = summarizer
        .complete(&extraction_prompt(&document.text, max_triplets))
        .await?;
    Ok(parse_triples(&response, &document.chunk_id, max_triplets))
}

/// Parse `subject | predicate | object` lines, dropping malformed lines
/// and out-of-vocabulary predicates.
#[must_use]
pub fn parse_triples(response: &str, source_chunk_id: &str, max_triplets: usize) -> Vec<Triple> {
    response
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            let [subject, predicate, object] = parts.as_slice() else {
                return None;
            };
            if subject.is_empty() || object.is_empty() {
                return None;
            }
            let predicate = Predicate::parse(predicate)?;
            Some(Triple::new(
                Entity::new(*subject, EntityType::Concept),
                predicate,
                Entity::new(*object, EntityType::Concept),
                source_chunk_id,
            ))
        })
        .take(max_triplets)
        .collect()
}
