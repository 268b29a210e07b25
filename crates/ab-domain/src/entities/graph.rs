//! Knowledge graph entities
//!
//! Entities and directed labeled triples extracted from indexed chunks.
//! Two entities with the same (normalized name, type) are the same entity;
//! every triple carries provenance to the chunk it was extracted from.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Type of a graph entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Function or free-standing callable
    Function,
    /// Class, struct, interface, or trait
    Class,
    /// Module or file
    Module,
    /// Abstract concept extracted from prose
    Concept,
    /// Variable or constant
    Variable,
}

impl EntityType {
    /// The string representation of this entity type
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Module => "module",
            Self::Concept => "concept",
            Self::Variable => "variable",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "function" => Ok(Self::Function),
            "class" => Ok(Self::Class),
            "module" => Ok(Self::Module),
            "concept" => Ok(Self::Concept),
            "variable" => Ok(Self::Variable),
            other => Err(Error::invalid_argument(format!(
                "Unknown entity type '{other}'"
            ))),
        }
    }
}

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier: `<type>:<normalized name>`
    pub entity_id: String,
    /// Display name as extracted
    pub name: String,
    /// Entity classification
    pub entity_type: EntityType,
}

impl Entity {
    /// Create an entity, deriving its stable id from (normalized name, type)
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        let name = name.into();
        let entity_id = Self::id_for(&name, entity_type);
        Self {
            entity_id,
            name,
            entity_type,
        }
    }

    /// The stable id two equal entities share
    #[must_use]
    pub fn id_for(name: &str, entity_type: EntityType) -> String {
        format!("{}:{}", entity_type.as_str(), normalize_entity_name(name))
    }
}

/// Normalize an entity name for identity comparison: lowercase, interior
/// whitespace collapsed to single underscores.
#[must_use]
pub fn normalize_entity_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Edge label of a triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Module imports module
    Imports,
    /// Class contains method
    Contains,
    /// Class extends class
    Extends,
    /// Function calls function
    Calls,
    /// Symbol uses symbol
    Uses,
    /// Chunk references entity
    References,
    /// Symbol defined in file
    DefinedIn,
    /// Bounded vocabulary of LLM-extracted relations
    Extracted(String),
}

/// Relations an LLM extractor may emit beyond the structural set.
/// Out-of-vocabulary predicates are dropped at extraction time.
pub const EXTRACTED_PREDICATES: &[&str] = &[
    "implements",
    "depends_on",
    "part_of",
    "describes",
    "configures",
];

impl Predicate {
    /// Parse a predicate from extractor output. Structural predicates parse
    /// directly; anything else must be in [`EXTRACTED_PREDICATES`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace([' ', '-'], "_");
        match s.as_str() {
            "imports" => Some(Self::Imports),
            "contains" => Some(Self::Contains),
            "extends" => Some(Self::Extends),
            "calls" => Some(Self::Calls),
            "uses" => Some(Self::Uses),
            "references" => Some(Self::References),
            "defined_in" => Some(Self::DefinedIn),
            other if EXTRACTED_PREDICATES.contains(&other) => {
                Some(Self::Extracted(other.to_owned()))
            }
            _ => None,
        }
    }

    /// The string representation of this predicate
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Imports => "imports",
            Self::Contains => "contains",
            Self::Extends => "extends",
            Self::Calls => "calls",
            Self::Uses => "uses",
            Self::References => "references",
            Self::DefinedIn => "defined_in",
            Self::Extracted(s) => s,
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed labeled edge with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity
    pub subject: Entity,
    /// Edge label
    pub predicate: Predicate,
    /// Object entity
    pub object: Entity,
    /// Chunk this triple was extracted from
    pub source_chunk_id: String,
}

impl Triple {
    /// Create a triple
    #[must_use]
    pub fn new(
        subject: Entity,
        predicate: Predicate,
        object: Entity,
        source_chunk_id: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
            source_chunk_id: source_chunk_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_identity_is_normalized() {
        let a = Entity::new("HttpServer", EntityType::Class);
        let b = Entity::new("  httpserver ", EntityType::Class);
        assert_eq!(a.entity_id, b.entity_id);

        let c = Entity::new("HttpServer", EntityType::Module);
        assert_ne!(a.entity_id, c.entity_id);
    }

    #[test]
    fn predicate_vocabulary_is_closed() {
        assert_eq!(Predicate::parse("extends"), Some(Predicate::Extends));
        assert_eq!(
            Predicate::parse("Depends On"),
            Some(Predicate::Extracted("depends_on".to_owned()))
        );
        assert_eq!(Predicate::parse("is_friends_with"), None);
    }
}
