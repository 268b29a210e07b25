//! Supported programming languages
//!
//! Closed set of language tags the chunker and the search filters agree on.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Supported programming languages with compile-time safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python programming language
    Python,
    /// TypeScript (including TSX)
    TypeScript,
    /// JavaScript (including JSX)
    JavaScript,
    /// Java programming language
    Java,
    /// Kotlin programming language
    Kotlin,
    /// Go programming language
    Go,
    /// Rust programming language
    Rust,
    /// C programming language
    C,
    /// C++ programming language
    Cpp,
    /// Swift programming language
    Swift,
    /// C# programming language
    CSharp,
}

impl Language {
    /// Get language from file extension (without the dot)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" | "pyw" => Some(Self::Python),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "java" => Some(Self::Java),
            "kt" | "kts" => Some(Self::Kotlin),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Some(Self::Cpp),
            "swift" => Some(Self::Swift),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }

    /// Get language from a file path's extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// The string representation of this language
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Swift => "swift",
            Self::CSharp => "csharp",
        }
    }

    /// All supported languages
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Python,
            Self::TypeScript,
            Self::JavaScript,
            Self::Java,
            Self::Kotlin,
            Self::Go,
            Self::Rust,
            Self::C,
            Self::Cpp,
            Self::Swift,
            Self::CSharp,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "javascript" | "js" => Ok(Self::JavaScript),
            "java" => Ok(Self::Java),
            "kotlin" | "kt" => Ok(Self::Kotlin),
            "go" | "golang" => Ok(Self::Go),
            "rust" | "rs" => Ok(Self::Rust),
            "c" => Ok(Self::C),
            "cpp" | "c++" | "cxx" => Ok(Self::Cpp),
            "swift" => Ok(Self::Swift),
            "csharp" | "c#" | "cs" => Ok(Self::CSharp),
            other => Err(Error::invalid_argument(format!(
                "Unsupported language: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rs", Some(Language::Rust))]
    #[case("tsx", Some(Language::TypeScript))]
    #[case("hpp", Some(Language::Cpp))]
    #[case("kts", Some(Language::Kotlin))]
    #[case("rb", None)]
    fn extension_mapping(#[case] ext: &str, #[case] expected: Option<Language>) {
        assert_eq!(Language::from_extension(ext), expected);
    }

    #[test]
    fn round_trips_through_display_and_from_str() {
        for lang in Language::all() {
            let parsed: Language = lang.as_str().parse().expect("parse display form");
            assert_eq!(parsed, *lang);
        }
    }
}
