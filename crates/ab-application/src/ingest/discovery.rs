//! Ingestion file discovery
//!
//! Walks the requested folder, applies include/exclude rules, and
//! classifies every kept file as doc, code, or test. Output order is
//! sorted by relative path so repeated runs of the same job see the same
//! file list.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use ab_domain::entities::{JobRequest, SourceType};
use ab_domain::error::{Error, Result};
use ab_domain::value_objects::Language;

/// Documentation extensions classified as `doc`
const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt"];

/// Directories never worth walking into
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "venv",
    ".venv",
    "dist",
];

/// One file selected for ingestion
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the ingested folder (the document `source_path`)
    pub source_path: String,
    /// doc / code / test classification
    pub classification: SourceType,
    /// Language tag for code and test files
    pub language: Option<Language>,
}

/// Walk `folder` per the request's include/exclude rules.
///
/// # Errors
///
/// Returns `InvalidArgument` for a bad folder or malformed exclude
/// pattern, `Io` when the walk fails.
pub fn discover_files(folder: &Path, request: &JobRequest) -> Result<Vec<DiscoveredFile>> {
    if !folder.is_dir() {
        return Err(Error::invalid_argument(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    let excludes = build_globset(&request.exclude_patterns)?;
    let language_filter: Vec<Language> = request
        .languages
        .iter()
        .map(|s| Language::from_str(s))
        .collect::<Result<_>>()?;

    let mut files = Vec::new();
    let walker = WalkDir::new(folder).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| !should_skip_dir(e)) {
        let entry = entry.map_err(|e| Error::invalid_argument(format!("walk failed: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(folder)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if excludes.is_match(&rel) {
            continue;
        }

        let Some(classified) = classify(entry.path(), &rel) else {
            continue;
        };
        let (classification, language) = classified;

        if classification != SourceType::Doc {
            if !request.include_code {
                continue;
            }
            if !language_filter.is_empty() {
                match language {
                    Some(lang) if language_filter.contains(&lang) => {}
                    _ => continue,
                }
            }
        }

        files.push(DiscoveredFile {
            path: entry.path().to_path_buf(),
            source_path: rel,
            classification,
            language,
        });
    }

    files.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            Error::invalid_argument(format!("bad exclude pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::invalid_argument(format!("bad exclude patterns: {e}")))
}

fn should_skip_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    (name.starts_with('.') && name.len() > 1 && entry.depth() > 0)
        || SKIP_DIRS.contains(&name.as_ref())
}

fn classify(path: &Path, rel: &str) -> Option<(SourceType, Option<Language>)> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if DOC_EXTENSIONS.contains(&extension.as_str()) {
        return Some((SourceType::Doc, None));
    }
    let language = Language::from_extension(&extension)?;
    let classification = if is_test_path(rel) {
        SourceType::Test
    } else {
        SourceType::Code
    };
    Some((classification, Some(language)))
}

/// Common test-file conventions across the supported languages
#[must_use]
pub fn is_test_path(rel: &str) -> bool {
    let lower = rel.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);

    lower.starts_with("tests/")
        || lower.contains("/tests/")
        || lower.starts_with("test/")
        || lower.contains("/test/")
        || file_name.starts_with("test_")
        || file_name.contains("_test.")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "content\n").expect("write");
    }

    fn request(include_code: bool) -> JobRequest {
        let mut request = JobRequest::new("unused");
        request.include_code = include_code;
        request
    }

    #[test]
    fn docs_only_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("README.md"));
        touch(&dir.path().join("src/lib.rs"));

        let files = discover_files(dir.path(), &request(false)).expect("discover");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source_path, "README.md");
        assert_eq!(files[0].classification, SourceType::Doc);
    }

    #[test]
    fn code_included_and_tests_classified() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("src/lib.rs"));
        touch(&dir.path().join("tests/integration.rs"));
        touch(&dir.path().join("pkg/test_utils.py"));

        let files = discover_files(dir.path(), &request(true)).expect("discover");
        let by_path = |p: &str| {
            files
                .iter()
                .find(|f| f.source_path == p)
                .unwrap_or_else(|| panic!("missing {p}"))
                .clone()
        };
        assert_eq!(by_path("src/lib.rs").classification, SourceType::Code);
        assert_eq!(
            by_path("tests/integration.rs").classification,
            SourceType::Test
        );
        assert_eq!(by_path("pkg/test_utils.py").classification, SourceType::Test);
    }

    #[test]
    fn language_filter_restricts_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("a.rs"));
        touch(&dir.path().join("b.py"));

        let mut req = request(true);
        req.languages = vec!["rust".to_owned()];
        let files = discover_files(dir.path(), &req).expect("discover");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, Some(Language::Rust));
    }

    #[test]
    fn exclude_patterns_and_skip_dirs_apply() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("keep.md"));
        touch(&dir.path().join("drafts/skip.md"));
        touch(&dir.path().join("node_modules/pkg/readme.md"));
        touch(&dir.path().join(".git/internal.md"));

        let mut req = request(false);
        req.exclude_patterns = vec!["drafts/**".to_owned()];
        let files = discover_files(dir.path(), &req).expect("discover");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].source_path, "keep.md");
    }

    #[test]
    fn bad_exclude_pattern_is_invalid_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut req = request(false);
        req.exclude_patterns = vec!["[".to_owned()];
        assert!(matches!(
            discover_files(dir.path(), &req),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn output_is_sorted_for_determinism() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("b.md"));
        touch(&dir.path().join("a.md"));
        touch(&dir.path().join("c.md"));

        let files = discover_files(dir.path(), &request(false)).expect("discover");
        let paths: Vec<&str> = files.iter().map(|f| f.source_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md", "c.md"]);
    }
}
