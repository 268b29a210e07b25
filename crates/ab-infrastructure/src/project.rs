//! Project root resolution
//!
//! Canonicalizes a start path to the unique project root. Resolution order,
//! first match wins:
//!
//! 1. Outermost enclosing version-control root (git, 5 s timeout; failure
//!    or timeout counts as absence)
//! 2. Nearest ancestor containing a `.claude/` directory
//! 3. Nearest ancestor containing a build-manifest marker
//! 4. The start path itself
//!
//! Every returned path is absolute and symlink-resolved, so any two calls
//! from inside the same project agree on the root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ab_domain::error::{Error, Result};

const VCS_TIMEOUT: Duration = Duration::from_secs(5);

/// Build-manifest markers recognized by resolution step 3
const MANIFEST_MARKERS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
];

/// Resolve the canonical project root for `start_path`.
///
/// # Errors
///
/// Returns `NotFound` when `start_path` does not exist.
pub async fn resolve_project_root(start_path: &Path) -> Result<PathBuf> {
    let start = canonicalize_dir(start_path)?;

    if let Some(root) = outermost_vcs_root(&start).await {
        return canonicalize_dir(&root);
    }
    if let Some(root) = nearest_ancestor_with(&start, |dir| dir.join(".claude").is_dir()) {
        return Ok(root);
    }
    if let Some(root) = nearest_ancestor_with(&start, |dir| {
        MANIFEST_MARKERS.iter().any(|m| dir.join(m).is_file())
    }) {
        return Ok(root);
    }
    Ok(start)
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(path)
        .map_err(|_| Error::not_found(format!("path {}", path.display())))?;
    Ok(if canonical.is_dir() {
        canonical
    } else {
        canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(canonical)
    })
}

fn nearest_ancestor_with(start: &Path, predicate: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| predicate(dir))
        .map(Path::to_path_buf)
}

/// The outermost enclosing VCS root: re-probe from each discovered root's
/// parent until the VCS reports no enclosing repository.
async fn outermost_vcs_root(start: &Path) -> Option<PathBuf> {
    let mut outermost = vcs_root_for(start).await?;
    while let Some(parent) = outermost.parent().map(Path::to_path_buf) {
        match vcs_root_for(&parent).await {
            Some(enclosing) if enclosing != outermost => outermost = enclosing,
            _ => break,
        }
    }
    Some(outermost)
}

async fn vcs_root_for(dir: &Path) -> Option<PathBuf> {
    let command = tokio::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--show-toplevel"])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(VCS_TIMEOUT, command).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(_) => return None,
        Err(_) => {
            tracing::warn!(dir = %dir.display(), "git root probe timed out, treating as absent");
            return None;
        }
    };

    let root = String::from_utf8(output.stdout).ok()?;
    let root = root.trim();
    (!root.is_empty()).then(|| PathBuf::from(root))
}
