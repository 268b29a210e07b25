//! Atomic file persistence helpers
//!
//! Snapshots are written to a temp file in the target directory and renamed
//! into place, so readers never observe a partial write.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use ab_domain::error::Result;

/// Serialize `value` as JSON and atomically replace `path` with it.
///
/// # Errors
///
/// Returns `Io` on write/rename failure or `Json` on serialization failure.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a JSON snapshot, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns `Io` on read failure or `Json` when the snapshot is corrupt.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
