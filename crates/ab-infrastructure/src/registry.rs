//! User-level instance registry
//!
//! One descriptor file per running instance under the user data directory,
//! written at startup beside the project-local rendezvous and removed on
//! graceful shutdown. `ab list` walks this registry and prunes entries
//! whose recorded process is gone.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use ab_domain::entities::RuntimeState;
use ab_domain::error::Result;

use crate::lock::is_pid_alive;

/// Registry of running instances for this user
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    dir: PathBuf,
}

impl InstanceRegistry {
    /// Registry at the default user data location
    /// (`<data_dir>/agent-brain/instances/`)
    #[must_use]
    pub fn user_default() -> Option<Self> {
        dirs::data_dir().map(|dir| Self {
            dir: dir.join("agent-brain").join("instances"),
        })
    }

    /// Registry at an explicit directory (tests, shared-daemon setups)
    #[must_use]
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, project_root: &Path) -> PathBuf {
        let digest = Sha256::digest(project_root.to_string_lossy().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(&digest[..8])))
    }

    /// Record a running instance
    ///
    /// # Errors
    ///
    /// Returns `Io` on write failure or `Json` on serialization failure.
    pub fn register(&self, state: &RuntimeState) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(&state.project_root);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Remove an instance's entry; absent entries are a no-op
    pub fn unregister(&self, project_root: &Path) {
        let _ = std::fs::remove_file(self.entry_path(project_root));
    }

    /// All registered instances whose process is still alive. Entries for
    /// dead processes are pruned as a side effect.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the registry directory cannot be read (a missing
    /// directory is an empty registry).
    pub fn list_live(&self) -> Result<Vec<RuntimeState>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut live = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(state) = crate::rendezvous::read_runtime_at(&path) else {
                let _ = std::fs::remove_file(&path);
                continue;
            };
            if is_pid_alive(state.pid) {
                live.push(state);
            } else {
                let _ = std::fs::remove_file(&path);
            }
        }
        live.sort_by(|a, b| a.project_root.cmp(&b.project_root));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_domain::entities::{InstanceMode, RUNTIME_SCHEMA_VERSION};

    fn state_for(root: &str, pid: u32) -> RuntimeState {
        RuntimeState {
            schema_version: RUNTIME_SCHEMA_VERSION,
            mode: InstanceMode::Project,
            project_root: PathBuf::from(root),
            instance_id: format!("instance-{pid}"),
            base_url: "http://127.0.0.1:9".to_owned(),
            bind_host: "127.0.0.1".to_owned(),
            port: 9,
            pid,
            started_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn register_list_unregister_cycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = InstanceRegistry::at(dir.path());

        let state = state_for("/tmp/alpha", std::process::id());
        registry.register(&state).expect("register");

        let live = registry.list_live().expect("list");
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].project_root, PathBuf::from("/tmp/alpha"));

        registry.unregister(Path::new("/tmp/alpha"));
        assert!(registry.list_live().expect("list").is_empty());
    }

    #[test]
    fn dead_entries_are_pruned_on_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = InstanceRegistry::at(dir.path());

        registry
            .register(&state_for("/tmp/dead", u32::MAX - 1))
            .expect("register");
        assert!(registry.list_live().expect("list").is_empty());
        // The stale file is gone after pruning.
        assert_eq!(std::fs::read_dir(dir.path()).expect("read").count(), 0);
    }

    #[test]
    fn missing_registry_dir_is_empty() {
        let registry = InstanceRegistry::at("/tmp/agent-brain-does-not-exist-xyz");
        assert!(registry.list_live().expect("list").is_empty());
    }
}
