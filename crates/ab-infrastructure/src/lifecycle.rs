//! Lifecycle controller
//!
//! Composes project-root resolution, state paths, stale recovery, and the
//! singleton lock into the startup sequence. The HTTP layer owns the
//! listener; this module owns everything around it:
//!
//! ```text
//! root ← resolve(start_path)
//! paths ← StatePaths(root); mkdirs
//! recover_stale(paths)
//! lock ← acquire(paths)            // Conflict → another starter won
//! ... caller binds port 0 and serves ...
//! publish(host, port)              // runtime.json + user registry entry
//! ... on shutdown: cleanup()       // remove runtime/pid, release lock
//! ```

use std::path::{Path, PathBuf};

use ab_domain::entities::{InstanceMode, RUNTIME_SCHEMA_VERSION, RuntimeState};
use ab_domain::error::Result;

use crate::lock::InstanceLock;
use crate::paths::StatePaths;
use crate::project::resolve_project_root;
use crate::registry::InstanceRegistry;
use crate::rendezvous::{recover_stale, write_runtime};

/// Acquired startup state: the lock is held from construction until
/// [`StartupContext::cleanup`] (or drop).
pub struct StartupContext {
    /// Canonical project root
    pub project_root: PathBuf,
    /// State directory paths
    pub paths: StatePaths,
    /// Instance scoping mode
    pub mode: InstanceMode,
    /// This incarnation's random token
    pub instance_id: String,
    lock: Option<InstanceLock>,
    registry: Option<InstanceRegistry>,
}

impl StartupContext {
    /// Run the pre-listener startup sequence: resolve the root, create the
    /// state directory, recover stale state, and take the lock.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when another live instance (or a racing starter)
    /// holds the lock, `NotFound` for a bad start path, `Io` on filesystem
    /// failures.
    pub async fn acquire(start_path: &Path, mode: InstanceMode) -> Result<Self> {
        let project_root = resolve_project_root(start_path).await?;
        let paths = StatePaths::for_project(&project_root);
        paths.ensure_dirs()?;

        recover_stale(&paths).await?;
        let lock = InstanceLock::acquire(&paths)?;

        tracing::info!(
            project_root = %project_root.display(),
            %mode,
            "startup lock acquired"
        );
        Ok(Self {
            project_root,
            paths,
            mode,
            instance_id: uuid::Uuid::new_v4().simple().to_string(),
            lock: Some(lock),
            registry: InstanceRegistry::user_default(),
        })
    }

    /// Use an explicit instance registry (tests, shared-daemon setups)
    #[must_use]
    pub fn with_registry(mut self, registry: InstanceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Publish the rendezvous after the listener is bound and healthy.
    /// Writes `runtime.json` atomically and registers the instance in the
    /// user-level registry.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Json` when the descriptor cannot be written.
    pub fn publish(&self, bind_host: &str, port: u16) -> Result<RuntimeState> {
        let state = RuntimeState {
            schema_version: RUNTIME_SCHEMA_VERSION,
            mode: self.mode,
            project_root: self.project_root.clone(),
            instance_id: self.instance_id.clone(),
            base_url: format!("http://{bind_host}:{port}"),
            bind_host: bind_host.to_owned(),
            port,
            pid: std::process::id(),
            started_at: chrono::Utc::now(),
        };
        write_runtime(&self.paths, &state)?;
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.register(&state) {
                tracing::warn!(error = %e, "failed to write user-level registry entry");
            }
        }
        tracing::info!(base_url = %state.base_url, "rendezvous published");
        Ok(state)
    }

    /// Graceful-shutdown cleanup: remove the rendezvous and registry entry,
    /// then release the lock (removing the pid file).
    pub fn cleanup(&mut self) {
        let _ = std::fs::remove_file(self.paths.runtime_file());
        if let Some(registry) = &self.registry {
            registry.unregister(&self.project_root);
        }
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
        tracing::info!("instance state cleaned up");
    }
}

impl Drop for StartupContext {
    fn drop(&mut self) {
        // Abnormal exit paths still release the pid file; the OS lock dies
        // with the process regardless.
        if self.lock.is_some() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_domain::error::Error;

    #[tokio::test]
    async fn acquire_publish_cleanup_leaves_no_residue() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("proj");
        std::fs::create_dir_all(project.join(".claude")).expect("mkdir");
        let registry_dir = dir.path().join("registry");

        let mut ctx = StartupContext::acquire(&project, InstanceMode::Project)
            .await
            .expect("acquire")
            .with_registry(InstanceRegistry::at(&registry_dir));

        let state = ctx.publish("127.0.0.1", 45678).expect("publish");
        assert_eq!(state.schema_version, RUNTIME_SCHEMA_VERSION);
        assert_eq!(state.pid, std::process::id());
        assert!(ctx.paths.runtime_file().exists());
        assert_eq!(
            InstanceRegistry::at(&registry_dir)
                .list_live()
                .expect("list")
                .len(),
            1
        );

        ctx.cleanup();
        assert!(!ctx.paths.runtime_file().exists());
        assert!(!ctx.paths.pid_file().exists());
        assert!(
            InstanceRegistry::at(&registry_dir)
                .list_live()
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn second_acquire_conflicts_while_first_holds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("proj");
        std::fs::create_dir_all(project.join(".claude")).expect("mkdir");

        let _first = StartupContext::acquire(&project, InstanceMode::Project)
            .await
            .expect("acquire");
        let second = StartupContext::acquire(&project, InstanceMode::Project).await;
        assert!(matches!(second, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn acquire_recovers_from_a_dead_previous_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = dir.path().join("proj");
        std::fs::create_dir_all(project.join(".claude")).expect("mkdir");
        let paths = StatePaths::for_project(&std::fs::canonicalize(&project).expect("canon"));
        paths.ensure_dirs().expect("dirs");

        // Simulate a crashed owner: pid file for a dead process, lock file
        // present but unlocked (its holder is gone).
        std::fs::write(paths.pid_file(), format!("{}\n", u32::MAX - 1)).expect("pid");
        std::fs::write(paths.lock_file(), "").expect("lock");

        let ctx = StartupContext::acquire(&project, InstanceMode::Project).await;
        assert!(ctx.is_ok());
    }
}
