//! Rendezvous file handling and stale-state recovery
//!
//! `runtime.json` is written only after the listener answers health probes,
//! and read back only after schema and liveness checks pass. Recovery runs
//! before every lock acquisition so a crashed owner never wedges the
//! project.

use std::path::Path;
use std::time::Duration;

use ab_domain::entities::RuntimeState;
use ab_domain::error::{Error, Result};

use crate::lock::{is_pid_alive, read_pid_file};
use crate::paths::StatePaths;

/// Probe timeout used by readers before trusting a rendezvous descriptor
pub const READER_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long recovery waits for a shut-down instance to die
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Write the rendezvous descriptor atomically (temp + rename)
///
/// # Errors
///
/// Returns `Io` on write failure or `Json` on serialization failure.
pub fn write_runtime(paths: &StatePaths, state: &RuntimeState) -> Result<()> {
    let path = paths.runtime_file();
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Read the rendezvous descriptor without any liveness validation.
/// Returns `None` when the file is absent, unparsable, or has an
/// unsupported schema version.
#[must_use]
pub fn read_runtime(paths: &StatePaths) -> Option<RuntimeState> {
    read_runtime_at(&paths.runtime_file())
}

/// As [`read_runtime`], from an explicit file path
#[must_use]
pub fn read_runtime_at(path: &Path) -> Option<RuntimeState> {
    let bytes = std::fs::read(path).ok()?;
    let state: RuntimeState = serde_json::from_slice(&bytes).ok()?;
    if !state.schema_supported() {
        tracing::warn!(
            schema_version = state.schema_version,
            "ignoring rendezvous with unsupported schema version"
        );
        return None;
    }
    Some(state)
}

/// Probe an instance's health endpoint
pub async fn probe_health(base_url: &str, timeout: Duration) -> bool {
    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };
    match client.get(format!("{base_url}/health")).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// Read the rendezvous and validate it per I6: the descriptor is only
/// returned when its pid is alive and its health endpoint answers within
/// [`READER_PROBE_TIMEOUT`].
pub async fn discover_live_instance(paths: &StatePaths) -> Option<RuntimeState> {
    let state = read_runtime(paths)?;
    if !is_pid_alive(state.pid) {
        return None;
    }
    probe_health(&state.base_url, READER_PROBE_TIMEOUT)
        .await
        .then_some(state)
}

/// Stale recovery protocol, run before lock acquisition.
///
/// Liveness is decided by the lock itself: any real owner (running or
/// still starting up) holds it, so a briefly-acquirable lock means the
/// recorded state is leftovers from a dead process and gets deleted. A
/// held lock with a published-but-unhealthy runtime gets an HTTP shutdown
/// request and one grace period; if the owner hangs on, recovery leaves it
/// alone and the caller's acquisition fails with `Conflict` ("another
/// instance is starting"). A held lock with a healthy runtime, or with no
/// runtime yet (a racing starter), is never touched.
///
/// # Errors
///
/// Returns `Io` when stale artifacts cannot be removed.
pub async fn recover_stale(paths: &StatePaths) -> Result<()> {
    if !paths.pid_file().exists() && !paths.runtime_file().exists() {
        return Ok(());
    }

    if !lock_is_held(paths)? {
        // No live owner: whatever state is on disk is stale.
        let pid = read_pid_file(paths);
        tracing::warn!(?pid, "no live lock holder, cleaning stale state");
        remove_artifacts(paths)?;
        return Ok(());
    }

    // Lock held by a live process. Only a published-but-unreachable
    // instance warrants interference.
    let Some(state) = read_runtime(paths) else {
        return Ok(());
    };
    if probe_health(&state.base_url, READER_PROBE_TIMEOUT).await {
        return Ok(());
    }

    tracing::warn!(
        pid = state.pid,
        base_url = %state.base_url,
        "live instance is unreachable, requesting graceful shutdown"
    );
    if let Ok(client) = reqwest::Client::builder()
        .timeout(READER_PROBE_TIMEOUT)
        .build()
    {
        let _ = client
            .post(format!("{}/shutdown", state.base_url))
            .send()
            .await;
    }

    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while tokio::time::Instant::now() < deadline {
        if !lock_is_held(paths)? {
            remove_artifacts(paths)?;
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    tracing::warn!(pid = state.pid, "instance did not exit in time, leaving it to conflict");
    Ok(())
}

/// Probe whether the advisory lock currently has a holder. The probe lock
/// is released immediately; a missing lock file means no holder.
fn lock_is_held(paths: &StatePaths) -> Result<bool> {
    use fs2::FileExt;

    let file = match std::fs::OpenOptions::new()
        .write(true)
        .truncate(false)
        .open(paths.lock_file())
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = fs2::FileExt::unlock(&file);
            Ok(false)
        }
        Err(_) => Ok(true),
    }
}

fn remove_artifacts(paths: &StatePaths) -> Result<()> {
    for path in [paths.runtime_file(), paths.pid_file(), paths.lock_file()] {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::from(e)),
        }
    }
    Ok(())
}

/// Wait for a freshly bound listener to answer health probes
///
/// # Errors
///
/// Returns `Timeout` when the endpoint does not become healthy in time.
pub async fn wait_healthy(base_url: &str, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if probe_health(base_url, Duration::from_millis(500)).await {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(Error::timeout(format!("waiting for {base_url}/health")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_domain::entities::{InstanceMode, RUNTIME_SCHEMA_VERSION};

    fn fixture_state(pid: u32) -> RuntimeState {
        RuntimeState {
            schema_version: RUNTIME_SCHEMA_VERSION,
            mode: InstanceMode::Project,
            project_root: std::path::PathBuf::from("/tmp/repo"),
            instance_id: "test-instance".to_owned(),
            base_url: "http://127.0.0.1:9".to_owned(),
            bind_host: "127.0.0.1".to_owned(),
            port: 9,
            pid,
            started_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn runtime_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("dirs");

        let state = fixture_state(1234);
        write_runtime(&paths, &state).expect("write");
        let loaded = read_runtime(&paths).expect("read");
        assert_eq!(loaded.instance_id, "test-instance");
        assert_eq!(loaded.port, 9);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("dirs");

        let mut state = fixture_state(1234);
        state.schema_version = 99;
        std::fs::write(
            paths.runtime_file(),
            serde_json::to_vec(&state).expect("json"),
        )
        .expect("write");
        assert!(read_runtime(&paths).is_none());
    }

    #[tokio::test]
    async fn dead_pid_is_cleaned_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("dirs");

        // A pid nobody can be running under, plus leftover artifacts.
        std::fs::write(paths.pid_file(), format!("{}\n", u32::MAX - 1)).expect("pid");
        std::fs::write(paths.lock_file(), "").expect("lock");
        write_runtime(&paths, &fixture_state(u32::MAX - 1)).expect("runtime");

        recover_stale(&paths).await.expect("recover");
        assert!(!paths.pid_file().exists());
        assert!(!paths.lock_file().exists());
        assert!(!paths.runtime_file().exists());
    }

    #[tokio::test]
    async fn no_pid_file_is_a_clean_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("dirs");
        recover_stale(&paths).await.expect("recover");
    }

    #[tokio::test]
    async fn discovery_rejects_dead_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());
        paths.ensure_dirs().expect("dirs");
        write_runtime(&paths, &fixture_state(u32::MAX - 1)).expect("runtime");

        assert!(discover_live_instance(&paths).await.is_none());
    }
}
