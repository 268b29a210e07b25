//! Singleton instance lock
//!
//! Advisory exclusive OS lock on `agent-brain.lock`, released by process
//! termination, normal or not. The separate `agent-brain.pid` file exists
//! for diagnostics and fast-path stale detection; the lock file itself is
//! never truncated before the lock is held, so a racing starter cannot wipe
//! the running owner's state.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use fs2::FileExt;

use ab_domain::error::{Error, Result};

use crate::paths::StatePaths;

/// Held exclusive lock for one instance. Dropping the guard releases the
/// OS lock and removes the pid file.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    pid_path: PathBuf,
}

impl InstanceLock {
    /// Try to acquire the lock, non-blocking. `Conflict` means another
    /// process holds it.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the lock is already held, `Io` on filesystem
    /// failures.
    pub fn acquire(paths: &StatePaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.state_dir)?;

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(paths.lock_file())?;
        file.try_lock_exclusive()
            .map_err(|_| Error::conflict("another instance holds the lock"))?;

        // Record the holder pid now that the lock is ours.
        let pid_path = paths.pid_file();
        let mut pid_file = File::create(&pid_path)?;
        writeln!(pid_file, "{}", std::process::id())?;

        Ok(Self { file, pid_path })
    }

    /// Release the lock and remove the pid file (also happens on drop)
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.pid_path);
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Read the recorded holder pid, if the pid file exists and parses
#[must_use]
pub fn read_pid_file(paths: &StatePaths) -> Option<u32> {
    let content = std::fs::read_to_string(paths.pid_file()).ok()?;
    content.trim().parse().ok()
}

/// Non-signaling liveness probe for a pid
#[must_use]
pub fn is_pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_pid_and_release_removes_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());

        let lock = InstanceLock::acquire(&paths).expect("acquire");
        assert_eq!(read_pid_file(&paths), Some(std::process::id()));

        lock.release();
        assert_eq!(read_pid_file(&paths), None);
        // Lock file itself survives release; only the lock is dropped.
        assert!(paths.lock_file().exists());
    }

    #[test]
    fn second_acquisition_in_process_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());

        let _held = InstanceLock::acquire(&paths).expect("acquire");
        let second = InstanceLock::acquire(&paths);
        assert!(matches!(second, Err(Error::Conflict { .. })));
    }

    #[test]
    fn reacquire_after_release_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::for_project(dir.path());

        InstanceLock::acquire(&paths).expect("first").release();
        let again = InstanceLock::acquire(&paths);
        assert!(again.is_ok());
    }

    #[test]
    fn own_pid_is_alive_and_bogus_pid_is_not() {
        assert!(is_pid_alive(std::process::id()));
        // Pid from far outside any plausible range.
        assert!(!is_pid_alive(u32::MAX - 1));
    }
}
