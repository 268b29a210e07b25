//! Rendezvous descriptor
//!
//! `runtime.json` is the on-disk record that lets CLIs and editor plugins
//! discover a running instance. It is written only after the HTTP listener
//! is bound and answering health probes, and it is only trusted by readers
//! after its own schema/liveness checks pass.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Current rendezvous schema version
pub const RUNTIME_SCHEMA_VERSION: u32 = 1;

/// Instance scoping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceMode {
    /// One instance per project root
    #[default]
    Project,
    /// Shared daemon serving multiple projects
    Shared,
}

impl InstanceMode {
    /// The string representation of this mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Shared => "shared",
        }
    }
}

impl std::fmt::Display for InstanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "shared" => Ok(Self::Shared),
            other => Err(Error::invalid_argument(format!(
                "Unknown instance mode '{other}' (expected project or shared)"
            ))),
        }
    }
}

/// The rendezvous descriptor persisted at `runtime.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Descriptor schema version; readers reject unknown versions
    pub schema_version: u32,
    /// Instance scoping mode
    pub mode: InstanceMode,
    /// Absolute, symlink-resolved project root
    pub project_root: PathBuf,
    /// Random token identifying this process incarnation
    pub instance_id: String,
    /// Base URL of the HTTP surface, e.g. `http://127.0.0.1:49213`
    pub base_url: String,
    /// Host the listener is bound to
    pub bind_host: String,
    /// OS-assigned listening port
    pub port: u16,
    /// Process id of the owner
    pub pid: u32,
    /// Startup timestamp
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl RuntimeState {
    /// True when the descriptor's schema version is one this build understands
    #[must_use]
    pub fn schema_supported(&self) -> bool {
        self.schema_version == RUNTIME_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_fields() {
        let state = RuntimeState {
            schema_version: RUNTIME_SCHEMA_VERSION,
            mode: InstanceMode::Project,
            project_root: PathBuf::from("/tmp/repo"),
            instance_id: "abc123".to_owned(),
            base_url: "http://127.0.0.1:49213".to_owned(),
            bind_host: "127.0.0.1".to_owned(),
            port: 49213,
            pid: 4242,
            started_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["mode"], "project");
        assert_eq!(json["port"], 49213);
    }
}
