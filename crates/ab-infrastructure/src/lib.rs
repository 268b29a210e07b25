//! # Infrastructure Layer
//!
//! Everything around the request path: project-root resolution, state
//! directory layout, the singleton lock and rendezvous protocol, lifecycle
//! sequencing, layered configuration, logging, and the user-level instance
//! registry.

/// Layered configuration loading and validation
pub mod config;
/// Lifecycle controller composing resolution, recovery, lock, rendezvous
pub mod lifecycle;
/// Singleton instance lock and pid probing
pub mod lock;
/// Logging setup
pub mod logging;
/// State directory layout
pub mod paths;
/// Project root resolution
pub mod project;
/// User-level instance registry
pub mod registry;
/// Rendezvous file handling and stale recovery
pub mod rendezvous;

pub use config::{AppConfig, ConfigLoader};
pub use lifecycle::StartupContext;
pub use lock::InstanceLock;
pub use paths::StatePaths;
pub use project::resolve_project_root;
pub use registry::InstanceRegistry;
