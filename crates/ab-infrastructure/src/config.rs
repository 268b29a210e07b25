//! Configuration
//!
//! Layered figment loading with the precedence: CLI flag overrides (applied
//! by the caller after loading) > `AB_*` environment variables > project
//! config (`<state_dir>/config.toml`) > user config
//! (`~/.config/agent-brain/config.toml`) > compiled defaults. Validation
//! runs at load time and reports the offending key.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use ab_domain::error::{Error, Result};

use crate::paths::StatePaths;

/// Environment variable prefix; nesting via `__`
/// (e.g. `AB_SERVER__PORT=8080` sets `server.port`).
pub const ENV_PREFIX: &str = "AB_";

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage backend selection: `embedded` or `postgres`
    pub backend: String,
    /// PostgreSQL connection string (required for `backend = "postgres"`)
    pub database_url: Option<String>,
    /// Base connection pool size
    pub pool_size: u32,
    /// Connections allowed beyond the base pool
    pub pool_max_overflow: u32,
    /// HNSW `m` build parameter for the postgres vector index
    pub hnsw_m: u32,
    /// HNSW `ef_construction` build parameter for the postgres vector index
    pub hnsw_ef_construction: u32,
    /// Embedding provider section
    pub embedding: EmbeddingSettings,
    /// Summarization provider section
    pub summarization: SummarizationSettings,
    /// Graph index section
    pub graph: GraphSettings,
    /// Search fusion section
    pub search: SearchSettings,
    /// HTTP server section
    pub server: ServerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: "embedded".to_owned(),
            database_url: None,
            pool_size: 5,
            pool_max_overflow: 10,
            hnsw_m: 16,
            hnsw_ef_construction: 64,
            embedding: EmbeddingSettings::default(),
            summarization: SummarizationSettings::default(),
            graph: GraphSettings::default(),
            search: SearchSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name (`openai`, `ollama`, `hash`)
    pub provider: String,
    /// Model identifier (provider default when unset)
    pub model: Option<String>,
    /// Environment variable the API key is read from
    pub api_key_env: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Output dimensions override
    pub dimensions: Option<usize>,
    /// Texts per request batch
    pub batch_size: Option<usize>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            // Deterministic offline provider; cloud/local HTTP providers
            // are opt-in via configuration.
            provider: "hash".to_owned(),
            model: None,
            api_key_env: None,
            base_url: None,
            dimensions: None,
            batch_size: None,
        }
    }
}

/// Summarization provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationSettings {
    /// Provider name (`openai`, `ollama`, `hash`)
    pub provider: String,
    /// Model identifier (provider default when unset)
    pub model: Option<String>,
    /// Environment variable the API key is read from
    pub api_key_env: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
}

impl Default for SummarizationSettings {
    fn default() -> Self {
        Self {
            provider: "hash".to_owned(),
            model: None,
            api_key_env: None,
            base_url: None,
        }
    }
}

/// Graph index settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Whether the graph index is built and queryable
    pub enabled: bool,
    /// Store implementation (`simple`; `kuzu` is not available in this build)
    pub store: String,
    /// Cap on LLM-extracted triples per chunk
    pub max_triplets_per_chunk: usize,
    /// Default BFS depth for graph queries
    pub traversal_depth: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            store: "simple".to_owned(),
            max_triplets_per_chunk: ab_domain::constants::graph::DEFAULT_MAX_TRIPLETS_PER_CHUNK,
            traversal_depth: ab_domain::constants::graph::DEFAULT_TRAVERSAL_DEPTH,
        }
    }
}

/// Search fusion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Multi-mode fusion weight for the vector ranking
    pub multi_weight_vector: f32,
    /// Multi-mode fusion weight for the keyword ranking
    pub multi_weight_keyword: f32,
    /// Multi-mode fusion weight for the graph ranking
    pub multi_weight_graph: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            multi_weight_vector: ab_domain::constants::search::MULTI_WEIGHT_VECTOR,
            multi_weight_keyword: ab_domain::constants::search::MULTI_WEIGHT_KEYWORD,
            multi_weight_graph: ab_domain::constants::search::MULTI_WEIGHT_GRAPH,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind host
    pub host: String,
    /// Bind port; 0 lets the OS assign one
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 0,
        }
    }
}

/// Configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Explicit project config path (otherwise derived from state paths)
    project_config: Option<PathBuf>,
    /// Explicit user config path (otherwise `~/.config/agent-brain/config.toml`)
    user_config: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader for a project's state directory
    #[must_use]
    pub fn for_project(paths: &StatePaths) -> Self {
        Self {
            project_config: Some(paths.config_file()),
            user_config: None,
        }
    }

    /// Override the user config path (tests)
    #[must_use]
    pub fn with_user_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config = Some(path.into());
        self
    }

    /// Load and validate the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when a layer fails to parse and
    /// `ConfigInvalid` naming the key when validation rejects a value.
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(user) = self.user_config_path() {
            figment = figment.merge(Toml::file(user));
        }
        if let Some(project) = &self.project_config {
            figment = figment.merge(Toml::file(project));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| Error::configuration(format!("failed to load configuration: {e}")))?;
        validate(&config)?;
        Ok(config)
    }

    /// Write the default configuration to the project config path if the
    /// file does not exist yet (the `init` command).
    ///
    /// # Errors
    ///
    /// Returns `Io` on write failure.
    pub fn write_default_project_config(paths: &StatePaths) -> Result<PathBuf> {
        let path = paths.config_file();
        if !path.exists() {
            let rendered = toml::to_string_pretty(&AppConfig::default())
                .map_err(|e| Error::configuration(format!("failed to render defaults: {e}")))?;
            std::fs::write(&path, rendered)?;
        }
        Ok(path)
    }

    fn user_config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.user_config {
            return Some(path.clone());
        }
        dirs::config_dir().map(|dir| dir.join("agent-brain").join("config.toml"))
    }
}

/// Validate a loaded configuration
///
/// # Errors
///
/// Returns `ConfigInvalid` naming the offending key.
pub fn validate(config: &AppConfig) -> Result<()> {
    match config.backend.as_str() {
        "embedded" => {}
        "postgres" => {
            if config.database_url.as_deref().is_none_or(str::is_empty) {
                return Err(Error::ConfigInvalid {
                    key: "database_url".to_owned(),
                    message: "required when backend = \"postgres\"".to_owned(),
                });
            }
        }
        other => {
            return Err(Error::ConfigInvalid {
                key: "backend".to_owned(),
                message: format!("unknown backend '{other}' (expected embedded or postgres)"),
            });
        }
    }

    if config.pool_size == 0 {
        return Err(Error::ConfigInvalid {
            key: "pool_size".to_owned(),
            message: "pool size cannot be 0".to_owned(),
        });
    }
    if config.hnsw_m == 0 {
        return Err(Error::ConfigInvalid {
            key: "hnsw_m".to_owned(),
            message: "HNSW m must be positive".to_owned(),
        });
    }
    if config.hnsw_ef_construction == 0 {
        return Err(Error::ConfigInvalid {
            key: "hnsw_ef_construction".to_owned(),
            message: "HNSW ef_construction must be positive".to_owned(),
        });
    }

    let weights = [
        config.search.multi_weight_vector,
        config.search.multi_weight_keyword,
        config.search.multi_weight_graph,
    ];
    if weights.iter().any(|w| *w < 0.0) {
        return Err(Error::ConfigInvalid {
            key: "search".to_owned(),
            message: "multi-mode fusion weights cannot be negative".to_owned(),
        });
    }
    let weight_sum: f32 = weights.iter().sum();
    if (weight_sum - 1.0).abs() > 1e-3 {
        return Err(Error::ConfigInvalid {
            key: "search".to_owned(),
            message: format!("multi-mode fusion weights must sum to 1 (got {weight_sum})"),
        });
    }

    match config.graph.store.as_str() {
        "simple" => {}
        "kuzu" => {
            return Err(Error::ConfigInvalid {
                key: "graph.store".to_owned(),
                message: "graph store 'kuzu' is not available in this build".to_owned(),
            });
        }
        other => {
            return Err(Error::ConfigInvalid {
                key: "graph.store".to_owned(),
                message: format!("unknown graph store '{other}'"),
            });
        }
    }

    if config.graph.traversal_depth == 0 {
        return Err(Error::ConfigInvalid {
            key: "graph.traversal_depth".to_owned(),
            message: "traversal depth must be at least 1".to_owned(),
        });
    }
    Ok(())
}

/// Resolve the configured API key from its environment variable
#[must_use]
pub fn resolve_api_key(api_key_env: Option<&str>) -> Option<String> {
    api_key_env.and_then(|var| std::env::var(var).ok())
}
