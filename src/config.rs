use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub cache: CacheConfig,

    pub search: SearchConfig,

    pub remote: RemoteConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/svcdex.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 7420,
            cors_allowed_origins: vec![
                "http://localhost:7420".to_string(),
                "http://127.0.0.1:7420".to_string(),
            ],
        }
    }
}

/// Default lifetimes per cache key namespace, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub categories_ttl_seconds: u64,

    pub services_ttl_seconds: u64,

    pub search_ttl_seconds: u64,

    pub user_ttl_seconds: u64,

    /// Applied to keys whose namespace is not recognized.
    pub default_ttl_seconds: u64,

    /// How often expired entries are swept in the background. 0 disables the sweeper.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            categories_ttl_seconds: 3600,
            services_ttl_seconds: 1800,
            search_ttl_seconds: 300,
            user_ttl_seconds: 60,
            default_ttl_seconds: 600,
            sweep_interval_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub min_query_length: usize,

    pub max_query_length: usize,

    pub default_limit: u64,

    pub max_limit: u64,

    /// Local results are trusted without a remote lookup when the returned page
    /// holds at least this many records...
    pub min_page_results: usize,

    /// ...or when the total local match count reaches this value.
    pub min_total_results: u64,

    /// Characters of a remote title compared against existing titles in the same
    /// category when no source URL matches.
    pub dedup_title_prefix: usize,

    pub local_query_timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            max_query_length: 100,
            default_limit: 20,
            max_limit: 50,
            min_page_results: 5,
            min_total_results: 10,
            dedup_title_prefix: 24,
            local_query_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,

    pub base_url: String,

    /// Request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,

    pub max_attempts: u32,

    /// Delay between attempts is `backoff_base_ms * 2^attempt`.
    pub backoff_base_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:7430".to_string(),
            request_timeout_seconds: 30,
            max_attempts: 3,
            backoff_base_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("svcdex").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".svcdex").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.enabled && self.remote.base_url.is_empty() {
            anyhow::bail!("Remote base URL cannot be empty when enabled");
        }

        if self.remote.max_attempts == 0 {
            anyhow::bail!("remote.max_attempts must be at least 1");
        }

        if self.search.max_limit == 0 || self.search.max_limit > 50 {
            anyhow::bail!("search.max_limit must be between 1 and 50");
        }

        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            anyhow::bail!("search.default_limit must be between 1 and search.max_limit");
        }

        if self.search.min_query_length == 0
            || self.search.min_query_length > self.search.max_query_length
        {
            anyhow::bail!("search.min_query_length must be >= 1 and <= search.max_query_length");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        Ok(())
    }
}
