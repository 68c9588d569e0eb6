use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `ONBOARD__API__BASE_URL`
pub const ENV_PREFIX: &str = "ONBOARD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Onboarding service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the version prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `x-api-key` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3001/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// History listing and cache behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Seconds a fetched page is served without refetching (default: 30)
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    /// Additional attempts for transient failures (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Pages kept in memory before the oldest is evicted (default: 64)
    #[serde(default = "default_max_cached_pages")]
    pub max_cached_pages: usize,
}

fn default_page_size() -> u32 {
    10
}

fn default_staleness_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_max_cached_pages() -> usize {
    64
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            staleness_secs: default_staleness_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_cached_pages: default_max_cached_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the draft file and logs
    #[serde(default = "default_state_path")]
    pub state: String,
}

fn default_state_path() -> String {
    ".onboard".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<state>/logs/` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the CLI works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // Project config in .onboard/
        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/onboard/
        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Write the effective configuration to `path`, creating parent
    /// directories. An existing file is only replaced when `force` is set.
    pub fn write_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(default_state_path()).join("config.toml")
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("onboard").join("config.toml"))
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}
