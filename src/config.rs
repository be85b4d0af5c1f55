use crate::error::ExporterError;
use crate::window::TimeWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "litellm-exporter.toml";

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsConfig {
    /// Lookback of the spend aggregate query
    pub spend_window: TimeWindow,
    /// Accepted and validated but not used by any query yet
    pub request_window: TimeWindow,
    /// Accepted and validated but not used by any query yet
    pub error_window: TimeWindow,
    pub update_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

/// Flat key/value settings as they appear in the environment
/// (`METRICS_SPEND_WINDOW`, `LITELLM_DB_HOST`, ...) or the config file
#[derive(Debug, Clone, Deserialize)]
struct Settings {
    #[serde(default = "default_spend_window")]
    metrics_spend_window: String,
    #[serde(default = "default_request_window")]
    metrics_request_window: String,
    #[serde(default = "default_error_window")]
    metrics_error_window: String,
    #[serde(default = "default_update_interval")]
    metrics_update_interval: u64,
    #[serde(default = "default_metrics_host")]
    metrics_host: String,
    #[serde(default = "default_metrics_port")]
    metrics_port: u16,

    #[serde(default = "default_db_host")]
    litellm_db_host: String,
    #[serde(default = "default_db_port")]
    litellm_db_port: u16,
    #[serde(default = "default_db_name")]
    litellm_db_name: String,
    #[serde(default = "default_db_user")]
    litellm_db_user: String,
    #[serde(default)]
    litellm_db_password: String,
    #[serde(default = "default_min_connections")]
    db_min_connections: u32,
    #[serde(default = "default_max_connections")]
    db_max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    db_acquire_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    db_retry_attempts: u32,

    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_format")]
    log_format: String,
}

fn default_spend_window() -> String {
    "30d".to_string()
}

fn default_request_window() -> String {
    "24h".to_string()
}

fn default_error_window() -> String {
    "1h".to_string()
}

fn default_update_interval() -> u64 {
    15
}

fn default_metrics_host() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "litellm".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Load configuration from the optional config file and the environment
///
/// Environment variables override file values. When `path` is `None` the
/// default file name is tried and silently skipped if absent; an explicit
/// path must exist.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let source = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::default())
        .build()?;

    from_source(source)
}

/// Build a validated configuration from any `config` source
pub fn from_source(source: config::Config) -> anyhow::Result<Config> {
    let settings: Settings = source.try_deserialize()?;
    let cfg = settings.into_config()?;
    validate_config(&cfg)?;
    Ok(cfg)
}

impl Settings {
    fn into_config(self) -> anyhow::Result<Config> {
        Ok(Config {
            metrics: MetricsConfig {
                spend_window: TimeWindow::parse(&self.metrics_spend_window)?,
                request_window: TimeWindow::parse(&self.metrics_request_window)?,
                error_window: TimeWindow::parse(&self.metrics_error_window)?,
                update_interval_seconds: self.metrics_update_interval,
            },
            database: DatabaseConfig {
                host: self.litellm_db_host,
                port: self.litellm_db_port,
                name: self.litellm_db_name,
                user: self.litellm_db_user,
                password: self.litellm_db_password,
                min_connections: self.db_min_connections,
                max_connections: self.db_max_connections,
                acquire_timeout_seconds: self.db_acquire_timeout,
                retry_attempts: self.db_retry_attempts,
            },
            server: ServerConfig {
                host: self.metrics_host,
                port: self.metrics_port,
                log_level: self.log_level,
                log_format: self.log_format.to_lowercase(),
            },
        })
    }
}

fn validate_config(cfg: &Config) -> Result<(), ExporterError> {
    let invalid = |message: String| -> Result<(), ExporterError> {
        Err(ExporterError::Config(message))
    };

    if cfg.metrics.update_interval_seconds == 0 {
        return invalid("METRICS_UPDATE_INTERVAL must be greater than zero".to_string());
    }

    if cfg.database.max_connections == 0 {
        return invalid("DB_MAX_CONNECTIONS must be greater than zero".to_string());
    }

    if cfg.database.min_connections > cfg.database.max_connections {
        return invalid(format!(
            "DB_MIN_CONNECTIONS ({}) cannot exceed DB_MAX_CONNECTIONS ({})",
            cfg.database.min_connections, cfg.database.max_connections
        ));
    }

    if cfg.database.retry_attempts == 0 {
        return invalid("DB_RETRY_ATTEMPTS must be at least 1".to_string());
    }

    match cfg.server.log_format.as_str() {
        "text" | "json" => Ok(()),
        other => invalid(format!("LOG_FORMAT must be 'text' or 'json', got '{}'", other)),
    }
}
