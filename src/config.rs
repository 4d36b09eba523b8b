use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// TRON node HTTP endpoint (e.g. https://api.trongrid.io)
    pub node_url: String,
    /// Optional TronGrid API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout for node calls in milliseconds
    #[serde(default = "default_chain_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_chain_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct FulfillmentConfig {
    /// Seconds between pending-order sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum pending orders per sweep
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,
    /// Pause between fulfillment attempts within a sweep, milliseconds
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    /// Minutes before an unfulfilled pending order expires
    #[serde(default = "default_order_ttl_minutes")]
    pub order_ttl_minutes: i64,
    /// Seconds between supplier capacity refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_sweep_batch_size() -> u32 {
    10
}

fn default_pacing_delay_ms() -> u64 {
    2_000
}

fn default_order_ttl_minutes() -> i64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    300
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
            pacing_delay_ms: default_pacing_delay_ms(),
            order_ttl_minutes: default_order_ttl_minutes(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// HTTP bind address
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Enable dry run mode (no real on-chain delegation)
    #[serde(default)]
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("database.max_connections", 5)?
            .set_default("logging.level", "info")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ERGON_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ERGON_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("ERGON")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if self.chain.node_url.is_empty() && !self.dry_run.enabled {
            errors.push("chain.node_url is required unless dry_run is enabled".to_string());
        }

        if self.fulfillment.sweep_batch_size == 0 {
            errors.push("fulfillment.sweep_batch_size must be positive".to_string());
        }

        if self.fulfillment.order_ttl_minutes <= 0 {
            errors.push("fulfillment.order_ttl_minutes must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
