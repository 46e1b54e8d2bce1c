use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine configuration; immutable for the lifetime of one
/// orchestrator instance.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of tasks waiting in the queue
    #[serde(default = "default_max_pending_orders")]
    pub max_pending_orders: usize,
    /// Queued tasks older than this are dropped, never executed
    #[serde(default = "default_order_timeout_secs")]
    pub order_timeout_secs: u64,
    /// Require approval for orders that do not override it
    #[serde(default)]
    pub manual_approval_default: bool,
    /// Automatically trip the kill switch on loss/drawdown breaches
    #[serde(default = "default_kill_switch_enabled")]
    pub kill_switch_enabled: bool,
    /// Daily realized loss that trips the kill switch
    #[serde(default = "default_max_loss_per_day")]
    pub max_loss_per_day: Decimal,
    /// Drawdown-from-peak percentage that trips the kill switch
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: Decimal,
    /// Window within which identical (symbol, side, quantity) orders
    /// are treated as accidental resubmissions
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
    /// Priority used when the caller does not supply one
    #[serde(default = "default_priority")]
    pub default_priority: u8,
    /// Maximum retry attempts per task for transient broker failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Cap on the exponential backoff delay
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Processing loop poll interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Auto-approve delay when no approval handler is supplied
    #[serde(default = "default_approval_delay_secs")]
    pub approval_delay_secs: u64,
}

fn default_max_pending_orders() -> usize {
    100
}

fn default_order_timeout_secs() -> u64 {
    300
}

fn default_kill_switch_enabled() -> bool {
    true
}

fn default_max_loss_per_day() -> Decimal {
    Decimal::from(500)
}

fn default_max_drawdown_percent() -> Decimal {
    Decimal::from(15)
}

fn default_duplicate_window_secs() -> u64 {
    5
}

fn default_priority() -> u8 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_approval_delay_secs() -> u64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending_orders: default_max_pending_orders(),
            order_timeout_secs: default_order_timeout_secs(),
            manual_approval_default: false,
            kill_switch_enabled: default_kill_switch_enabled(),
            max_loss_per_day: default_max_loss_per_day(),
            max_drawdown_percent: default_max_drawdown_percent(),
            duplicate_window_secs: default_duplicate_window_secs(),
            default_priority: default_priority(),
            max_retries: default_max_retries(),
            max_backoff_secs: default_max_backoff_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            approval_delay_secs: default_approval_delay_secs(),
        }
    }
}

impl EngineConfig {
    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn approval_delay(&self) -> Duration {
        Duration::from_secs(self.approval_delay_secs)
    }
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

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
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
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TILLER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TILLER_ENGINE__MAX_RETRIES, etc.)
            .add_source(
                Environment::with_prefix("TILLER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.engine.max_pending_orders == 0 {
            errors.push("max_pending_orders must be positive".to_string());
        }

        if self.engine.max_loss_per_day <= Decimal::ZERO {
            errors.push("max_loss_per_day must be positive".to_string());
        }

        if self.engine.max_drawdown_percent <= Decimal::ZERO
            || self.engine.max_drawdown_percent > Decimal::from(100)
        {
            errors.push("max_drawdown_percent must be in (0, 100]".to_string());
        }

        if self.engine.default_priority < 1 || self.engine.default_priority > 10 {
            errors.push("default_priority must be in 1..=10".to_string());
        }

        if self.engine.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_pending_orders, 100);
        assert_eq!(engine.default_priority, 5);
        assert_eq!(engine.duplicate_window_secs, 5);
        assert!(engine.kill_switch_enabled);
    }

    #[test]
    fn test_validation_catches_bad_limits() {
        let config = AppConfig {
            engine: EngineConfig {
                max_loss_per_day: dec!(0),
                max_drawdown_percent: dec!(150),
                default_priority: 11,
                ..Default::default()
            },
            database: DatabaseConfig {
                url: "postgres://localhost/tiller".to_string(),
                max_connections: 5,
            },
            logging: LoggingConfig::default(),
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validation_passes_defaults() {
        let config = AppConfig {
            engine: EngineConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/tiller".to_string(),
                max_connections: 5,
            },
            logging: LoggingConfig::default(),
        };
        assert!(config.validate().is_ok());
    }
}
