//! # Engine Configuration
//!
//! Configuration for the database pool and the engines' business knobs.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIR_DATABASE_PATH=/var/lib/kasir/kasir.db                        │
//! │     KASIR_VOID_WINDOW_HOURS=48                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kasir/kasir.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.kasir.kasir/kasir.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/kasir/kasir.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [engine]
//! lock_timeout_ms = 3000
//! void_window_hours = 24
//! points_conversion_rate = 1000000   # cents per loyalty point
//! default_price_category = 1
//! utc_offset_minutes = 420             # shop-local day for invoice numbers
//! ```

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use kasir_core::{
    Money, DEFAULT_POINTS_CONVERSION_CENTS, DEFAULT_PRICE_CATEGORY, DEFAULT_VOID_WINDOW_HOURS,
};

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits for its own write lock before `Busy`.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Upper bound on waiting for stock / document locks.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,

    /// Hours after which only admin roles may void.
    #[serde(default = "default_void_window")]
    pub void_window_hours: i64,

    /// Cents of completed sale total per loyalty point.
    #[serde(default = "default_points_conversion")]
    pub points_conversion_rate: i64,

    /// Price category used when a line names no price selector.
    #[serde(default = "default_price_category")]
    pub default_price_category: i64,

    /// Offset of the shops' local time from UTC, in minutes. Invoice numbers
    /// and their daily counters use the local calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

const MINUTES_PER_DAY: u32 = 24 * 60;

fn default_lock_timeout() -> u64 {
    3_000
}

fn default_void_window() -> i64 {
    DEFAULT_VOID_WINDOW_HOURS
}

fn default_points_conversion() -> i64 {
    DEFAULT_POINTS_CONVERSION_CENTS
}

fn default_price_category() -> i64 {
    DEFAULT_PRICE_CATEGORY
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            lock_timeout_ms: default_lock_timeout(),
            void_window_hours: default_void_window(),
            points_conversion_rate: default_points_conversion(),
            default_price_category: default_price_category(),
            utc_offset_minutes: 0,
        }
    }
}

// =============================================================================
// Engine Policy (runtime form)
// =============================================================================

/// The engine knobs in the types the engines use.
#[derive(Debug, Clone)]
pub struct EnginePolicy {
    pub lock_timeout: Duration,
    pub void_window_hours: i64,
    pub points_conversion_rate: Money,
    pub default_price_category: i64,
    pub utc_offset: FixedOffset,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        EngineSettings::default().policy()
    }
}

impl EngineSettings {
    pub fn policy(&self) -> EnginePolicy {
        EnginePolicy {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            void_window_hours: self.void_window_hours,
            points_conversion_rate: Money::from_cents(self.points_conversion_rate),
            default_price_category: self.default_price_category,
            // Out-of-range offsets are rejected by validate.
            utc_offset: self
                .utc_offset_minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (kasir.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.engine.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.lock_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.engine.void_window_hours < 0 {
            return Err(ConfigError::Invalid(
                "engine.void_window_hours must not be negative".into(),
            ));
        }
        if self.engine.utc_offset_minutes.unsigned_abs() >= MINUTES_PER_DAY {
            return Err(ConfigError::Invalid(
                "engine.utc_offset_minutes must be within one day of UTC".into(),
            ));
        }
        if self.engine.points_conversion_rate <= 0 {
            return Err(ConfigError::Invalid(
                "engine.points_conversion_rate must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("KASIR_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        override_parsed("KASIR_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed("KASIR_BUSY_TIMEOUT_MS", &mut self.database.busy_timeout_ms);
        override_parsed("KASIR_LOCK_TIMEOUT_MS", &mut self.engine.lock_timeout_ms);
        override_parsed("KASIR_VOID_WINDOW_HOURS", &mut self.engine.void_window_hours);
        override_parsed(
            "KASIR_POINTS_CONVERSION_RATE",
            &mut self.engine.points_conversion_rate,
        );
        override_parsed(
            "KASIR_DEFAULT_PRICE_CATEGORY",
            &mut self.engine.default_price_category,
        );
        override_parsed("KASIR_UTC_OFFSET_MINUTES", &mut self.engine.utc_offset_minutes);
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "kasir", "kasir")
            .map(|dirs| dirs.config_dir().join("kasir.toml"))
    }

    fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("com", "kasir", "kasir")
            .map(|dirs| dirs.data_dir().join("kasir.db"))
            .unwrap_or_else(|| PathBuf::from("kasir.db"))
    }

    /// Pool configuration for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let path = self
            .database
            .path
            .clone()
            .unwrap_or_else(Self::default_database_path);

        DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn policy(&self) -> EnginePolicy {
        self.engine.policy()
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<T>() {
            Ok(value) => {
                debug!(var, "Overriding config from environment");
                *target = value;
            }
            Err(_) => warn!(var, value = %raw, "Ignoring unparsable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.engine.void_window_hours, 24);
        assert_eq!(config.engine.points_conversion_rate, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [engine]
            void_window_hours = 48
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.void_window_hours, 48);
        assert_eq!(config.engine.default_price_category, 1);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.engine.points_conversion_rate = 0;
        assert!(config.validate().is_err());

        config.engine.points_conversion_rate = 100;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_conversion() {
        let mut config = EngineConfig::default();
        config.engine.lock_timeout_ms = 250;
        let policy = config.policy();
        assert_eq!(policy.lock_timeout, Duration::from_millis(250));
        assert_eq!(policy.points_conversion_rate.cents(), 1_000_000);
        assert_eq!(policy.utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn test_utc_offset_bounds() {
        let mut config: EngineConfig = toml::from_str(
            r#"
            [engine]
            utc_offset_minutes = 420
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy().utc_offset.local_minus_utc(), 7 * 3600);

        config.engine.utc_offset_minutes = -570;
        assert_eq!(config.policy().utc_offset.local_minus_utc(), -570 * 60);

        config.engine.utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
        assert_eq!(config.policy().utc_offset.local_minus_utc(), 0);

        config.engine.utc_offset_minutes = i32::MIN;
        assert!(config.validate().is_err());
        assert_eq!(config.policy().utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let path = std::env::temp_dir().join(format!("kasir-test-{}.toml", kasir_core::new_id()));
        std::fs::write(&path, "[database]\nmax_connections = 3\n").unwrap();

        let config = EngineConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.database.max_connections, 3);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[engine]"));
    }
}
