//! Configuration loading and typed config structures for the Strata server.
//!
//! The canonical configuration lives in `strata-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads and validates the file. Every field has a default, so
//! an empty file (or no file at all) yields a working configuration.
//!
//! Values are read once at construction time; the player cache and chunk
//! store never observe later changes.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;
use strata_types::{ChunkSize, GameMode, Position};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range or unrecognized.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
///
/// Mirrors the structure of `strata-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// Player admission and defaults.
    #[serde(default)]
    pub session: SessionConfig,

    /// Chunk geometry and eviction.
    #[serde(default)]
    pub world: WorldConfig,

    /// Player cache policy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Persistence backend selection.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DRAGONFLY_URL` in the environment overrides
    /// `persistence.dragonfly_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.persistence.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first bad value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.default_game_mode()?;
        if !self.session.spawn.is_finite() {
            return Err(ConfigError::Invalid {
                field: "session.spawn",
                reason: "coordinates must be finite".to_owned(),
            });
        }
        self.world.chunk_size()?;
        if self.world.maintenance_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "world.maintenance_interval_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.persistence.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "persistence.timeout_ms",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Player admission settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    /// Maximum simultaneously online players.
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Game mode given to players with no stored record.
    #[serde(default = "default_game_mode")]
    pub default_game_mode: String,

    /// Where players with no stored record appear.
    #[serde(default = "default_spawn")]
    pub spawn: Position,
}

impl SessionConfig {
    /// The parsed default game mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the name is not a known mode.
    pub fn default_game_mode(&self) -> Result<GameMode, ConfigError> {
        self.default_game_mode
            .parse()
            .map_err(|e: strata_types::UnknownGameMode| ConfigError::Invalid {
                field: "session.default_game_mode",
                reason: e.to_string(),
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: default_max_players(),
            default_game_mode: default_game_mode(),
            spawn: default_spawn(),
        }
    }
}

/// Chunk geometry and eviction settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Chunk width along x and z, in blocks.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u16,

    /// Age in seconds after which a loaded chunk is evicted.
    #[serde(default = "default_chunk_idle_secs")]
    pub chunk_idle_secs: u64,

    /// Seconds between maintenance ticks.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl WorldConfig {
    /// The validated chunk width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero.
    pub fn chunk_size(&self) -> Result<ChunkSize, ConfigError> {
        ChunkSize::new(self.chunk_size).ok_or_else(|| ConfigError::Invalid {
            field: "world.chunk_size",
            reason: "must be at least 1".to_owned(),
        })
    }

    /// Chunk idle threshold as a signed duration.
    pub fn chunk_idle(&self) -> TimeDelta {
        seconds_to_delta(self.chunk_idle_secs)
    }

    /// Interval between maintenance ticks.
    pub const fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_idle_secs: default_chunk_idle_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

/// Player cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached player record stays fresh.
    #[serde(default = "default_cache_timeout_secs")]
    pub timeout_secs: u64,
}

impl CacheConfig {
    /// Cache TTL as a signed duration.
    pub fn timeout(&self) -> TimeDelta {
        seconds_to_delta(self.timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_cache_timeout_secs(),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Dragonfly (Redis-compatible) URL. Without one, nothing is persisted.
    #[serde(default)]
    pub dragonfly_url: Option<String>,

    /// Per-call backend timeout in milliseconds.
    #[serde(default = "default_persistence_timeout_ms")]
    pub timeout_ms: u64,
}

impl PersistenceConfig {
    /// Override the Dragonfly URL with `DRAGONFLY_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = Some(val);
        }
    }

    /// Per-call backend timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: None,
            timeout_ms: default_persistence_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn seconds_to_delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

const fn default_max_players() -> usize {
    20
}

fn default_game_mode() -> String {
    "survival".to_owned()
}

const fn default_spawn() -> Position {
    Position::new(0.0, 64.0, 0.0)
}

const fn default_chunk_size() -> u16 {
    16
}

const fn default_chunk_idle_secs() -> u64 {
    30 * 60
}

const fn default_maintenance_interval_secs() -> u64 {
    60
}

const fn default_cache_timeout_secs() -> u64 {
    600
}

const fn default_persistence_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
