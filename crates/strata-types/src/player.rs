//! Player records and their component types.
//!
//! A [`PlayerRecord`] is the unit handed between the session, the player
//! cache, and the persistence backends. It is plain data: cloning it is how
//! a value copy reaches the backend on save.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// How a player interacts with the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Resources must be gathered; the player can take damage.
    #[default]
    Survival,
    /// Unlimited blocks, no damage.
    Creative,
    /// Blocks cannot be placed or broken without the right tools.
    Adventure,
    /// Observe only.
    Spectator,
}

impl GameMode {
    /// Lowercase name used in configuration and serialized records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
            Self::Adventure => "adventure",
            Self::Spectator => "spectator",
        }
    }
}

impl core::fmt::Display for GameMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`GameMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game mode: {0:?}")]
pub struct UnknownGameMode(pub String);

impl core::str::FromStr for GameMode {
    type Err = UnknownGameMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "survival" => Ok(Self::Survival),
            "creative" => Ok(Self::Creative),
            "adventure" => Ok(Self::Adventure),
            "spectator" => Ok(Self::Spectator),
            _ => Err(UnknownGameMode(s.to_owned())),
        }
    }
}

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// East/west.
    pub x: f64,
    /// Height.
    pub y: f64,
    /// North/south.
    pub z: f64,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Whether every component is a finite number.
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Reasons a [`PlayerRecord`] is rejected before it reaches any store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The record was submitted under a different id than it carries.
    #[error("record id {found} does not match player {expected}")]
    IdMismatch {
        /// Id the caller saved under.
        expected: PlayerId,
        /// Id embedded in the record.
        found: PlayerId,
    },

    /// The display name is empty or whitespace.
    #[error("player {0} has an empty display name")]
    EmptyName(PlayerId),

    /// The position contains NaN or an infinity.
    #[error("player {0} has a non-finite position")]
    NonFinitePosition(PlayerId),
}

/// Everything the server knows about one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Unique player identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// When the player last joined.
    pub joined_at: DateTime<Utc>,
    /// Last known position.
    pub position: Position,
    /// Current game mode.
    pub game_mode: GameMode,
    /// Item key to quantity.
    #[serde(default)]
    pub inventory: BTreeMap<String, u64>,
    /// Stat name to counter.
    #[serde(default)]
    pub stats: BTreeMap<String, u64>,
}

impl PlayerRecord {
    /// A fresh record with empty inventory and stats.
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        joined_at: DateTime<Utc>,
        position: Position,
        game_mode: GameMode,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            joined_at,
            position,
            game_mode,
            inventory: BTreeMap::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Check the record is well-formed for storage under `id`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] found.
    pub fn validate(&self, id: PlayerId) -> Result<(), RecordError> {
        if self.id != id {
            return Err(RecordError::IdMismatch {
                expected: id,
                found: self.id,
            });
        }
        if self.name.trim().is_empty() {
            return Err(RecordError::EmptyName(id));
        }
        if !self.position.is_finite() {
            return Err(RecordError::NonFinitePosition(id));
        }
        Ok(())
    }
}
