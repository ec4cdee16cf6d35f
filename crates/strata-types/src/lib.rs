//! Shared type definitions for the Strata voxel session server.
//!
//! Everything that crosses a crate boundary lives here: identifiers, the
//! player record, spatial keys, and the clock abstraction used by the
//! time-based eviction policies.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for players and entities
//! - [`player`] -- [`PlayerRecord`], [`Position`], [`GameMode`]
//! - [`block`] -- [`BlockPos`], [`ChunkPos`], [`ChunkSize`], [`BlockType`]
//! - [`clock`] -- [`Clock`] trait with system and manual implementations

pub mod block;
pub mod clock;
pub mod ids;
pub mod player;

// Re-export all public types at crate root for convenience.
pub use block::{BlockPos, BlockType, ChunkPos, ChunkSize};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{EntityId, PlayerId};
pub use player::{GameMode, PlayerRecord, Position, RecordError, UnknownGameMode};
