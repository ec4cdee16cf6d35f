//! Spatial keys and block identifiers for the voxel world.
//!
//! World coordinates are plain integer triples. Chunks are addressed by their
//! `(x, z)` column; `y` is unbounded within a chunk. All keys are value types
//! so they can be used directly in hashed or ordered maps.

use core::fmt;
use core::num::NonZeroU16;

use serde::{Deserialize, Serialize};

/// Width of a chunk column along both the x and z axes, in blocks.
///
/// Always at least 1, so floor division by it can never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkSize(NonZeroU16);

impl ChunkSize {
    /// The conventional 16-block chunk width.
    pub const DEFAULT: Self = Self(NonZeroU16::MIN.saturating_add(15));

    /// Create a chunk size, returning `None` for zero.
    pub const fn new(blocks: u16) -> Option<Self> {
        match NonZeroU16::new(blocks) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Width in blocks.
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Address of a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk column index along x.
    pub x: i32,
    /// Chunk column index along z.
    pub z: i32,
}

impl ChunkPos {
    /// Create a chunk position.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Integer world coordinate of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// East/west.
    pub x: i32,
    /// Height.
    pub y: i32,
    /// North/south.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk column containing this block.
    ///
    /// Uses floor division so negative coordinates round toward negative
    /// infinity: with a 16-block chunk, `x = -1` lives in chunk `-1`, not `0`.
    pub fn chunk(self, size: ChunkSize) -> ChunkPos {
        let width = i32::from(size.get());
        ChunkPos::new(self.x.div_euclid(width), self.z.div_euclid(width))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Identifier of a block type, e.g. `"stone"` or `"oak_log"`.
///
/// Air is never stored: an unset coordinate inside a loaded chunk is air.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockType(String);

impl BlockType {
    /// Wrap a block identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is usable (non-blank).
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockType {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_size_is_sixteen() {
        assert_eq!(ChunkSize::default().get(), 16);
        assert!(ChunkSize::new(0).is_none());
    }

    #[test]
    fn positive_coordinates_truncate_into_chunk() {
        let size = ChunkSize::DEFAULT;
        assert_eq!(BlockPos::new(0, 70, 0).chunk(size), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(15, 0, 15).chunk(size), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(16, 0, 31).chunk(size), ChunkPos::new(1, 1));
    }

    #[test]
    fn negative_coordinates_floor_toward_negative_infinity() {
        let size = ChunkSize::DEFAULT;
        assert_eq!(BlockPos::new(-1, 0, 0).chunk(size), ChunkPos::new(-1, 0));
        assert_eq!(BlockPos::new(-16, 0, -17).chunk(size), ChunkPos::new(-1, -2));
        assert_eq!(BlockPos::new(-17, 0, -16).chunk(size), ChunkPos::new(-2, -1));
    }

    #[test]
    fn odd_chunk_sizes_address_correctly() {
        let size = ChunkSize::new(5).unwrap_or_default();
        assert_eq!(BlockPos::new(-5, 0, 4).chunk(size), ChunkPos::new(-1, 0));
        assert_eq!(BlockPos::new(-6, 0, 5).chunk(size), ChunkPos::new(-2, 1));
    }

    #[test]
    fn blank_block_ids_are_invalid() {
        assert!(BlockType::new("stone").is_valid());
        assert!(!BlockType::new("").is_valid());
        assert!(!BlockType::new("   ").is_valid());
    }
}
