//! A single loaded chunk column.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use strata_types::{BlockPos, BlockType, ChunkPos, EntityId};

/// Block and entity data for one `(x, z)` chunk column.
///
/// Blocks are keyed by their world coordinate. A coordinate with no entry is
/// air, so a freshly loaded chunk is empty and that is a valid state.
#[derive(Debug, Clone)]
pub struct Chunk {
    pos: ChunkPos,
    loaded_at: DateTime<Utc>,
    blocks: HashMap<BlockPos, BlockType>,
    entities: HashMap<EntityId, Value>,
}

impl Chunk {
    pub(crate) fn new(pos: ChunkPos, loaded_at: DateTime<Utc>) -> Self {
        Self {
            pos,
            loaded_at,
            blocks: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    /// Address of this chunk.
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// When the chunk entered the store.
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Time since the chunk was loaded, as seen at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.loaded_at)
    }

    /// The block at `pos`, or `None` for air.
    pub fn block(&self, pos: BlockPos) -> Option<&BlockType> {
        self.blocks.get(&pos)
    }

    pub(crate) fn set_block(&mut self, pos: BlockPos, block: BlockType) -> Option<BlockType> {
        self.blocks.insert(pos, block)
    }

    pub(crate) fn remove_block(&mut self, pos: BlockPos) -> Option<BlockType> {
        self.blocks.remove(&pos)
    }

    /// Number of non-air blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterate over every non-air block.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockPos, &BlockType)> {
        self.blocks.iter()
    }

    /// Insert or replace an entity's state, returning the previous state.
    pub fn insert_entity(&mut self, id: EntityId, state: Value) -> Option<Value> {
        self.entities.insert(id, state)
    }

    /// State of the entity, if it lives in this chunk.
    pub fn entity(&self, id: EntityId) -> Option<&Value> {
        self.entities.get(&id)
    }

    /// Remove an entity, returning its state.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Value> {
        self.entities.remove(&id)
    }

    /// Number of entities in this chunk.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
