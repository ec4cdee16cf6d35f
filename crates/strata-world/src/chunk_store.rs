//! Chunk-addressed block store with lazy loading and idle eviction.
//!
//! The [`ChunkStore`] maps integer world coordinates onto [`Chunk`] columns.
//! Chunks come into existence on first access and leave on explicit unload or
//! when [`ChunkStore::optimize_memory`] finds them older than the idle
//! threshold:
//!
//! ```text
//! absent --(load_chunk | set_block | spawn_entity)--> loaded
//! loaded --(unload_chunk | optimize_memory)---------> absent
//! ```
//!
//! Reads never load. [`ChunkStore::get_block`] on an untouched region reports
//! absence without creating a chunk; only writes and explicit loads do.
//!
//! Eviction is destructive. The store is a volatile cache of the world, not
//! its system of record, and nothing is flushed when a chunk is dropped.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::TimeDelta;
use serde_json::{Value, json};
use strata_events::{EventBus, topics};
use strata_types::{BlockPos, BlockType, ChunkPos, ChunkSize, Clock, EntityId};

use crate::chunk::Chunk;

/// Chunks older than this are evicted by [`ChunkStore::optimize_memory`].
pub const DEFAULT_IDLE_THRESHOLD: TimeDelta = TimeDelta::minutes(30);

/// Sparse voxel storage partitioned into chunk columns.
pub struct ChunkStore {
    /// Width of each chunk column.
    chunk_size: ChunkSize,
    /// Maximum age measured from load time before eviction.
    idle_threshold: TimeDelta,
    /// Loaded chunks by address.
    chunks: HashMap<ChunkPos, Chunk>,
    /// Time source for load stamps and age checks.
    clock: Arc<dyn Clock>,
    /// Optional bus for load/unload notifications.
    events: Option<Arc<EventBus>>,
}

impl ChunkStore {
    /// Create an empty store.
    pub fn new(chunk_size: ChunkSize, idle_threshold: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            chunk_size,
            idle_threshold,
            chunks: HashMap::new(),
            clock,
            events: None,
        }
    }

    /// Publish `chunk_loaded` / `chunk_unloaded` on `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Width of each chunk column in blocks.
    pub const fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Eviction age threshold.
    pub const fn idle_threshold(&self) -> TimeDelta {
        self.idle_threshold
    }

    /// Number of chunks currently loaded.
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Addresses of all loaded chunks, in no particular order.
    pub fn loaded_positions(&self) -> Vec<ChunkPos> {
        self.chunks.keys().copied().collect()
    }

    // -------------------------------------------------------------------
    // Chunk lifecycle
    // -------------------------------------------------------------------

    /// Return the chunk at `pos`, creating an empty one if absent.
    pub fn load_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        let loaded = self.chunks.len();
        match self.chunks.entry(pos) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let chunk = entry.insert(Chunk::new(pos, self.clock.now()));
                tracing::debug!(chunk = %pos, loaded = loaded.saturating_add(1), "chunk loaded");
                notify(self.events.as_deref(), topics::CHUNK_LOADED, pos);
                chunk
            }
        }
    }

    /// Drop the chunk at `pos`. Returns whether it was loaded.
    pub fn unload_chunk(&mut self, pos: ChunkPos) -> bool {
        if self.chunks.remove(&pos).is_none() {
            return false;
        }
        tracing::debug!(chunk = %pos, loaded = self.chunks.len(), "chunk unloaded");
        notify(self.events.as_deref(), topics::CHUNK_UNLOADED, pos);
        true
    }

    /// Look up a chunk without loading it.
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Evict every chunk loaded longer ago than the idle threshold.
    ///
    /// Age is measured from load time, not from last access: a chunk that is
    /// read and written constantly still ages out once it passes the
    /// threshold. Returns the number of chunks evicted.
    pub fn optimize_memory(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<ChunkPos> = self
            .chunks
            .values()
            .filter(|chunk| chunk.age(now) > self.idle_threshold)
            .map(Chunk::pos)
            .collect();

        let mut unloaded: usize = 0;
        for pos in expired {
            if self.unload_chunk(pos) {
                unloaded = unloaded.saturating_add(1);
            }
        }

        if unloaded > 0 {
            tracing::info!(
                unloaded,
                remaining = self.chunks.len(),
                "evicted idle chunks"
            );
        }
        unloaded
    }

    // -------------------------------------------------------------------
    // Block access
    // -------------------------------------------------------------------

    /// The chunk address containing a world coordinate.
    pub fn chunk_pos_of(&self, pos: BlockPos) -> ChunkPos {
        pos.chunk(self.chunk_size)
    }

    /// Place `block` at `pos`, loading the target chunk if needed.
    ///
    /// Returns the block previously at that coordinate, if any.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockType) -> Option<BlockType> {
        let chunk_pos = self.chunk_pos_of(pos);
        self.load_chunk(chunk_pos).set_block(pos, block)
    }

    /// The block at `pos`.
    ///
    /// `None` covers both air inside a loaded chunk and an unloaded chunk;
    /// in neither case is a chunk created.
    pub fn get_block(&self, pos: BlockPos) -> Option<&BlockType> {
        self.get_chunk(self.chunk_pos_of(pos))?.block(pos)
    }

    /// Reset `pos` to air, returning what was there. Does not load chunks.
    pub fn remove_block(&mut self, pos: BlockPos) -> Option<BlockType> {
        let chunk_pos = self.chunk_pos_of(pos);
        self.chunks.get_mut(&chunk_pos)?.remove_block(pos)
    }

    // -------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------

    /// Place an entity in the chunk containing `at`, loading it if needed.
    ///
    /// Returns the entity's previous state in that chunk, if any.
    pub fn spawn_entity(&mut self, at: BlockPos, id: EntityId, state: Value) -> Option<Value> {
        let chunk_pos = self.chunk_pos_of(at);
        self.load_chunk(chunk_pos).insert_entity(id, state)
    }

    /// Remove an entity from a loaded chunk. Does not load chunks.
    pub fn despawn_entity(&mut self, chunk: ChunkPos, id: EntityId) -> Option<Value> {
        self.chunks.get_mut(&chunk)?.remove_entity(id)
    }
}

fn notify(events: Option<&EventBus>, topic: &str, pos: ChunkPos) {
    if let Some(bus) = events {
        bus.fire(topic, &json!({ "x": pos.x, "z": pos.z }));
    }
}

impl core::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChunkStore")
            .field("chunk_size", &self.chunk_size)
            .field("idle_threshold", &self.idle_threshold)
            .field("loaded", &self.chunks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use strata_events::Listener;
    use strata_types::ManualClock;

    use super::*;

    fn store_with_clock() -> (ChunkStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = ChunkStore::new(ChunkSize::DEFAULT, DEFAULT_IDLE_THRESHOLD, clock.clone());
        (store, clock)
    }

    fn stone() -> BlockType {
        BlockType::new("stone")
    }

    #[test]
    fn set_then_get_round_trips_at_positive_coordinates() {
        let (mut store, _) = store_with_clock();
        let pos = BlockPos::new(5, 64, 37);
        assert_eq!(store.set_block(pos, stone()), None);
        assert_eq!(store.get_block(pos), Some(&stone()));
    }

    #[test]
    fn negative_coordinates_land_in_negative_chunks() {
        let (mut store, _) = store_with_clock();
        let pos = BlockPos::new(-1, 10, -1);
        store.set_block(pos, BlockType::new("dirt"));

        assert!(store.get_chunk(ChunkPos::new(-1, -1)).is_some());
        assert!(store.get_chunk(ChunkPos::new(0, 0)).is_none());
        assert_eq!(store.get_block(pos).map(BlockType::as_str), Some("dirt"));
        assert_eq!(store.get_block(BlockPos::new(0, 10, 0)), None);
    }

    #[test]
    fn set_block_replaces_and_returns_previous() {
        let (mut store, _) = store_with_clock();
        let pos = BlockPos::new(0, 0, 0);
        store.set_block(pos, stone());
        let previous = store.set_block(pos, BlockType::new("glass"));
        assert_eq!(previous, Some(stone()));
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn get_block_never_loads_a_chunk() {
        let (store, _) = store_with_clock();
        assert_eq!(store.get_block(BlockPos::new(100, 0, 100)), None);
        assert_eq!(store.loaded_count(), 0);
    }

    #[test]
    fn writes_and_loads_create_exactly_one_chunk() {
        let (mut store, _) = store_with_clock();
        store.set_block(BlockPos::new(1, 1, 1), stone());
        assert_eq!(store.loaded_count(), 1);
        store.set_block(BlockPos::new(15, 200, 15), stone());
        assert_eq!(store.loaded_count(), 1);

        store.load_chunk(ChunkPos::new(3, 3));
        assert_eq!(store.loaded_count(), 2);
        store.load_chunk(ChunkPos::new(3, 3));
        assert_eq!(store.loaded_count(), 2);
    }

    #[test]
    fn loaded_chunk_with_no_blocks_is_air() {
        let (mut store, _) = store_with_clock();
        let chunk = store.load_chunk(ChunkPos::new(0, 0));
        assert_eq!(chunk.block_count(), 0);
        assert_eq!(store.get_block(BlockPos::new(3, 3, 3)), None);
        assert!(store.get_chunk(ChunkPos::new(0, 0)).is_some());
    }

    #[test]
    fn unload_reports_presence_and_discards_blocks() {
        let (mut store, _) = store_with_clock();
        let pos = BlockPos::new(2, 2, 2);
        store.set_block(pos, stone());

        assert!(store.unload_chunk(ChunkPos::new(0, 0)));
        assert!(!store.unload_chunk(ChunkPos::new(0, 0)));
        assert_eq!(store.loaded_count(), 0);
        assert_eq!(store.get_block(pos), None);
    }

    #[test]
    fn remove_block_does_not_load() {
        let (mut store, _) = store_with_clock();
        assert_eq!(store.remove_block(BlockPos::new(0, 0, 0)), None);
        assert_eq!(store.loaded_count(), 0);

        store.set_block(BlockPos::new(0, 0, 0), stone());
        assert_eq!(store.remove_block(BlockPos::new(0, 0, 0)), Some(stone()));
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn chunk_survives_below_idle_threshold() {
        let (mut store, clock) = store_with_clock();
        store.load_chunk(ChunkPos::new(0, 0));
        clock.advance(TimeDelta::minutes(29));
        assert_eq!(store.optimize_memory(), 0);
        assert!(store.get_chunk(ChunkPos::new(0, 0)).is_some());
    }

    #[test]
    fn chunk_exactly_at_idle_threshold_is_kept() {
        let (mut store, clock) = store_with_clock();
        store.load_chunk(ChunkPos::new(0, 0));
        clock.advance(DEFAULT_IDLE_THRESHOLD);
        assert_eq!(store.optimize_memory(), 0);
        assert_eq!(store.loaded_count(), 1);

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(store.optimize_memory(), 1);
    }

    #[test]
    fn chunk_past_idle_threshold_is_evicted() {
        let (mut store, clock) = store_with_clock();
        store.load_chunk(ChunkPos::new(0, 0));
        clock.advance(TimeDelta::minutes(31));
        assert_eq!(store.optimize_memory(), 1);
        assert!(store.get_chunk(ChunkPos::new(0, 0)).is_none());
    }

    #[test]
    fn eviction_counts_only_expired_chunks() {
        let (mut store, clock) = store_with_clock();
        store.load_chunk(ChunkPos::new(0, 0));
        store.load_chunk(ChunkPos::new(1, 0));
        clock.advance(TimeDelta::minutes(20));
        store.load_chunk(ChunkPos::new(2, 0));
        clock.advance(TimeDelta::minutes(11));

        assert_eq!(store.optimize_memory(), 2);
        assert_eq!(store.loaded_positions(), vec![ChunkPos::new(2, 0)]);
    }

    #[test]
    fn access_does_not_refresh_load_time() {
        let (mut store, clock) = store_with_clock();
        let pos = BlockPos::new(0, 0, 0);
        store.set_block(pos, stone());
        clock.advance(TimeDelta::minutes(25));
        store.set_block(pos, BlockType::new("sand"));
        clock.advance(TimeDelta::minutes(6));

        assert_eq!(store.optimize_memory(), 1);
    }

    #[test]
    fn entities_follow_write_semantics() {
        let (mut store, _) = store_with_clock();
        let id = EntityId::new();
        assert_eq!(store.despawn_entity(ChunkPos::new(-1, 0), id), None);
        assert_eq!(store.loaded_count(), 0);

        store.spawn_entity(BlockPos::new(-3, 64, 4), id, json!({ "kind": "sheep" }));
        let chunk = store.get_chunk(ChunkPos::new(-1, 0));
        assert_eq!(chunk.map(Chunk::entity_count), Some(1));
        assert_eq!(
            store.despawn_entity(ChunkPos::new(-1, 0), id),
            Some(json!({ "kind": "sheep" }))
        );
    }

    #[test]
    fn load_and_unload_publish_events() {
        let bus = Arc::new(EventBus::new());
        let loaded = Arc::new(AtomicUsize::new(0));
        let unloaded = Arc::new(AtomicUsize::new(0));
        {
            let loaded = Arc::clone(&loaded);
            bus.on(
                topics::CHUNK_LOADED,
                Listener::new("count-loads", move |_| {
                    loaded.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }
        {
            let unloaded = Arc::clone(&unloaded);
            bus.on(
                topics::CHUNK_UNLOADED,
                Listener::new("count-unloads", move |payload| {
                    assert_eq!(payload, &json!({ "x": 0, "z": -1 }));
                    unloaded.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }

        let (store, _) = store_with_clock();
        let mut store = store.with_events(bus);
        store.set_block(BlockPos::new(0, 0, -5), stone());
        store.set_block(BlockPos::new(1, 0, -5), stone());
        store.unload_chunk(ChunkPos::new(0, -1));
        store.unload_chunk(ChunkPos::new(0, -1));

        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert_eq!(unloaded.load(Ordering::SeqCst), 1);
    }
}
