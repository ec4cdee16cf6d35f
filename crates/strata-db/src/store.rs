//! The backend seam: [`PlayerStore`] and its in-process implementations.
//!
//! A backend is an opaque player-id-keyed record store. The gateway only
//! ever calls `connect`, `write`, and `read`; anything else (key layout,
//! encoding, replication) is the backend's business.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_types::{PlayerId, PlayerRecord};
use tokio::sync::RwLock;

use crate::error::DbError;

/// A player-record backend.
///
/// `connect` must be idempotent: the gateway may call it again after a
/// failure. `read` returns `Ok(None)` when nothing is stored for the id,
/// which is not an error.
pub trait PlayerStore: Send + Sync {
    /// Establish (or confirm) the backend connection.
    fn connect(&self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Persist a value copy of `record` under `id`.
    fn write(
        &self,
        id: PlayerId,
        record: &PlayerRecord,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Fetch the record stored under `id`.
    fn read(&self, id: PlayerId) -> impl Future<Output = Result<Option<PlayerRecord>, DbError>> + Send;
}

/// Backend used when no persistence is configured.
///
/// Connects instantly, drops every write, and never has anything stored:
/// every read is `Ok(None)`, which the cache treats as a new player.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedStore;

impl PlayerStore for DetachedStore {
    async fn connect(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn write(&self, id: PlayerId, _record: &PlayerRecord) -> Result<(), DbError> {
        tracing::trace!(player_id = %id, "detached store discarding write");
        Ok(())
    }

    async fn read(&self, _id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
        Ok(None)
    }
}

/// In-process backend keeping records in a map.
///
/// Suitable for single-node runs and tests. Counts reads and writes so
/// callers can observe how often the cache falls through to it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read` calls served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }

    /// Number of `write` calls served.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl PlayerStore for MemoryStore {
    async fn connect(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn write(&self, id: PlayerId, record: &PlayerRecord) -> Result<(), DbError> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.records.write().await.insert(id, record.clone());
        Ok(())
    }

    async fn read(&self, id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        Ok(self.records.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use strata_types::{GameMode, Position};

    use super::*;

    fn record(id: PlayerId) -> PlayerRecord {
        PlayerRecord::new(id, "Steve", Utc::now(), Position::default(), GameMode::Creative)
    }

    #[tokio::test]
    async fn memory_store_round_trips_and_counts() {
        let store = MemoryStore::new();
        let id = PlayerId::new();
        assert!(store.is_empty().await);

        assert!(store.write(id, &record(id)).await.is_ok());
        let back = store.read(id).await.ok().flatten();
        assert_eq!(back.map(|r| r.game_mode), Some(GameMode::Creative));
        assert_eq!(store.reads(), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_miss_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(matches!(store.read(PlayerId::new()).await, Ok(None)));
    }

    #[tokio::test]
    async fn detached_store_reads_are_always_absent() {
        let store = DetachedStore;
        let id = PlayerId::new();
        assert!(store.connect().await.is_ok());
        assert!(store.write(id, &record(id)).await.is_ok());
        assert!(matches!(store.read(id).await, Ok(None)));
    }
}
