//! TTL read-through / write-through cache over the persistence gateway.
//!
//! A cached record is served only while `now - captured_at < timeout`.
//! Expired entries are not swept eagerly; a lookup that finds one removes it
//! and falls through to the backend. There is no LRU and no per-entry TTL.
//!
//! On a backend failure during load the caller gets `None`. A stale entry
//! has already been evicted by then and is not used as a fallback.
//!
//! The entry map lock is never held across a backend call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use strata_db::{DbError, PersistenceGateway, PlayerStore};
use strata_types::{Clock, PlayerId, PlayerRecord, RecordError};
use tokio::sync::Mutex;

/// Errors reported by [`PlayerCache::save_player`].
#[derive(Debug, thiserror::Error)]
pub enum PlayerCacheError {
    /// The record was malformed and was not cached.
    #[error("invalid player record: {0}")]
    Validation(#[from] RecordError),

    /// The record was cached but the write-through to the backend failed.
    #[error("persistence failed: {0}")]
    Backend(#[from] DbError),
}

/// A cached record and the instant it was captured.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    record: PlayerRecord,
    captured_at: DateTime<Utc>,
}

impl CacheEntry {
    /// The cached record.
    pub const fn record(&self) -> &PlayerRecord {
        &self.record
    }

    /// When the record entered the cache.
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    fn is_fresh(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        now.signed_duration_since(self.captured_at) < timeout
    }
}

/// Player-record cache in front of a [`PersistenceGateway`].
#[derive(Debug)]
pub struct PlayerCache<S> {
    gateway: Arc<PersistenceGateway<S>>,
    timeout: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<PlayerId, CacheEntry>>,
}

impl<S: PlayerStore> PlayerCache<S> {
    /// Create an empty cache with a uniform `timeout`.
    pub fn new(gateway: Arc<PersistenceGateway<S>>, timeout: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            timeout,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The gateway behind this cache.
    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    /// The cache TTL.
    pub const fn timeout(&self) -> TimeDelta {
        self.timeout
    }

    /// Validate `record`, cache it, and write it through to the backend.
    ///
    /// A malformed record is rejected without touching the cache. A backend
    /// failure is reported, but the freshly cached value stays in place so
    /// reads keep being served from memory.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerCacheError::Validation`] or [`PlayerCacheError::Backend`].
    pub async fn save_player(&self, id: PlayerId, record: PlayerRecord) -> Result<(), PlayerCacheError> {
        if let Err(e) = record.validate(id) {
            tracing::warn!(player_id = %id, error = %e, "rejected malformed player record");
            return Err(e.into());
        }

        let entry = CacheEntry {
            record,
            captured_at: self.clock.now(),
        };
        let snapshot = entry.record.clone();
        self.entries.lock().await.insert(id, entry);

        match self.gateway.save(id, &snapshot).await {
            Ok(()) => {
                tracing::debug!(player_id = %id, "player record saved");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(player_id = %id, error = %e, "player record cached but not persisted");
                Err(e.into())
            }
        }
    }

    /// Fetch a player's record, from cache if fresh, otherwise from the backend.
    ///
    /// Returns `None` when nothing is stored, and also when the backend
    /// fails (the failure is logged).
    pub async fn load_player(&self, id: PlayerId) -> Option<PlayerRecord> {
        match self.try_load_player(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(player_id = %id, error = %e, "player load failed");
                None
            }
        }
    }

    /// Like [`load_player`](Self::load_player), but reports backend failure
    /// instead of folding it into `None`.
    ///
    /// Callers that would write a fresh record on a miss need this: a backend
    /// that is down must not look like a player with no saved state.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`DbError`] when the backend read fails.
    pub async fn try_load_player(&self, id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
        let now = self.clock.now();
        {
            let mut entries = self.entries.lock().await;
            match entries.get(&id) {
                Some(entry) if entry.is_fresh(now, self.timeout) => {
                    return Ok(Some(entry.record.clone()));
                }
                Some(_) => {
                    entries.remove(&id);
                    tracing::debug!(player_id = %id, "evicted expired cache entry");
                }
                None => {}
            }
        }

        let Some(record) = self.gateway.load(id).await? else {
            return Ok(None);
        };
        let mut entries = self.entries.lock().await;
        // A save that raced this load is newer than what we read.
        let entry = entries.entry(id).or_insert_with(|| CacheEntry {
            record,
            captured_at: self.clock.now(),
        });
        Ok(Some(entry.record.clone()))
    }

    /// Drop the cached entry for `id`. Returns whether one existed.
    pub async fn invalidate(&self, id: PlayerId) -> bool {
        self.entries.lock().await.remove(&id).is_some()
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.timeout));
        before.saturating_sub(entries.len())
    }

    /// Number of entries that would currently be served from memory.
    pub async fn cached_count(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_fresh(now, self.timeout))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use strata_db::MemoryStore;
    use strata_types::{GameMode, ManualClock, Position};

    use super::*;

    /// Memory store whose availability can be switched off.
    #[derive(Default)]
    struct Switchable {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl Switchable {
        fn check(&self) -> Result<(), DbError> {
            if self.down.load(Ordering::Acquire) {
                Err(DbError::Unavailable("backend offline".to_owned()))
            } else {
                Ok(())
            }
        }
    }

    impl PlayerStore for Switchable {
        async fn connect(&self) -> Result<(), DbError> {
            self.check()
        }

        async fn write(&self, id: PlayerId, record: &PlayerRecord) -> Result<(), DbError> {
            self.check()?;
            self.inner.write(id, record).await
        }

        async fn read(&self, id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
            self.check()?;
            self.inner.read(id).await
        }
    }

    fn cache_with<S: PlayerStore>(store: S) -> (PlayerCache<S>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Arc::new(PersistenceGateway::new(store, Duration::from_secs(1)));
        let cache = PlayerCache::new(gateway, TimeDelta::seconds(600), clock.clone());
        (cache, clock)
    }

    fn record(id: PlayerId, name: &str) -> PlayerRecord {
        let mut r = PlayerRecord::new(id, name, Utc::now(), Position::new(1.0, 65.0, 1.0), GameMode::Survival);
        r.inventory.insert("cobblestone".to_owned(), 32);
        r
    }

    #[tokio::test]
    async fn fresh_hit_skips_backend() {
        let (cache, clock) = cache_with(MemoryStore::new());
        let id = PlayerId::new();
        let r = record(id, "Steve");

        assert!(cache.save_player(id, r.clone()).await.is_ok());
        clock.advance(TimeDelta::seconds(599));

        assert_eq!(cache.load_player(id).await, Some(r));
        assert_eq!(cache.gateway().store().reads(), 0);
        assert_eq!(cache.gateway().store().writes(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_then_reloaded() {
        let (cache, clock) = cache_with(MemoryStore::new());
        let id = PlayerId::new();
        let r = record(id, "Steve");
        assert!(cache.save_player(id, r.clone()).await.is_ok());

        clock.advance(TimeDelta::seconds(600));
        assert_eq!(cache.cached_count().await, 0);

        assert_eq!(cache.load_player(id).await, Some(r));
        assert_eq!(cache.gateway().store().reads(), 1);
        assert_eq!(cache.cached_count().await, 1);

        assert!(cache.load_player(id).await.is_some());
        assert_eq!(cache.gateway().store().reads(), 1);
    }

    #[tokio::test]
    async fn miss_falls_through_to_backend() {
        let (cache, _) = cache_with(MemoryStore::new());
        assert_eq!(cache.load_player(PlayerId::new()).await, None);
        assert_eq!(cache.gateway().store().reads(), 1);
    }

    #[tokio::test]
    async fn malformed_record_is_not_cached() {
        let (cache, _) = cache_with(MemoryStore::new());
        let id = PlayerId::new();
        let result = cache.save_player(id, record(id, "")).await;

        assert!(matches!(result, Err(PlayerCacheError::Validation(RecordError::EmptyName(_)))));
        assert_eq!(cache.cached_count().await, 0);
        assert_eq!(cache.gateway().store().writes(), 0);
    }

    #[tokio::test]
    async fn backend_failure_on_save_keeps_cached_value() {
        let (cache, _) = cache_with(Switchable::default());
        cache.gateway().store().down.store(true, Ordering::Release);
        let id = PlayerId::new();
        let r = record(id, "Alex");

        let result = cache.save_player(id, r.clone()).await;
        assert!(matches!(result, Err(PlayerCacheError::Backend(DbError::Unavailable(_)))));
        assert_eq!(cache.load_player(id).await, Some(r));
    }

    #[tokio::test]
    async fn stale_value_is_not_served_when_backend_is_down() {
        let (cache, clock) = cache_with(Switchable::default());
        let id = PlayerId::new();
        assert!(cache.save_player(id, record(id, "Alex")).await.is_ok());

        cache.gateway().store().down.store(true, Ordering::Release);
        clock.advance(TimeDelta::minutes(11));

        assert_eq!(cache.load_player(id).await, None);
        assert!(!cache.invalidate(id).await);
    }

    #[tokio::test]
    async fn try_load_reports_backend_failure() {
        let (cache, _) = cache_with(Switchable::default());
        let id = PlayerId::new();
        assert!(cache.gateway().store().inner.write(id, &record(id, "Alex")).await.is_ok());
        cache.gateway().store().down.store(true, Ordering::Release);

        assert!(matches!(cache.try_load_player(id).await, Err(DbError::Unavailable(_))));
        assert_eq!(cache.load_player(id).await, None);

        cache.gateway().store().down.store(false, Ordering::Release);
        let back = cache.try_load_player(id).await.ok().flatten();
        assert_eq!(back.map(|r| r.name), Some("Alex".to_owned()));
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let (cache, clock) = cache_with(MemoryStore::new());
        let old = PlayerId::new();
        let new = PlayerId::new();
        assert!(cache.save_player(old, record(old, "Old")).await.is_ok());
        clock.advance(TimeDelta::seconds(400));
        assert!(cache.save_player(new, record(new, "New")).await.is_ok());
        clock.advance(TimeDelta::seconds(300));

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.cached_count().await, 1);
        assert!(cache.invalidate(new).await);
    }
}
