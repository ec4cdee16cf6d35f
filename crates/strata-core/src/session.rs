//! Session orchestration: player admission, world access, maintenance.
//!
//! [`Session`] composes the player cache, the chunk store, and the event bus
//! behind one handle that the transport layer drives. It owns the roster of
//! connected players and enforces the player cap.
//!
//! # Locking
//!
//! The roster and the chunk store each sit behind their own mutex, and the
//! player cache guards its own map. No lock is held while awaiting the
//! persistence backend: joins reserve a roster slot, release the lock for the
//! load, then come back to promote the slot. Leaves work the same way in
//! reverse, so a leaving player still occupies a slot until the save attempt
//! has finished.
//!
//! A reserved slot is owned by a [`SlotRelease`] guard. If the join or leave
//! future is dropped mid-flight, the guard frees the slot so the id and the
//! capacity are not lost.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::json;
use strata_db::{PersistenceGateway, PlayerStore};
use strata_events::{EventBus, topics};
use strata_types::{BlockPos, BlockType, Clock, GameMode, PlayerId, PlayerRecord, Position};
use strata_world::ChunkStore;

use crate::config::{ConfigError, ServerConfig};
use crate::player_cache::PlayerCache;

/// Errors returned by [`Session`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session has not been started or has been stopped.
    #[error("session is not running")]
    NotRunning,

    /// The roster already holds `max_players` players.
    #[error("session is full ({max_players} players)")]
    SessionFull {
        /// Configured cap.
        max_players: usize,
    },

    /// The player already holds a roster slot.
    #[error("player {0} is already online")]
    AlreadyOnline(PlayerId),

    /// The player is not online.
    #[error("player {0} is not online")]
    NotOnline(PlayerId),

    /// Input was rejected before touching any state.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The player's stored state could not be read, so the join was refused
    /// rather than starting them over.
    #[error("player state unavailable: {0}")]
    Unavailable(String),
}

/// Where a player is in the connect/disconnect cycle.
#[derive(Debug)]
enum Slot {
    /// Reserved while the stored record is loaded.
    Joining,
    /// Fully admitted.
    Online(PlayerRecord),
    /// Removed from play; the final save is in flight.
    Leaving,
}

type Roster = BTreeMap<PlayerId, Slot>;

fn lock(roster: &Mutex<Roster>) -> MutexGuard<'_, Roster> {
    roster.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frees a `Joining` or `Leaving` slot unless the owner settles it first.
struct SlotRelease<'a> {
    roster: &'a Mutex<Roster>,
    id: PlayerId,
    armed: bool,
}

impl<'a> SlotRelease<'a> {
    const fn new(roster: &'a Mutex<Roster>, id: PlayerId) -> Self {
        Self {
            roster,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let released = {
            let mut roster = lock(self.roster);
            match roster.get(&self.id) {
                Some(Slot::Joining | Slot::Leaving) => roster.remove(&self.id).is_some(),
                _ => false,
            }
        };
        if released {
            tracing::debug!(player_id = %self.id, "released unsettled roster slot");
        }
    }
}

/// Point-in-time counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Whether the session accepts players.
    pub running: bool,
    /// Fully admitted players.
    pub players_online: usize,
    /// Player cap.
    pub max_players: usize,
    /// Chunks currently loaded.
    pub chunks_loaded: usize,
    /// Player records served from memory right now.
    pub cached_players: usize,
}

/// What a maintenance tick cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MaintenanceReport {
    /// Chunks evicted for exceeding the idle threshold.
    pub chunks_unloaded: usize,
    /// Expired player-cache entries dropped.
    pub cache_entries_purged: usize,
}

/// One running game session.
#[derive(Debug)]
pub struct Session<S> {
    max_players: usize,
    default_game_mode: GameMode,
    spawn: Position,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    players: PlayerCache<S>,
    world: tokio::sync::Mutex<ChunkStore>,
    roster: Mutex<Roster>,
    running: AtomicBool,
}

impl<S: PlayerStore> Session<S> {
    /// Build a stopped session over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(config: &ServerConfig, store: S, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let events = Arc::new(EventBus::new());
        let gateway = Arc::new(PersistenceGateway::new(store, config.persistence.timeout()));
        let players = PlayerCache::new(gateway, config.cache.timeout(), Arc::clone(&clock));
        let world = ChunkStore::new(
            config.world.chunk_size()?,
            config.world.chunk_idle(),
            Arc::clone(&clock),
        )
        .with_events(Arc::clone(&events));

        Ok(Self {
            max_players: config.session.max_players,
            default_game_mode: config.session.default_game_mode()?,
            spawn: config.session.spawn,
            clock,
            events,
            players,
            world: tokio::sync::Mutex::new(world),
            roster: Mutex::new(BTreeMap::new()),
            running: AtomicBool::new(false),
        })
    }

    /// The bus lifecycle events are published on.
    pub const fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The player cache.
    pub const fn players(&self) -> &PlayerCache<S> {
        &self.players
    }

    /// Whether the session accepts players.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------

    /// Begin accepting players. Returns `false` if already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::info!(max_players = self.max_players, "session started");
        self.events.fire(topics::SESSION_STARTED, &json!({}));
        true
    }

    /// Stop accepting players, then save and disconnect everyone online.
    ///
    /// Saves are best-effort. Returns the number of players whose save
    /// succeeded.
    pub async fn stop(&self) -> usize {
        if !self.running.swap(false, Ordering::AcqRel) {
            return 0;
        }

        let departing: Vec<(PlayerRecord, SlotRelease<'_>)> = {
            let mut roster = lock(&self.roster);
            let ids: Vec<PlayerId> = roster
                .iter()
                .filter(|(_, slot)| matches!(slot, Slot::Online(_)))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| match roster.insert(id, Slot::Leaving) {
                    Some(Slot::Online(record)) => Some((record, SlotRelease::new(&self.roster, id))),
                    _ => None,
                })
                .collect()
        };

        let mut saved: usize = 0;
        for (record, departure) in departing {
            if self.finish_leave(record, departure).await {
                saved = saved.saturating_add(1);
            }
        }

        tracing::info!(players_saved = saved, "session stopped");
        self.events
            .fire(topics::SESSION_STOPPED, &json!({ "players_saved": saved }));
        saved
    }

    // -------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------

    /// Admit a player, restoring their stored record if one exists.
    ///
    /// New players get the configured default game mode and spawn point.
    /// A failed save does not block the join; it is logged and the record is
    /// still cached.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] (also when the session stops
    /// while the join is in flight), [`SessionError::Validation`] for a blank
    /// name, [`SessionError::AlreadyOnline`], [`SessionError::SessionFull`],
    /// or [`SessionError::Unavailable`] when the stored record cannot be
    /// read. None of these leave a slot behind.
    pub async fn add_player(&self, id: PlayerId, name: &str) -> Result<PlayerRecord, SessionError> {
        if !self.is_running() {
            return Err(SessionError::NotRunning);
        }
        if name.trim().is_empty() {
            return Err(SessionError::Validation("player name is empty".to_owned()));
        }

        {
            let mut roster = lock(&self.roster);
            if roster.contains_key(&id) {
                return Err(SessionError::AlreadyOnline(id));
            }
            if roster.len() >= self.max_players {
                tracing::warn!(player_id = %id, max_players = self.max_players, "join rejected, session full");
                return Err(SessionError::SessionFull {
                    max_players: self.max_players,
                });
            }
            roster.insert(id, Slot::Joining);
        }
        let reservation = SlotRelease::new(&self.roster, id);

        let stored = match self.players.try_load_player(id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(player_id = %id, error = %e, "join refused, stored state unreadable");
                return Err(SessionError::Unavailable(e.to_string()));
            }
        };
        let now = self.clock.now();
        let mut record = stored.unwrap_or_else(|| {
            PlayerRecord::new(id, name, now, self.spawn, self.default_game_mode)
        });
        name.clone_into(&mut record.name);
        record.joined_at = now;

        if let Err(e) = self.players.save_player(id, record.clone()).await {
            tracing::warn!(player_id = %id, error = %e, "join continues without persisted record");
        }

        let online = {
            let mut roster = lock(&self.roster);
            // Checked under the roster lock: `stop` flips the flag before it
            // drains, so a join either lands before the drain or sees the stop.
            if self.is_running() {
                roster.insert(id, Slot::Online(record.clone()));
                Some(online_count(&roster))
            } else {
                None
            }
        };
        let Some(online) = online else {
            tracing::info!(player_id = %id, "join abandoned, session stopped");
            return Err(SessionError::NotRunning);
        };
        reservation.disarm();

        tracing::info!(player_id = %id, name = name, online, "player joined");
        self.events.fire(
            topics::PLAYER_JOIN,
            &json!({ "player_id": id, "name": name, "game_mode": record.game_mode }),
        );
        Ok(record)
    }

    /// Disconnect a player after a best-effort save.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotOnline`] if the player holds no online
    /// slot; nothing changes and no event fires.
    pub async fn remove_player(&self, id: PlayerId) -> Result<PlayerRecord, SessionError> {
        let record = {
            let mut roster = lock(&self.roster);
            match roster.get(&id) {
                Some(Slot::Online(_)) => {}
                _ => return Err(SessionError::NotOnline(id)),
            }
            match roster.insert(id, Slot::Leaving) {
                Some(Slot::Online(record)) => record,
                _ => return Err(SessionError::NotOnline(id)),
            }
        };

        let departure = SlotRelease::new(&self.roster, id);
        self.finish_leave(record.clone(), departure).await;
        Ok(record)
    }

    /// Save, release the roster slot, and announce the departure.
    async fn finish_leave(&self, record: PlayerRecord, departure: SlotRelease<'_>) -> bool {
        let id = record.id;
        let name = record.name.clone();
        let saved = match self.players.save_player(id, record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(player_id = %id, error = %e, "final save failed, removing anyway");
                false
            }
        };

        let online = {
            let mut roster = lock(&self.roster);
            roster.remove(&id);
            online_count(&roster)
        };
        departure.disarm();

        tracing::info!(player_id = %id, saved, online, "player left");
        self.events.fire(
            topics::PLAYER_LEAVE,
            &json!({ "player_id": id, "name": name, "saved": saved }),
        );
        saved
    }

    /// Update an online player's position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Validation`] for a non-finite position or
    /// [`SessionError::NotOnline`].
    pub fn move_player(&self, id: PlayerId, position: Position) -> Result<(), SessionError> {
        if !position.is_finite() {
            return Err(SessionError::Validation(format!(
                "non-finite position for player {id}"
            )));
        }
        let mut roster = lock(&self.roster);
        let Some(Slot::Online(record)) = roster.get_mut(&id) else {
            return Err(SessionError::NotOnline(id));
        };
        record.position = position;
        Ok(())
    }

    /// The live record of an online player.
    pub fn player(&self, id: PlayerId) -> Option<PlayerRecord> {
        let roster = lock(&self.roster);
        match roster.get(&id) {
            Some(Slot::Online(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Number of fully admitted players.
    pub fn player_count(&self) -> usize {
        online_count(&lock(&self.roster))
    }

    // -------------------------------------------------------------------
    // World
    // -------------------------------------------------------------------

    /// The block at `pos`, without loading its chunk.
    pub async fn get_block(&self, pos: BlockPos) -> Option<BlockType> {
        self.world.lock().await.get_block(pos).cloned()
    }

    /// Place a block, loading its chunk if needed. Returns the previous block.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Validation`] for a blank block identifier.
    pub async fn set_block(&self, pos: BlockPos, block: BlockType) -> Result<Option<BlockType>, SessionError> {
        if !block.is_valid() {
            return Err(SessionError::Validation(format!("blank block type at {pos}")));
        }
        Ok(self.world.lock().await.set_block(pos, block))
    }

    /// Reset a block to air without loading its chunk.
    pub async fn clear_block(&self, pos: BlockPos) -> Option<BlockType> {
        self.world.lock().await.remove_block(pos)
    }

    // -------------------------------------------------------------------
    // Monitoring & maintenance
    // -------------------------------------------------------------------

    /// Current counters.
    pub async fn status(&self) -> SessionStatus {
        let players_online = self.player_count();
        let chunks_loaded = self.world.lock().await.loaded_count();
        SessionStatus {
            running: self.is_running(),
            players_online,
            max_players: self.max_players,
            chunks_loaded,
            cached_players: self.players.cached_count().await,
        }
    }

    /// Evict idle chunks and expired cache entries.
    pub async fn maintenance_tick(&self) -> MaintenanceReport {
        let chunks_unloaded = self.world.lock().await.optimize_memory();
        let cache_entries_purged = self.players.purge_expired().await;
        let report = MaintenanceReport {
            chunks_unloaded,
            cache_entries_purged,
        };
        tracing::debug!(
            chunks_unloaded = report.chunks_unloaded,
            cache_entries_purged = report.cache_entries_purged,
            "maintenance tick"
        );
        report
    }
}

fn online_count(roster: &Roster) -> usize {
    roster
        .values()
        .filter(|slot| matches!(slot, Slot::Online(_)))
        .count()
}
