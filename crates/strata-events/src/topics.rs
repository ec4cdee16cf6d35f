//! Well-known topic names published by the session server.

/// A player joined the session. Payload: `{ "player_id", "name" }`.
pub const PLAYER_JOIN: &str = "player_join";

/// A player left the session. Payload: `{ "player_id", "name", "saved" }`.
pub const PLAYER_LEAVE: &str = "player_leave";

/// A chunk was created in the store. Payload: `{ "x", "z" }`.
pub const CHUNK_LOADED: &str = "chunk_loaded";

/// A chunk was evicted from the store. Payload: `{ "x", "z" }`.
pub const CHUNK_UNLOADED: &str = "chunk_unloaded";

/// The session began accepting players.
pub const SESSION_STARTED: &str = "session_started";

/// The session stopped. Payload: `{ "players_saved" }`.
pub const SESSION_STOPPED: &str = "session_stopped";
