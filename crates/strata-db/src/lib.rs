//! Persistence layer for the Strata session server.
//!
//! The server treats persistence as an opaque player-id-keyed record store.
//! [`PersistenceGateway`] sits between the player cache and a concrete
//! [`PlayerStore`], adding validation, lazy connection, and per-call
//! timeouts.
//!
//! # Architecture
//!
//! ```text
//! PlayerCache
//!     |
//!     +-- save / load --> PersistenceGateway (validate, connect, timeout)
//!                             |
//!                             +-- DragonflyStore  (player:{id}:state JSON)
//!                             +-- MemoryStore     (in-process map)
//!                             +-- DetachedStore   (no persistence)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`PlayerStore`] trait and in-process backends
//! - [`gateway`] -- [`PersistenceGateway`]
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) backend
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod gateway;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyStore;
pub use error::DbError;
pub use gateway::{DEFAULT_TIMEOUT, PersistenceGateway};
pub use store::{DetachedStore, MemoryStore, PlayerStore};
