//! Player cache, configuration, and session orchestration for Strata.
//!
//! This crate wires the leaf subsystems together. The [`Session`] owns the
//! player roster and exposes the operations the transport layer calls:
//! join/leave, block get/set, status, and the periodic maintenance tick.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `strata-config.yaml` into
//!   strongly-typed structs.
//! - [`player_cache`] -- TTL cache over the persistence gateway.
//! - [`session`] -- [`Session`], roster management, and monitoring.

pub mod config;
pub mod player_cache;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use player_cache::{CacheEntry, PlayerCache, PlayerCacheError};
pub use session::{MaintenanceReport, Session, SessionError, SessionStatus};
