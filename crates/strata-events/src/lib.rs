//! Synchronous event dispatch for the Strata session server.
//!
//! State changes (players joining or leaving, chunks loading or unloading)
//! are published on named topics. Reactions subscribe with a [`Listener`].
//! A failing listener is logged and skipped: it can neither break delivery
//! to the other listeners nor surface as an error to the publisher.
//!
//! # Modules
//!
//! - [`bus`] -- [`EventBus`], [`Listener`], [`DispatchReport`]
//! - [`error`] -- [`ListenerError`]
//! - [`topics`] -- Well-known topic names

pub mod bus;
pub mod error;
pub mod topics;

pub use bus::{DispatchReport, EventBus, Listener};
pub use error::ListenerError;
