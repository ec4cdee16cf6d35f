//! Block world storage for the Strata session server.
//!
//! The world is a sparse grid of blocks split into fixed-width chunk columns.
//! Chunks are created on first write or explicit load and evicted by age.
//!
//! # Modules
//!
//! - [`chunk`] -- [`Chunk`]: block and entity data for one column
//! - [`chunk_store`] -- [`ChunkStore`]: addressing, lazy loading, eviction

pub mod chunk;
pub mod chunk_store;

pub use chunk::Chunk;
pub use chunk_store::{ChunkStore, DEFAULT_IDLE_THRESHOLD};
