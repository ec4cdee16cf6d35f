//! Session server binary for Strata.
//!
//! Loads configuration, picks a persistence backend, starts one
//! [`Session`], and runs periodic maintenance until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `strata-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Choose the backend: `Dragonfly` when a URL is configured, otherwise
//!    a detached store that keeps nothing
//! 4. Start the session
//! 5. Tick maintenance on the configured interval until Ctrl-C
//! 6. Stop the session, flushing every online player

mod error;

use std::path::Path;
use std::sync::Arc;

use strata_core::{ServerConfig, Session};
use strata_db::{DetachedStore, DragonflyStore, PlayerStore};
use strata_types::{Clock, SystemClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

const CONFIG_PATH: &str = "strata-config.yaml";

/// Application entry point for the session server.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the shutdown
/// signal cannot be installed.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("strata-server starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        max_players = config.session.max_players,
        chunk_size = config.world.chunk_size,
        chunk_idle_secs = config.world.chunk_idle_secs,
        cache_timeout_secs = config.cache.timeout_secs,
        persistence = config.persistence.dragonfly_url.as_deref().unwrap_or("detached"),
        "Configuration loaded"
    );

    // 3. Choose the backend.
    match config.persistence.dragonfly_url.clone() {
        Some(url) => run(&config, DragonflyStore::new(url)).await,
        None => {
            info!("No Dragonfly URL configured, player records will not persist");
            run(&config, DetachedStore).await
        }
    }
}

/// Run one session over `store` until Ctrl-C.
async fn run<S: PlayerStore>(config: &ServerConfig, store: S) -> Result<(), ServerError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let session = Session::new(config, store, clock)?;

    // 4. Start the session.
    session.start();

    // 5. Maintenance loop.
    let mut interval = tokio::time::interval(config.world.maintenance_interval());
    // The first tick completes immediately.
    interval.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                let report = session.maintenance_tick().await;
                let status = session.status().await;
                info!(
                    chunks_unloaded = report.chunks_unloaded,
                    cache_entries_purged = report.cache_entries_purged,
                    players_online = status.players_online,
                    chunks_loaded = status.chunks_loaded,
                    cached_players = status.cached_players,
                    "Maintenance tick"
                );
            }
        }
    }

    // 6. Stop and flush.
    let flushed = session.stop().await;
    info!(players_flushed = flushed, "strata-server stopped");

    Ok(())
}

/// Load the server configuration from `strata-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
/// Returns whether the file was found alongside the config.
fn load_config() -> Result<(ServerConfig, bool), ServerError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((ServerConfig::from_file(config_path)?, true))
    } else {
        let mut config = ServerConfig::default();
        config.persistence.apply_env_overrides();
        config.validate()?;
        Ok((config, false))
    }
}
