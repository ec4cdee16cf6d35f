//! `Dragonfly` (Redis-compatible) player-record backend.
//!
//! Records are stored as JSON strings, one key per player.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `player:{id}:state` | JSON | Full [`PlayerRecord`] |

use fred::prelude::*;
use strata_types::{PlayerId, PlayerRecord};
use tokio::sync::OnceCell;

use crate::error::DbError;
use crate::store::PlayerStore;

/// Key holding a player's serialized record.
fn player_key(id: PlayerId) -> String {
    format!("player:{id}:state")
}

/// Player store backed by a `Dragonfly` instance.
///
/// The underlying [`fred::prelude::Client`] is built on the first
/// successful [`PlayerStore::connect`] and reused afterwards. A failed
/// connect leaves the store unconnected so the next call tries again.
pub struct DragonflyStore {
    url: String,
    client: OnceCell<Client>,
}

impl core::fmt::Debug for DragonflyStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DragonflyStore")
            .field("url", &self.url)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

impl DragonflyStore {
    /// Prepare a store for the given URL without connecting.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: OnceCell::new(),
        }
    }

    /// The configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<&Client, DbError> {
        self.client
            .get()
            .ok_or_else(|| DbError::Unavailable("Dragonfly client is not connected".to_owned()))
    }

    /// Delete a player's stored record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] before connect, or
    /// [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, id: PlayerId) -> Result<(), DbError> {
        let _: u32 = self.client()?.del(player_key(id)).await?;
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client()?.flushall(false).await?;
        Ok(())
    }
}

impl PlayerStore for DragonflyStore {
    async fn connect(&self) -> Result<(), DbError> {
        self.client
            .get_or_try_init(|| async {
                let config = Config::from_url(&self.url)
                    .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;
                let client = Builder::from_config(config).build()?;
                client.init().await?;
                tracing::info!("Connected to Dragonfly");
                Ok::<_, DbError>(client)
            })
            .await?;
        Ok(())
    }

    async fn write(&self, id: PlayerId, record: &PlayerRecord) -> Result<(), DbError> {
        let json = serde_json::to_string(record)?;
        let _: () = self
            .client()?
            .set(player_key(id), json.as_str(), None, None, false)
            .await?;
        Ok(())
    }

    async fn read(&self, id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
        let value: Option<String> = self.client()?.get(player_key(id)).await?;
        value
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(DbError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_key_layout() {
        let id = PlayerId::new();
        assert_eq!(player_key(id), format!("player:{id}:state"));
    }

    #[tokio::test]
    async fn operations_before_connect_report_unavailable() {
        let store = DragonflyStore::new("redis://localhost:6379");
        assert!(matches!(
            store.read(PlayerId::new()).await,
            Err(DbError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn malformed_url_is_a_config_error() {
        let store = DragonflyStore::new("not a url");
        assert!(matches!(store.connect().await, Err(DbError::Config(_))));
    }
}
