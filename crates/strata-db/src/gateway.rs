//! Lazy-connecting, time-boxed front door to a [`PlayerStore`].
//!
//! Every operation first ensures the backend is connected. A successful
//! connect is remembered and never repeated. A failed connect is simply
//! tried again on the next operation, with no backoff; each attempt is
//! logged, so a backend that stays down shows up as repeated warnings at
//! the call rate.
//!
//! Each backend call runs under [`tokio::time::timeout`]. The player cache
//! above never sees a hung backend, only [`DbError::Timeout`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use strata_types::{PlayerId, PlayerRecord};

use crate::error::DbError;
use crate::store::PlayerStore;

/// Default per-call backend timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Validating, lazily connected wrapper around a backend.
#[derive(Debug)]
pub struct PersistenceGateway<S> {
    /// The backend.
    store: S,
    /// Limit applied to each backend call.
    timeout: Duration,
    /// Set after the first successful connect.
    connected: AtomicBool,
    /// Total connect attempts, successful or not.
    connect_attempts: AtomicU64,
}

impl<S: PlayerStore> PersistenceGateway<S> {
    /// Wrap `store`, bounding each backend call by `timeout`.
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            connected: AtomicBool::new(false),
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// The wrapped backend.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Whether a connect has succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// How many times a connect has been attempted.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Acquire)
    }

    /// Connect if not already connected.
    ///
    /// # Errors
    ///
    /// Returns the backend's connect error, or [`DbError::Timeout`].
    pub async fn ensure_connected(&self) -> Result<(), DbError> {
        if self.is_connected() {
            return Ok(());
        }

        let attempt = self
            .connect_attempts
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);
        tracing::info!(attempt, "connecting to persistence backend");

        match self.bounded("connect", self.store.connect()).await {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                tracing::info!(attempt, "persistence backend connected");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "persistence backend connect failed");
                Err(e)
            }
        }
    }

    /// Validate and persist a value copy of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] before any I/O if the record is
    /// malformed, otherwise any connect or write failure.
    pub async fn save(&self, id: PlayerId, record: &PlayerRecord) -> Result<(), DbError> {
        record.validate(id)?;
        self.ensure_connected().await?;
        self.bounded("write", self.store.write(id, record)).await
    }

    /// Fetch the stored record for `id`; `Ok(None)` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns any connect or read failure.
    pub async fn load(&self, id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
        self.ensure_connected().await?;
        self.bounded("read", self.store.read(id)).await
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_elapsed) => Err(DbError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;
    use strata_types::{GameMode, Position};

    use super::*;
    use crate::store::MemoryStore;

    /// Fails the first `failures` connects, then succeeds.
    #[derive(Default)]
    struct FlakyConnect {
        failures: usize,
        calls: AtomicUsize,
    }

    impl PlayerStore for FlakyConnect {
        async fn connect(&self) -> Result<(), DbError> {
            let n = self.calls.fetch_add(1, Ordering::AcqRel);
            if n < self.failures {
                Err(DbError::Unavailable("connection refused".to_owned()))
            } else {
                Ok(())
            }
        }

        async fn write(&self, _id: PlayerId, _record: &PlayerRecord) -> Result<(), DbError> {
            Ok(())
        }

        async fn read(&self, _id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
            Ok(None)
        }
    }

    /// Never answers a read.
    struct Hangs;

    impl PlayerStore for Hangs {
        async fn connect(&self) -> Result<(), DbError> {
            Ok(())
        }

        async fn write(&self, _id: PlayerId, _record: &PlayerRecord) -> Result<(), DbError> {
            Ok(())
        }

        async fn read(&self, _id: PlayerId) -> Result<Option<PlayerRecord>, DbError> {
            std::future::pending().await
        }
    }

    fn record(id: PlayerId, name: &str) -> PlayerRecord {
        PlayerRecord::new(id, name, Utc::now(), Position::default(), GameMode::Survival)
    }

    #[tokio::test]
    async fn connect_happens_once() {
        let gateway = PersistenceGateway::new(MemoryStore::new(), DEFAULT_TIMEOUT);
        assert!(!gateway.is_connected());

        let id = PlayerId::new();
        assert!(gateway.save(id, &record(id, "Steve")).await.is_ok());
        assert!(gateway.load(id).await.is_ok());
        assert!(gateway.ensure_connected().await.is_ok());

        assert!(gateway.is_connected());
        assert_eq!(gateway.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn failed_connect_is_retried_on_next_call() {
        let store = FlakyConnect {
            failures: 2,
            ..FlakyConnect::default()
        };
        let gateway = PersistenceGateway::new(store, DEFAULT_TIMEOUT);
        let id = PlayerId::new();

        assert!(matches!(gateway.load(id).await, Err(DbError::Unavailable(_))));
        assert!(matches!(gateway.load(id).await, Err(DbError::Unavailable(_))));
        assert!(!gateway.is_connected());

        assert!(matches!(gateway.load(id).await, Ok(None)));
        assert!(gateway.is_connected());
        assert_eq!(gateway.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn malformed_record_is_rejected_before_io() {
        let gateway = PersistenceGateway::new(MemoryStore::new(), DEFAULT_TIMEOUT);
        let id = PlayerId::new();

        let result = gateway.save(id, &record(id, "")).await;
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert_eq!(gateway.connect_attempts(), 0);
        assert_eq!(gateway.store().writes(), 0);
    }

    #[tokio::test]
    async fn hung_backend_times_out() {
        let gateway = PersistenceGateway::new(Hangs, Duration::from_millis(20));
        let result = gateway.load(PlayerId::new()).await;
        assert!(matches!(
            result,
            Err(DbError::Timeout { operation: "read", .. })
        ));
    }
}
