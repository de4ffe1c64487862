//! In-memory stop-signal store.
//!
//! Entries are single-writer (the cancelling client) / single-reader
//! (the active request handler for that connection id) and carry an
//! expiry so an unconsumed signal is reclaimed automatically. Expired
//! entries are purged lazily on access.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ragline_core::signal::{StopSignal, StopSignalStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryStopStore {
    signals: RwLock<HashMap<String, StopSignal>>,
    ttl: Duration,
}

impl InMemoryStopStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            signals: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    async fn purge_expired(&self) {
        let now = Utc::now();
        let mut signals = self.signals.write().await;
        signals.retain(|_, signal| !signal.is_expired(now));
    }

    pub async fn len(&self) -> usize {
        self.signals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.signals.read().await.is_empty()
    }
}

impl Default for InMemoryStopStore {
    fn default() -> Self {
        Self::new(60)
    }
}

#[async_trait]
impl StopSignalStore for InMemoryStopStore {
    async fn set(&self, connection_id: &str) {
        let now = Utc::now();
        let signal = StopSignal {
            connection_id: connection_id.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        debug!(connection_id = %connection_id, "Stop signal set");
        self.signals
            .write()
            .await
            .insert(connection_id.to_string(), signal);
    }

    async fn check(&self, connection_id: &str) -> bool {
        self.purge_expired().await;
        self.signals.read().await.contains_key(connection_id)
    }

    async fn clear(&self, connection_id: &str) {
        self.signals.write().await.remove(connection_id);
    }
}
