//! Stop signal — out-of-band cancellation of in-flight generation.
//!
//! The store is externally owned; the core only reads/writes through this
//! narrow check/set/clear interface. Signals are polled, not pushed: the
//! design accepts bounded latency between a cancellation request and the
//! actual halt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cancellation record for one connection.
///
/// Single-writer (the cancelling client) / single-reader (the active
/// request handler for that connection id). Carries an expiry so an
/// unconsumed signal is reclaimed automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSignal {
    pub connection_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StopSignal {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Narrow interface over the externally-owned stop signal store.
#[async_trait]
pub trait StopSignalStore: Send + Sync {
    /// Record a cancellation request for a connection.
    async fn set(&self, connection_id: &str);

    /// Whether an unexpired signal exists for the connection.
    async fn check(&self, connection_id: &str) -> bool;

    /// Remove the signal (on completion or consumption).
    async fn clear(&self, connection_id: &str);
}
