//! Session continuity for MCP clients.
//!
//! A session record marks that a logical session exists and when it was
//! first seen; it carries no secrets and has nothing to do with whether a
//! request is authenticated. Two store implementations back it:
//!
//! - [`VolatileStore`]: in-process, TTL-based, lost on restart. Used by the
//!   long-running shape and as the fallback for the durable store.
//! - [`DurableStore`]: encrypted records in an external key-value service,
//!   for the stateless shape where nothing survives between invocations.
//!
//! Stores are constructed at startup and passed to the gate adapters as
//! explicit dependencies; there is no process-wide global.
//!
//! The [`SessionStore`] surface is infallible: storage faults degrade to the
//! fallback path inside the store and never reach request handling.

mod crypto;
mod durable;
mod volatile;

pub use crypto::{Cipher, CryptoError};
pub use durable::{DurableStore, HttpKvBackend, KvBackend, KvError};
pub use volatile::{SweeperHandle, VolatileStore};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// How long a session record lives without being refreshed.
pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

/// Interval between background sweeps of the volatile store.
pub const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Minimal per-session state: only existence and creation time matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub created_at: DateTime<Utc>,
}

/// Capability set for session persistence, keyed by session id.
///
/// All operations absorb storage failures internally; `delete` in
/// particular must never fail its caller.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a record with `created_at = now` only if absent. Idempotent:
    /// never overwrites an existing record's `created_at`.
    async fn ensure(&self, id: &SessionId) -> SessionRecord;

    /// The record, or `None` if never created or expired.
    async fn get(&self, id: &SessionId) -> Option<SessionRecord>;

    /// Upsert the record and reset its TTL clock.
    async fn put(&self, id: &SessionId, record: SessionRecord);

    /// Remove the record.
    async fn delete(&self, id: &SessionId);
}

/// Time source, injectable so TTL behavior is testable with a simulated
/// clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::*;
    use std::sync::Mutex;

    /// Manually advanced clock for TTL tests.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
