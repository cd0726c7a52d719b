//! In-process session store with TTL-based expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::{Clock, SessionRecord, SessionStore, session_ttl, system_clock};
use crate::types::SessionId;

/// A stored record plus its expiry deadline.
///
/// Invariant: `expires_at = write_time + TTL`. A read after `expires_at`
/// behaves as absent.
#[derive(Debug, Clone)]
struct SessionEntry {
    record: SessionRecord,
    expires_at: DateTime<Utc>,
}

/// Process-local session store.
///
/// Every operation is a single map mutation under the lock, so concurrent
/// requests on the same id race harmlessly (last writer wins, consistent
/// with TTL semantics). Expiry is enforced lazily on read and by the
/// periodic sweep; both check the deadline independently.
#[derive(Clone)]
pub struct VolatileStore {
    entries: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl VolatileStore {
    /// Store with the standard 24-hour TTL and wall-clock time.
    pub fn new() -> Self {
        Self::with_ttl(session_ttl())
    }

    /// Store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock: system_clock(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    /// Evict every entry past its deadline. Called by the sweeper; also
    /// usable directly for deterministic tests.
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Swept expired session records");
        }
        evicted
    }

    /// Number of live (non-expired) records.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start the background sweep on the standard interval.
    ///
    /// The task wakes every [`super::SWEEP_INTERVAL`], evicts expired
    /// entries, and exits when the returned handle is stopped. While idle it
    /// is parked in the runtime and does not hold the process alive.
    pub fn start_sweeper(&self) -> SweeperHandle {
        self.start_sweeper_with_interval(super::SWEEP_INTERVAL)
    }

    fn start_sweeper_with_interval(&self, period: std::time::Duration) -> SweeperHandle {
        let store = self.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the sweep
            // runs on the period, not at startup.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        store.evict_expired().await;
                    }
                }
            }
            debug!("Session sweeper stopped");
        });

        SweeperHandle { token, handle }
    }
}

impl Default for VolatileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for VolatileStore {
    async fn ensure(&self, id: &SessionId) -> SessionRecord {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(id)
            && entry.expires_at > now
        {
            return entry.record.clone();
        }

        let record = SessionRecord { created_at: now };
        entries.insert(
            id.clone(),
            SessionEntry {
                record: record.clone(),
                expires_at: now + self.ttl,
            },
        );
        record
    }

    async fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        match entries.get(id) {
            Some(entry) if entry.expires_at > now => Some(entry.record.clone()),
            Some(_) => {
                // Lazy expiry: past-deadline entries behave as absent.
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    async fn put(&self, id: &SessionId, record: SessionRecord) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.insert(
            id.clone(),
            SessionEntry {
                record,
                expires_at: now + self.ttl,
            },
        );
    }

    async fn delete(&self, id: &SessionId) {
        let mut entries = self.entries.lock().await;
        entries.remove(id);
    }
}

/// Handle to the background sweep task.
pub struct SweeperHandle {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_clock::ManualClock;

    fn store_with_manual_clock(ttl_ms: i64) -> (VolatileStore, Arc<ManualClock>) {
        let clock = ManualClock::starting_at(Utc::now());
        let store = VolatileStore::with_clock(Duration::milliseconds(ttl_ms), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let (store, clock) = store_with_manual_clock(10_000);
        let id = SessionId::new("sess-1");

        let first = store.ensure(&id).await;
        clock.advance(Duration::milliseconds(50));
        let second = store.ensure(&id).await;

        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_get_respects_ttl_boundary() {
        let (store, clock) = store_with_manual_clock(1000);
        let id = SessionId::new("sess-1");

        store
            .put(&id, SessionRecord { created_at: clock.now() })
            .await;

        clock.advance(Duration::milliseconds(999));
        assert!(store.get(&id).await.is_some(), "present at t=999");

        clock.advance(Duration::milliseconds(2));
        assert!(store.get(&id).await.is_none(), "absent at t=1001");
    }

    #[tokio::test]
    async fn test_put_resets_ttl_clock() {
        let (store, clock) = store_with_manual_clock(1000);
        let id = SessionId::new("sess-1");
        let record = store.ensure(&id).await;

        clock.advance(Duration::milliseconds(900));
        store.put(&id, record.clone()).await;

        // 900ms after the refresh; would be expired relative to the
        // original write.
        clock.advance(Duration::milliseconds(900));
        assert_eq!(store.get(&id).await, Some(record));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (store, _clock) = store_with_manual_clock(10_000);
        let id = SessionId::new("sess-1");

        store.ensure(&id).await;
        store.delete(&id).await;
        assert!(store.get(&id).await.is_none());

        // Deleting an absent record is fine.
        store.delete(&id).await;
    }

    #[tokio::test]
    async fn test_evict_expired_sweeps_only_stale_entries() {
        let (store, clock) = store_with_manual_clock(1000);
        let stale = SessionId::new("stale");
        let fresh = SessionId::new("fresh");

        store.ensure(&stale).await;
        clock.advance(Duration::milliseconds(600));
        store.ensure(&fresh).await;
        clock.advance(Duration::milliseconds(600));

        // `stale` is 1200ms old, `fresh` 600ms.
        let evicted = store.evict_expired().await;
        assert_eq!(evicted, 1);
        assert!(store.get(&stale).await.is_none());
        assert!(store.get(&fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_ensure_recreates_after_expiry() {
        let (store, clock) = store_with_manual_clock(1000);
        let id = SessionId::new("sess-1");

        let first = store.ensure(&id).await;
        clock.advance(Duration::milliseconds(1500));
        let second = store.ensure(&id).await;

        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_sweeper_stops_cleanly() {
        let store = VolatileStore::new();
        let sweeper = store.start_sweeper_with_interval(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        sweeper.stop().await;
    }
}
