//! Durable session store backed by an external key-value service.
//!
//! Records are encrypted before they leave the process and carry a 24-hour
//! TTL enforced by the service. Availability beats consistency here: session
//! continuity is a convenience, not a security boundary, so every failure on
//! the durable path degrades to the in-memory fallback store instead of
//! failing the request. Nothing is retried; the remote call either works or
//! the fallback takes over immediately.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::session::{
    Cipher, Clock, SessionRecord, SessionStore, VolatileStore, session_ttl, system_clock,
};
use crate::types::SessionId;

/// Capability interface over the external key-value service.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a value; `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Write a value that the service expires after `ttl_seconds`.
    async fn put(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), KvError>;

    /// Delete a key; deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// Errors from the key-value service binding.
#[derive(Debug, Clone)]
pub enum KvError {
    /// The request never completed (network error, timeout).
    RequestFailed(String),
    /// The service answered with an unexpected status.
    UnexpectedStatus(u16),
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed(msg) => write!(f, "KV request failed: {}", msg),
            Self::UnexpectedStatus(status) => write!(f, "KV service returned HTTP {}", status),
        }
    }
}

impl std::error::Error for KvError {}

/// REST binding for a Workers-KV-style namespace.
///
/// `GET/PUT/DELETE {base_url}/values/{key}`, bearer-token auth, TTL passed
/// as the `expiration_ttl` query parameter on writes.
pub struct HttpKvBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpKvBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn value_url(&self, key: &str) -> String {
        format!("{}/values/{}", self.base_url, key)
    }
}

#[async_trait]
impl KvBackend for HttpKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let response = self
            .client
            .get(self.value_url(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| KvError::RequestFailed(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| KvError::RequestFailed(e.to_string()))?;
                Ok(Some(body))
            }
            404 => Ok(None),
            status => Err(KvError::UnexpectedStatus(status)),
        }
    }

    async fn put(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), KvError> {
        let response = self
            .client
            .put(self.value_url(key))
            .query(&[("expiration_ttl", ttl_seconds)])
            .bearer_auth(&self.token)
            .body(value)
            .send()
            .await
            .map_err(|e| KvError::RequestFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(KvError::UnexpectedStatus(response.status().as_u16()))
        }
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let response = self
            .client
            .delete(self.value_url(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| KvError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            Err(KvError::UnexpectedStatus(status.as_u16()))
        }
    }
}

/// Session store that persists encrypted records externally with an
/// in-memory fallback.
pub struct DurableStore {
    backend: Arc<dyn KvBackend>,
    cipher: Cipher,
    fallback: VolatileStore,
    clock: Arc<dyn Clock>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn KvBackend>, cipher: Cipher, fallback: VolatileStore) -> Self {
        Self {
            backend,
            cipher,
            fallback,
            clock: system_clock(),
        }
    }

    fn storage_key(id: &SessionId) -> String {
        format!("session:{}", id)
    }

    /// Read from the durable path, or `None` on any failure so the caller
    /// can consult the fallback.
    async fn durable_get(&self, id: &SessionId) -> Option<SessionRecord> {
        let sealed = match self.backend.get(&Self::storage_key(id)).await {
            Ok(Some(sealed)) => sealed,
            Ok(None) => return None,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Durable session read failed");
                return None;
            }
        };

        let plaintext = match self.cipher.open(&sealed) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Stored session record unreadable");
                return None;
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(session_id = %id, error = %e, "Stored session record undecodable");
                None
            }
        }
    }
}

#[async_trait]
impl SessionStore for DurableStore {
    async fn ensure(&self, id: &SessionId) -> SessionRecord {
        if let Some(record) = self.get(id).await {
            return record;
        }

        let record = SessionRecord {
            created_at: self.clock.now(),
        };
        self.put(id, record.clone()).await;
        record
    }

    async fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        match self.durable_get(id).await {
            Some(record) => Some(record),
            // Missing key and every failure mode read the fallback instead.
            None => self.fallback.get(id).await,
        }
    }

    async fn put(&self, id: &SessionId, record: SessionRecord) {
        let ttl_seconds = session_ttl().num_seconds() as u64;

        let sealed = serde_json::to_vec(&record)
            .ok()
            .and_then(|plaintext| self.cipher.seal(&plaintext).ok());

        match sealed {
            Some(sealed) => {
                match self
                    .backend
                    .put(&Self::storage_key(id), sealed, ttl_seconds)
                    .await
                {
                    Ok(()) => {
                        // Keep the fallback warm so reads survive a later
                        // durable-path outage.
                        self.fallback.put(id, record).await;
                    }
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "Durable session write failed, using fallback");
                        self.fallback.put(id, record).await;
                    }
                }
            }
            None => {
                warn!(session_id = %id, "Could not seal session record, using fallback");
                self.fallback.put(id, record).await;
            }
        }
    }

    async fn delete(&self, id: &SessionId) {
        if let Err(e) = self.backend.delete(&Self::storage_key(id)).await {
            debug!(session_id = %id, error = %e, "Durable session delete failed");
        }
        // Unconditional: the fallback must not serve a deleted session.
        self.fallback.delete(id).await;
    }
}
