//! Environment-driven configuration.
//!
//! Process flags (bind address, transport) come from the CLI; everything
//! secret or deployment-specific is read from the environment so the same
//! binary runs unchanged in both deployment shapes.

use std::env;
use std::fmt;

use crate::gate::RawAuthConfig;

pub const ENV_AUTH_MODE: &str = "ATLAS_AUTH";
pub const ENV_AUTH_ENABLED: &str = "ATLAS_AUTH_ENABLED";
pub const ENV_AUTH_TOKEN: &str = "ATLAS_AUTH_TOKEN";
pub const ENV_DEV_MODE: &str = "ATLAS_DEV_MODE";
pub const ENV_MAPS_API_KEY: &str = "ATLAS_MAPS_API_KEY";
pub const ENV_SESSION_KV_URL: &str = "ATLAS_SESSION_KV_URL";
pub const ENV_SESSION_KV_TOKEN: &str = "ATLAS_SESSION_KV_TOKEN";
pub const ENV_SESSION_ENCRYPTION_KEY: &str = "ATLAS_SESSION_ENCRYPTION_KEY";

/// Connection details for the durable session namespace.
#[derive(Debug, Clone)]
pub struct KvConfig {
    pub url: String,
    pub token: String,
}

/// Everything the process reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: RawAuthConfig,
    pub dev_mode: bool,
    pub maps_api_key: Option<String>,
    /// Present only when both the namespace URL and its token are set;
    /// absent means sessions stay in memory.
    pub session_kv: Option<KvConfig>,
    pub session_encryption_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the real
    /// environment, tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let kv_url = lookup(ENV_SESSION_KV_URL).filter(|v| !v.is_empty());
        let kv_token = lookup(ENV_SESSION_KV_TOKEN).filter(|v| !v.is_empty());

        let session_kv = match (kv_url, kv_token) {
            (Some(url), Some(token)) => Some(KvConfig { url, token }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Durable session store needs both {} and {}; falling back to in-memory sessions",
                    ENV_SESSION_KV_URL,
                    ENV_SESSION_KV_TOKEN
                );
                None
            }
            (None, None) => None,
        };

        Self {
            auth: RawAuthConfig {
                enabled: lookup(ENV_AUTH_ENABLED).as_deref().map(parse_bool),
                mode: lookup(ENV_AUTH_MODE).filter(|v| !v.is_empty()),
                token: lookup(ENV_AUTH_TOKEN),
            },
            dev_mode: lookup(ENV_DEV_MODE).as_deref().map(parse_bool).unwrap_or(false),
            maps_api_key: lookup(ENV_MAPS_API_KEY).filter(|v| !v.is_empty()),
            session_kv,
            session_encryption_key: lookup(ENV_SESSION_ENCRYPTION_KEY).filter(|v| !v.is_empty()),
        }
    }

    /// Startup validation; failures here abort the process before it binds.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.maps_api_key.is_none() {
            return Err(ConfigurationError::MissingMapsApiKey);
        }
        if self.session_kv.is_some() && self.session_encryption_key.is_none() {
            return Err(ConfigurationError::MissingEncryptionKey);
        }
        Ok(())
    }
}

/// Lenient boolean parsing for environment flags.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// A missing or inconsistent configuration value.
#[derive(Debug, Clone)]
pub enum ConfigurationError {
    MissingMapsApiKey,
    MissingEncryptionKey,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMapsApiKey => {
                write!(f, "{} is required to serve mapping tools", ENV_MAPS_API_KEY)
            }
            Self::MissingEncryptionKey => write!(
                f,
                "{} is required when the durable session store is configured",
                ENV_SESSION_ENCRYPTION_KEY
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}
