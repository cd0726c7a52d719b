//! Authentication policy resolution.
//!
//! Turns the raw configuration supplied by the config loader into an
//! enforcement strategy for the request gate. Validation collects errors
//! into a list instead of failing, so startup can report every problem
//! at once.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the gate authenticates inbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// No authentication; every request that passes the origin and
    /// protocol-version checks is admitted.
    None,
    /// Shared-secret bearer token in the `Authorization` header.
    Bearer,
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bearer => write!(f, "bearer"),
        }
    }
}

/// Raw authentication knobs as read from the environment.
///
/// Nothing here is validated; `AuthSettings::resolve` interprets the
/// combination and `AuthSettings::validate` reports inconsistencies.
#[derive(Debug, Clone, Default)]
pub struct RawAuthConfig {
    /// Explicit enable/disable flag. `Some(false)` always wins.
    pub enabled: Option<bool>,
    /// Strategy selector: "bearer" or "none".
    pub mode: Option<String>,
    /// The shared bearer secret, if configured.
    pub token: Option<String>,
}

/// Resolved authentication settings used by the request gate.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub strategy: AuthStrategy,
    pub secret: Option<String>,
}

impl AuthSettings {
    /// Settings for unauthenticated local operation.
    pub fn disabled() -> Self {
        Self {
            strategy: AuthStrategy::None,
            secret: None,
        }
    }

    /// Settings for bearer-token authentication with the given secret.
    pub fn bearer(secret: impl Into<String>) -> Self {
        Self {
            strategy: AuthStrategy::Bearer,
            secret: Some(secret.into()),
        }
    }

    /// Resolve raw configuration into an enforcement strategy.
    ///
    /// Precedence: an explicit "none" selector or disable flag always wins;
    /// otherwise a configured secret or an explicit enable flag selects
    /// bearer; otherwise authentication is off.
    pub fn resolve(raw: &RawAuthConfig) -> Self {
        let mode = raw.mode.as_deref().map(str::trim);
        let token = raw
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if mode == Some("none") || raw.enabled == Some(false) {
            return Self::disabled();
        }

        if let Some(m) = mode
            && m != "bearer"
        {
            warn!(mode = m, "Unknown auth mode, falling back to heuristics");
        }

        if token.is_some() || raw.enabled == Some(true) || mode == Some("bearer") {
            return Self {
                strategy: AuthStrategy::Bearer,
                secret: token,
            };
        }

        Self::disabled()
    }

    /// Check the resolved settings for inconsistencies.
    ///
    /// Returns an empty list when the configuration is usable. Never panics:
    /// the caller decides whether to abort startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.strategy == AuthStrategy::Bearer
            && self.secret.as_deref().is_none_or(|s| s.is_empty())
        {
            errors.push(ConfigError::MissingBearerSecret);
        }
        errors
    }

    /// Whether the gate must see credentials on every request.
    pub fn requires_auth(&self) -> bool {
        self.strategy != AuthStrategy::None
    }
}

/// Configuration problems detected while resolving auth settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Bearer strategy selected but no secret configured.
    MissingBearerSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBearerSecret => {
                write!(f, "Bearer authentication enabled but no token configured")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_is_none() {
        let settings = AuthSettings::resolve(&RawAuthConfig::default());
        assert_eq!(settings.strategy, AuthStrategy::None);
        assert!(!settings.requires_auth());
    }

    #[test]
    fn test_resolve_explicit_none_wins_over_token() {
        let raw = RawAuthConfig {
            mode: Some("none".to_string()),
            token: Some("abc123".to_string()),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        assert_eq!(settings.strategy, AuthStrategy::None);
    }

    #[test]
    fn test_resolve_disable_flag_wins() {
        let raw = RawAuthConfig {
            enabled: Some(false),
            token: Some("abc123".to_string()),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        assert_eq!(settings.strategy, AuthStrategy::None);
    }

    #[test]
    fn test_resolve_token_implies_bearer() {
        let raw = RawAuthConfig {
            token: Some("abc123".to_string()),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        assert_eq!(settings.strategy, AuthStrategy::Bearer);
        assert_eq!(settings.secret.as_deref(), Some("abc123"));
        assert!(settings.requires_auth());
    }

    #[test]
    fn test_resolve_enabled_without_token_is_bearer() {
        let raw = RawAuthConfig {
            enabled: Some(true),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        assert_eq!(settings.strategy, AuthStrategy::Bearer);
        assert!(settings.secret.is_none());
    }

    #[test]
    fn test_resolve_blank_token_treated_as_missing() {
        let raw = RawAuthConfig {
            mode: Some("bearer".to_string()),
            token: Some("   ".to_string()),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        assert_eq!(settings.strategy, AuthStrategy::Bearer);
        assert!(settings.secret.is_none());
    }

    #[test]
    fn test_validate_bearer_without_secret() {
        let raw = RawAuthConfig {
            enabled: Some(true),
            ..Default::default()
        };
        let settings = AuthSettings::resolve(&raw);
        let errors = settings.validate();
        assert_eq!(errors, vec![ConfigError::MissingBearerSecret]);
        assert!(
            errors[0].to_string().contains("no token configured"),
            "unexpected message: {}",
            errors[0]
        );
    }

    #[test]
    fn test_validate_ok_configs() {
        assert!(AuthSettings::disabled().validate().is_empty());
        assert!(AuthSettings::bearer("abc123").validate().is_empty());
    }
}
