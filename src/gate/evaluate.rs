//! Pure request-admission logic.
//!
//! `evaluate` is the single decision function both deployment shapes share.
//! It sees only a [`HeaderSource`] snapshot, an optional session id, and the
//! resolved [`GateSettings`]; it touches no I/O and no shared mutable state,
//! so every request is evaluated independently. Adapters translate the
//! returned [`Decision`] into their transport's response mechanism.

use std::fmt;

use serde_json::{Value, json};
use url::Url;

use crate::gate::context::AuthContext;
use crate::gate::headers::HeaderSource;
use crate::gate::policy::AuthSettings;
use crate::types::SessionId;

/// Header carrying the logical session identifier.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// The single protocol version this server speaks.
pub const SUPPORTED_PROTOCOL_VERSION: &str = "2025-06-18";

/// JSON-RPC error code used for all 401 challenges.
const CHALLENGE_ERROR_CODE: i64 = -32001;

/// JSON-RPC error code for unexpected validation failures (500).
const INTERNAL_ERROR_CODE: i64 = -32603;

/// Settings the gate consults on every request.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub auth: AuthSettings,
    /// Relaxes the origin check for development against non-loopback hosts.
    pub dev_mode: bool,
}

impl GateSettings {
    pub fn new(auth: AuthSettings) -> Self {
        Self {
            auth,
            dev_mode: false,
        }
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}

/// Why a request was refused admission.
///
/// Every variant maps to a 401 challenge. Messages are intentionally
/// reason-specific; see DESIGN.md for the trade-off discussion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    /// `Origin` header present but not an allowed origin.
    OriginRejected,
    /// Protocol-version header present but not the supported version.
    ProtocolVersionMismatch,
    /// `Authorization` header absent or not a `Bearer` credential.
    BearerMissing,
    /// Presented token does not match the configured secret.
    BearerInvalid,
    /// Bearer strategy active but no secret configured server-side.
    ServerMisconfigured,
}

impl GateRejection {
    /// The `error` attribute for the `WWW-Authenticate` header, when one
    /// applies (RFC 6750 defines attributes only for token problems).
    fn www_authenticate_error(&self) -> Option<&'static str> {
        match self {
            Self::BearerMissing => None,
            Self::BearerInvalid => Some("invalid_token"),
            Self::ServerMisconfigured => None,
            Self::OriginRejected | Self::ProtocolVersionMismatch => None,
        }
    }
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OriginRejected => write!(f, "Origin not allowed"),
            Self::ProtocolVersionMismatch => write!(
                f,
                "Unsupported protocol version (server supports {})",
                SUPPORTED_PROTOCOL_VERSION
            ),
            Self::BearerMissing => write!(f, "Authorization token required"),
            Self::BearerInvalid => write!(f, "Invalid token"),
            Self::ServerMisconfigured => write!(f, "Server authentication misconfigured"),
        }
    }
}

/// A 401 challenge instructing the client to correct its request.
///
/// Produced by `evaluate`, rendered by an adapter, never stored.
#[derive(Debug, Clone)]
pub struct Challenge {
    reason: GateRejection,
    session_id: SessionId,
}

impl Challenge {
    pub fn status(&self) -> u16 {
        401
    }

    pub fn reason(&self) -> &GateRejection {
        &self.reason
    }

    /// Session id echoed back so the client can continue the same logical
    /// session on retry.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Value for the `WWW-Authenticate` response header.
    pub fn www_authenticate(&self) -> String {
        match self.reason.www_authenticate_error() {
            Some(error) => format!("Bearer realm=\"MCP\", error=\"{}\"", error),
            None => "Bearer realm=\"MCP\"".to_string(),
        }
    }

    /// JSON-RPC-shaped response body.
    pub fn body(&self) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": CHALLENGE_ERROR_CODE,
                "message": self.reason.to_string(),
            },
            "id": null,
        })
    }
}

/// Outcome of gate evaluation.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Forward the request to tool dispatch with this context attached.
    Admit(AuthContext),
    /// Terminate the request with this challenge.
    Reject(Challenge),
}

/// Evaluate a request for admission.
///
/// Checks run in a fixed order and short-circuit on the first failure:
/// origin, protocol version, auth bypass, bearer presence, bearer match.
/// The bearer comparison is stateless; no "already authenticated" state is
/// ever cached between requests.
pub fn evaluate(
    headers: &dyn HeaderSource,
    session_id: Option<&str>,
    settings: &GateSettings,
) -> Decision {
    let reject = |reason: GateRejection| {
        let session_id = session_id
            .map(SessionId::from)
            .unwrap_or_else(SessionId::generate);
        Decision::Reject(Challenge { reason, session_id })
    };

    if let Some(origin) = headers.get("origin")
        && !origin_allowed(origin, settings.dev_mode)
    {
        return reject(GateRejection::OriginRejected);
    }

    if let Some(version) = headers.get(PROTOCOL_VERSION_HEADER)
        && version != SUPPORTED_PROTOCOL_VERSION
    {
        return reject(GateRejection::ProtocolVersionMismatch);
    }

    if !settings.auth.requires_auth() {
        return Decision::Admit(AuthContext::unauthenticated());
    }

    let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
    else {
        return reject(GateRejection::BearerMissing);
    };

    let Some(secret) = settings.auth.secret.as_deref() else {
        return reject(GateRejection::ServerMisconfigured);
    };

    if token != secret {
        return reject(GateRejection::BearerInvalid);
    }

    Decision::Admit(AuthContext::bearer(format!("Bearer {}", token)))
}

/// Whether an `Origin` value is acceptable.
///
/// Outside dev mode only loopback origins are allowed, since the server is
/// meant to be reached by local agent processes. The check is on the parsed
/// host, so any scheme or port is fine.
fn origin_allowed(origin: &str, dev_mode: bool) -> bool {
    if dev_mode {
        return true;
    }

    let Ok(url) = Url::parse(origin) else {
        return false;
    };

    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

/// JSON-RPC body for an unexpected failure during validation.
///
/// Deliberately generic: internal details go to the log, not the client.
pub fn internal_error_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": INTERNAL_ERROR_CODE,
            "message": "Internal error during request validation",
        },
        "id": null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::headers::RequestHeaders;
    use crate::gate::policy::AuthStrategy;

    fn bearer_settings(secret: &str) -> GateSettings {
        GateSettings::new(AuthSettings::bearer(secret))
    }

    fn open_settings() -> GateSettings {
        GateSettings::new(AuthSettings::disabled())
    }

    #[test]
    fn test_missing_authorization_rejects_with_challenge() {
        let headers = RequestHeaders::from_pairs([("origin", "http://127.0.0.1")]);
        let decision = evaluate(&headers, Some("sess-1"), &bearer_settings("abc123"));

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(challenge.status(), 401);
        assert_eq!(*challenge.reason(), GateRejection::BearerMissing);
        assert_eq!(challenge.session_id().as_str(), "sess-1");
        assert!(challenge.www_authenticate().starts_with("Bearer realm=\"MCP\""));
    }

    #[test]
    fn test_missing_authorization_generates_session_id() {
        let headers = RequestHeaders::from_pairs([] as [(&str, &str); 0]);
        let decision = evaluate(&headers, None, &bearer_settings("abc123"));

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        // Freshly generated UUID v4.
        assert_eq!(challenge.session_id().as_str().len(), 36);
    }

    #[test]
    fn test_matching_token_admits() {
        let headers = RequestHeaders::from_pairs([
            ("Authorization", "Bearer abc123"),
            ("Origin", "http://127.0.0.1"),
        ]);
        let decision = evaluate(&headers, Some("sess-1"), &bearer_settings("abc123"));

        let Decision::Admit(ctx) = decision else {
            panic!("expected admission");
        };
        assert_eq!(ctx.strategy(), AuthStrategy::Bearer);
        assert_eq!(
            ctx.auth_headers(),
            &[("authorization".to_string(), "Bearer abc123".to_string())]
        );
    }

    #[test]
    fn test_wrong_token_rejects_with_invalid_token() {
        let headers = RequestHeaders::from_pairs([("Authorization", "Bearer wrong")]);
        let decision = evaluate(&headers, None, &bearer_settings("abc123"));

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::BearerInvalid);
        let body = challenge.body();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32001);
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("Invalid token")
        );
        assert!(challenge.www_authenticate().contains("error=\"invalid_token\""));
    }

    #[test]
    fn test_malformed_authorization_counts_as_missing() {
        for value in ["Basic abc123", "Bearer", "Bearer ", "abc123"] {
            let headers = RequestHeaders::from_pairs([("Authorization", value)]);
            let decision = evaluate(&headers, None, &bearer_settings("abc123"));
            let Decision::Reject(challenge) = decision else {
                panic!("expected rejection for {:?}", value);
            };
            assert_eq!(*challenge.reason(), GateRejection::BearerMissing);
        }
    }

    #[test]
    fn test_missing_secret_rejects_as_misconfigured() {
        let settings = GateSettings::new(AuthSettings {
            strategy: AuthStrategy::Bearer,
            secret: None,
        });
        let headers = RequestHeaders::from_pairs([("Authorization", "Bearer abc123")]);
        let decision = evaluate(&headers, None, &settings);

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::ServerMisconfigured);
    }

    #[test]
    fn test_auth_bypass_admits_without_credentials() {
        // No Origin, no Authorization: origin/protocol checks run and pass
        // (absent headers are acceptable), bearer checks are skipped.
        let headers = RequestHeaders::from_pairs([] as [(&str, &str); 0]);
        let decision = evaluate(&headers, None, &open_settings());

        let Decision::Admit(ctx) = decision else {
            panic!("expected admission");
        };
        assert_eq!(ctx.strategy(), AuthStrategy::None);
        assert!(ctx.auth_headers().is_empty());
    }

    #[test]
    fn test_origin_check_precedes_auth_bypass() {
        let headers = RequestHeaders::from_pairs([("Origin", "http://evil.example.com")]);
        let decision = evaluate(&headers, None, &open_settings());

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::OriginRejected);
    }

    #[test]
    fn test_origin_check_precedes_bearer_check() {
        let headers = RequestHeaders::from_pairs([
            ("Origin", "http://evil.example.com"),
            ("Authorization", "Bearer abc123"),
        ]);
        let decision = evaluate(&headers, None, &bearer_settings("abc123"));

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::OriginRejected);
    }

    #[test]
    fn test_loopback_origins_allowed() {
        for origin in [
            "http://127.0.0.1",
            "http://127.0.0.1:6274",
            "http://localhost:3000",
            "https://localhost",
        ] {
            let headers = RequestHeaders::from_pairs([("Origin", origin)]);
            assert!(
                matches!(
                    evaluate(&headers, None, &open_settings()),
                    Decision::Admit(_)
                ),
                "origin {:?} should be allowed",
                origin
            );
        }
    }

    #[test]
    fn test_dev_mode_relaxes_origin() {
        let settings = open_settings().with_dev_mode(true);
        let headers = RequestHeaders::from_pairs([("Origin", "http://evil.example.com")]);
        assert!(matches!(
            evaluate(&headers, None, &settings),
            Decision::Admit(_)
        ));
    }

    #[test]
    fn test_protocol_version_mismatch_rejects() {
        let headers = RequestHeaders::from_pairs([("Mcp-Protocol-Version", "2024-11-05")]);
        let decision = evaluate(&headers, Some("sess-2"), &open_settings());

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::ProtocolVersionMismatch);
        assert_eq!(challenge.session_id().as_str(), "sess-2");
    }

    #[test]
    fn test_supported_protocol_version_passes() {
        let headers = RequestHeaders::from_pairs([(
            PROTOCOL_VERSION_HEADER,
            SUPPORTED_PROTOCOL_VERSION,
        )]);
        assert!(matches!(
            evaluate(&headers, None, &open_settings()),
            Decision::Admit(_)
        ));
    }

    #[test]
    fn test_protocol_version_checked_before_bearer() {
        let headers = RequestHeaders::from_pairs([
            ("Mcp-Protocol-Version", "1999-01-01"),
            ("Authorization", "Bearer abc123"),
        ]);
        let decision = evaluate(&headers, None, &bearer_settings("abc123"));

        let Decision::Reject(challenge) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(*challenge.reason(), GateRejection::ProtocolVersionMismatch);
    }

    #[test]
    fn test_optional_headers_do_not_affect_admission() {
        let headers = RequestHeaders::from_pairs([
            ("Authorization", "Bearer abc123"),
            ("X-Custom", "whatever"),
            ("User-Agent", "test-agent/1.0"),
        ]);
        assert!(matches!(
            evaluate(&headers, None, &bearer_settings("abc123")),
            Decision::Admit(_)
        ));
    }

    #[test]
    fn test_internal_error_body_shape() {
        let body = internal_error_body();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32603);
        assert!(body["id"].is_null());
    }
}
