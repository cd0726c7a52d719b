//! Single-shot gate adapter.
//!
//! This is the plain-function form of the gate, used directly by the
//! stateless deployment shape: the embedding calls [`gate_request`] once per
//! invocation and either returns the ready-made response or proceeds to tool
//! dispatch. The in-process middleware adapter is a thin wrapper over the
//! same [`check_request`] core, so both shapes extract headers and construct
//! challenges identically.

use serde_json::Value;
use tracing::error;

use crate::gate::GateState;
use crate::gate::context::AuthContext;
use crate::gate::evaluate::{
    Challenge, Decision, SESSION_ID_HEADER, evaluate, internal_error_body,
};
use crate::gate::headers::{HeaderSource, RequestHeaders};
use crate::types::SessionId;

/// A fully rendered gate response, framework-independent.
#[derive(Debug, Clone)]
pub struct GateResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl GateResponse {
    /// Render a 401 challenge.
    fn challenge(challenge: &Challenge) -> Self {
        Self {
            status: challenge.status(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("www-authenticate".to_string(), challenge.www_authenticate()),
                (
                    SESSION_ID_HEADER.to_string(),
                    challenge.session_id().to_string(),
                ),
            ],
            body: challenge.body(),
        }
    }

    /// Render an unexpected validation failure.
    fn internal_failure() -> Self {
        Self {
            status: 500,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: internal_error_body(),
        }
    }
}

/// Result of gating one request.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Forward to tool dispatch with this context.
    Proceed(AuthContext),
    /// Return this response immediately.
    Respond(GateResponse),
}

/// Gate a request from an already-snapshotted header view.
///
/// On admission, session continuity runs independently of the bearer
/// decision: a client-supplied session id gets its record created if absent
/// and its TTL refreshed.
pub async fn check_request(state: &GateState, headers: &RequestHeaders) -> GateOutcome {
    let session_id = headers.get(SESSION_ID_HEADER).map(str::to_string);

    match evaluate(headers, session_id.as_deref(), state.settings()) {
        Decision::Admit(ctx) => {
            if let Some(sid) = session_id {
                let id = SessionId::from(sid);
                let record = state.sessions().ensure(&id).await;
                state.sessions().put(&id, record).await;
            }
            GateOutcome::Proceed(ctx)
        }
        Decision::Reject(challenge) => GateOutcome::Respond(GateResponse::challenge(&challenge)),
    }
}

/// Gate a request arriving with `http` headers.
///
/// Snapshot failures (a header value the gate cannot read) are internal
/// validation failures: logged, answered with a generic 500.
pub async fn check_header_map(state: &GateState, map: &http::HeaderMap) -> GateOutcome {
    match RequestHeaders::from_header_map(map) {
        Ok(headers) => check_request(state, &headers).await,
        Err(e) => {
            error!(error = %e, "Failed to read request headers");
            GateOutcome::Respond(GateResponse::internal_failure())
        }
    }
}

/// Single-shot entry point: `None` means the caller should proceed,
/// `Some(response)` must be returned to the client as-is.
pub async fn gate_request(state: &GateState, headers: &RequestHeaders) -> Option<GateResponse> {
    match check_request(state, headers).await {
        GateOutcome::Proceed(_) => None,
        GateOutcome::Respond(response) => Some(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::evaluate::GateSettings;
    use crate::gate::policy::{AuthSettings, AuthStrategy};
    use crate::session::{SessionStore, VolatileStore};
    use std::sync::Arc;

    fn bearer_state() -> (GateState, Arc<VolatileStore>) {
        let sessions = Arc::new(VolatileStore::new());
        let state = GateState::new(
            GateSettings::new(AuthSettings::bearer("abc123")),
            sessions.clone(),
        );
        (state, sessions)
    }

    #[tokio::test]
    async fn test_gate_request_proceeds_on_valid_token() {
        let (state, _) = bearer_state();
        let headers = RequestHeaders::from_pairs([("Authorization", "Bearer abc123")]);
        assert!(gate_request(&state, &headers).await.is_none());
    }

    #[tokio::test]
    async fn test_gate_request_returns_challenge() {
        let (state, _) = bearer_state();
        let headers = RequestHeaders::from_pairs([("Mcp-Session-Id", "sess-7")]);

        let response = gate_request(&state, &headers).await.expect("challenge");
        assert_eq!(response.status, 401);

        let header = |name: &str| {
            response
                .headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(header("mcp-session-id"), Some("sess-7"));
        assert!(header("www-authenticate").unwrap().contains("MCP"));
        assert_eq!(response.body["error"]["code"], -32001);
    }

    #[tokio::test]
    async fn test_admission_ensures_session_record() {
        let (state, sessions) = bearer_state();
        let headers = RequestHeaders::from_pairs([
            ("Authorization", "Bearer abc123"),
            ("Mcp-Session-Id", "sess-7"),
        ]);

        let outcome = check_request(&state, &headers).await;
        assert!(matches!(outcome, GateOutcome::Proceed(_)));
        assert!(sessions.get(&SessionId::new("sess-7")).await.is_some());
    }

    #[tokio::test]
    async fn test_rejection_does_not_create_session_record() {
        let (state, sessions) = bearer_state();
        let headers = RequestHeaders::from_pairs([("Mcp-Session-Id", "sess-7")]);

        let outcome = check_request(&state, &headers).await;
        assert!(matches!(outcome, GateOutcome::Respond(_)));
        assert!(sessions.get(&SessionId::new("sess-7")).await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_header_is_an_internal_failure() {
        let (state, sessions) = bearer_state();
        let mut map = http::HeaderMap::new();
        map.insert("authorization", http::HeaderValue::from_static("Bearer abc123"));
        map.insert(
            "x-binary",
            http::HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        let GateOutcome::Respond(response) = check_header_map(&state, &map).await else {
            panic!("expected internal failure response");
        };
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"]["code"], -32603);
        // A failed snapshot never reaches session handling.
        assert!(sessions.get(&SessionId::new("sess-7")).await.is_none());
    }

    #[tokio::test]
    async fn test_proceed_carries_auth_context() {
        let (state, _) = bearer_state();
        let headers = RequestHeaders::from_pairs([("Authorization", "Bearer abc123")]);

        let GateOutcome::Proceed(ctx) = check_request(&state, &headers).await else {
            panic!("expected admission");
        };
        assert_eq!(ctx.strategy(), AuthStrategy::Bearer);
    }
}
