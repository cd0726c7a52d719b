//! Request-scoped authentication context.

use crate::gate::policy::AuthStrategy;

/// Authentication context attached to an admitted request.
///
/// Created by the gate on admission, handed to the tool-dispatch layer, and
/// discarded when the request completes. It is never written to any store:
/// authentication is re-evaluated from scratch on every request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Strategy that admitted this request.
    strategy: AuthStrategy,
    /// Credential headers as presented by the client.
    auth_headers: Vec<(String, String)>,
    /// Headers to forward to downstream collaborators on behalf of this
    /// request. Currently identical to `auth_headers`; kept separate so a
    /// future exchange step (e.g. token translation) has a place to live.
    resolved_headers: Vec<(String, String)>,
}

impl AuthContext {
    /// Context for a request admitted without credentials (strategy `none`).
    pub fn unauthenticated() -> Self {
        Self {
            strategy: AuthStrategy::None,
            auth_headers: Vec::new(),
            resolved_headers: Vec::new(),
        }
    }

    /// Context for a request admitted by bearer-token match.
    pub fn bearer(authorization: impl Into<String>) -> Self {
        let pair = ("authorization".to_string(), authorization.into());
        Self {
            strategy: AuthStrategy::Bearer,
            auth_headers: vec![pair.clone()],
            resolved_headers: vec![pair],
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    pub fn auth_headers(&self) -> &[(String, String)] {
        &self.auth_headers
    }

    pub fn resolved_headers(&self) -> &[(String, String)] {
        &self.resolved_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_context_is_empty() {
        let ctx = AuthContext::unauthenticated();
        assert_eq!(ctx.strategy(), AuthStrategy::None);
        assert!(ctx.auth_headers().is_empty());
        assert!(ctx.resolved_headers().is_empty());
    }

    #[test]
    fn test_bearer_context_carries_authorization() {
        let ctx = AuthContext::bearer("Bearer abc123");
        assert_eq!(ctx.strategy(), AuthStrategy::Bearer);
        assert_eq!(
            ctx.auth_headers(),
            &[("authorization".to_string(), "Bearer abc123".to_string())]
        );
        assert_eq!(ctx.resolved_headers(), ctx.auth_headers());
    }
}
