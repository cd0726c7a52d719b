//! Request gating for both deployment shapes.
//!
//! Every inbound request passes through the same pure decision function,
//! [`evaluate`], regardless of whether the process is the long-running local
//! server or a single-shot handler. The checks, in order: origin, protocol
//! version, bearer token. Authentication is stateless — re-evaluated on every
//! request — while session records exist only for protocol handshake
//! continuity and are orthogonal to the bearer decision.
//!
//! ## Layout
//!
//! - [`policy`]: resolves configuration into an enforcement strategy
//! - [`headers`]: framework-independent header access
//! - [`evaluate`]: the decision function and challenge construction
//! - [`handler`]: single-shot adapter (plain async function)
//! - [`middleware`]: axum middleware adapter wrapping the same core

pub mod context;
pub mod evaluate;
pub mod handler;
pub mod headers;
pub mod middleware;
pub mod policy;

pub use context::AuthContext;
pub use evaluate::{
    Challenge, Decision, GateRejection, GateSettings, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER,
    SUPPORTED_PROTOCOL_VERSION, evaluate,
};
pub use handler::{GateOutcome, GateResponse, check_request, gate_request};
pub use headers::{HeaderSource, RequestHeaders};
pub use policy::{AuthSettings, AuthStrategy, ConfigError, RawAuthConfig};

use std::sync::Arc;

use crate::session::SessionStore;

/// Dependencies shared by the gate adapters.
///
/// Constructed once at startup and passed in explicitly; the gate holds no
/// ambient global state.
#[derive(Clone)]
pub struct GateState {
    settings: Arc<GateSettings>,
    sessions: Arc<dyn SessionStore>,
}

impl GateState {
    pub fn new(settings: GateSettings, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            settings: Arc::new(settings),
            sessions,
        }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }
}
