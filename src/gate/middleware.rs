//! Axum middleware gate adapter for the long-running shape.
//!
//! A few lines of translation over [`check_header_map`]: a rejection is
//! written as the terminal response without calling the next layer, an
//! admission attaches the [`AuthContext`] to request extensions and
//! continues the pipeline.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::gate::GateState;
use crate::gate::handler::{GateOutcome, GateResponse, check_header_map};

/// Gate step for an axum middleware chain.
///
/// Install with `axum::middleware::from_fn_with_state(gate_state, enforce)`.
pub async fn enforce(State(state): State<GateState>, mut request: Request, next: Next) -> Response {
    match check_header_map(&state, request.headers()).await {
        GateOutcome::Proceed(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        GateOutcome::Respond(response) => into_response(response),
    }
}

fn into_response(response: GateResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(response.body.to_string()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
