//! Tool handler registry for managing MCP tool implementations.
//!
//! This module provides a simple way to register and invoke tool handlers,
//! making it easy to add new tools without modifying the core `ServerHandler`
//! implementation.

mod registry;

pub use registry::{ToolContext, ToolHandler, ToolRegistry};

// Tool handler implementations
mod compute_route;
mod place_details;
mod search_places;

pub use compute_route::ComputeRouteHandler;
pub use place_details::PlaceDetailsHandler;
pub use search_places::SearchPlacesHandler;

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content};
use serde_json::Value;

use crate::maps_client::MapsClient;

/// The full mapping tool set over one shared provider client.
pub fn mapping_tools(maps: Arc<MapsClient>) -> ToolRegistry {
    ToolRegistry::new()
        .register_handler(SearchPlacesHandler::new(maps.clone()))
        .register_handler(PlaceDetailsHandler::new(maps.clone()))
        .register_handler(ComputeRouteHandler::new(maps))
}

/// Render a JSON payload as a tool result.
pub(crate) fn json_result(payload: Value, is_error: bool) -> CallToolResult {
    let text = serde_json::to_string(&payload)
        .unwrap_or_else(|_| "internal serialization error".to_string());
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: None,
        is_error: Some(is_error),
        meta: None,
    }
}

/// Render an argument or upstream failure as an error result.
pub(crate) fn error_result(reason: &str) -> CallToolResult {
    json_result(
        serde_json::json!({
            "status": "error",
            "reason": reason,
        }),
        true,
    )
}
