//! Handler for the `atlas.compute_route` tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::json;

use crate::maps_client::{MapsClient, MapsError, TravelMode};
use crate::tools::{ToolContext, ToolHandler, error_result, json_result};

pub struct ComputeRouteHandler {
    maps: Arc<MapsClient>,
}

impl ComputeRouteHandler {
    pub fn new(maps: Arc<MapsClient>) -> Self {
        Self { maps }
    }
}

impl ToolHandler for ComputeRouteHandler {
    fn name(&self) -> &str {
        "atlas.compute_route"
    }

    fn title(&self) -> Option<&str> {
        Some("Atlas: Compute Route")
    }

    fn description(&self) -> &str {
        "Compute the best route between two waypoints given as free-text \
         addresses or place names. Returns total distance, travel time, and \
         an encoded polyline for the route geometry. Supported travel modes: \
         drive (default), walk, bicycle, transit."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));

        let mut properties = serde_json::Map::new();
        properties.insert(
            "origin".to_string(),
            json!({
                "type": "string",
                "description": "Starting waypoint as an address or place name.",
            }),
        );
        properties.insert(
            "destination".to_string(),
            json!({
                "type": "string",
                "description": "Ending waypoint as an address or place name.",
            }),
        );
        properties.insert(
            "mode".to_string(),
            json!({
                "type": "string",
                "description": "Travel mode: drive, walk, bicycle, or transit. Defaults to drive.",
                "enum": ["drive", "walk", "bicycle", "transit"],
            }),
        );

        schema.insert("properties".to_string(), json!(properties));
        schema.insert("required".to_string(), json!(["origin", "destination"]));
        schema
    }

    fn execute(
        &self,
        args: JsonObject,
        _ctx: &ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        let maps = self.maps.clone();

        Box::pin(async move {
            let Some(origin) = args
                .get("origin")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
            else {
                return Ok(error_result(
                    "atlas.compute_route requires a non-empty `origin` string argument",
                ));
            };
            let Some(destination) = args
                .get("destination")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
            else {
                return Ok(error_result(
                    "atlas.compute_route requires a non-empty `destination` string argument",
                ));
            };

            let mode = match args.get("mode").and_then(|v| v.as_str()) {
                None => TravelMode::Drive,
                Some(raw) => match TravelMode::parse(raw) {
                    Some(mode) => mode,
                    None => {
                        return Ok(error_result(&format!(
                            "Unknown travel mode `{}`; expected drive, walk, bicycle, or transit",
                            raw
                        )));
                    }
                },
            };

            match maps.compute_route(&origin, &destination, mode).await {
                Ok(route) => Ok(json_result(
                    json!({
                        "status": "ok",
                        "origin": origin,
                        "destination": destination,
                        "mode": mode.as_str(),
                        "route": route,
                    }),
                    false,
                )),
                Err(MapsError::NoRouteFound) => Ok(json_result(
                    json!({
                        "status": "no_route",
                        "reason": "No route found between the given waypoints",
                    }),
                    true,
                )),
                Err(e) => Ok(error_result(&format!("Route computation failed: {}", e))),
            }
        })
    }
}
