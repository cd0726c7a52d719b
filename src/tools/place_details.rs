//! Handler for the `atlas.place_details` tool.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::json;

use crate::maps_client::{MapsClient, MapsError};
use crate::tools::{ToolContext, ToolHandler, error_result, json_result};
use crate::types::PlaceId;

pub struct PlaceDetailsHandler {
    maps: Arc<MapsClient>,
}

impl PlaceDetailsHandler {
    pub fn new(maps: Arc<MapsClient>) -> Self {
        Self { maps }
    }
}

impl ToolHandler for PlaceDetailsHandler {
    fn name(&self) -> &str {
        "atlas.place_details"
    }

    fn title(&self) -> Option<&str> {
        Some("Atlas: Place Details")
    }

    fn description(&self) -> &str {
        "Fetch the full record for a single place by its provider id, as \
         returned by atlas.search_places. Includes address, coordinates, \
         rating, website, phone number, and opening hours where available."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));

        let mut properties = serde_json::Map::new();
        properties.insert(
            "placeId".to_string(),
            json!({
                "type": "string",
                "description": "Provider place id from a previous search result.",
            }),
        );

        schema.insert("properties".to_string(), json!(properties));
        schema.insert("required".to_string(), json!(["placeId"]));
        schema
    }

    fn execute(
        &self,
        args: JsonObject,
        _ctx: &ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        let maps = self.maps.clone();

        Box::pin(async move {
            let Some(place_id) = args
                .get("placeId")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(PlaceId::new)
            else {
                return Ok(error_result(
                    "atlas.place_details requires a non-empty `placeId` string argument",
                ));
            };

            match maps.place_details(&place_id).await {
                Ok(details) => Ok(json_result(
                    json!({
                        "status": "ok",
                        "place": details,
                    }),
                    false,
                )),
                Err(MapsError::PlaceNotFound(id)) => Ok(json_result(
                    json!({
                        "status": "not_found",
                        "reason": format!("No place with id {}", id),
                    }),
                    true,
                )),
                Err(e) => Ok(error_result(&format!("Place lookup failed: {}", e))),
            }
        })
    }
}
