//! Handler for the `atlas.search_places` tool.
//!
//! Free-text place search against the mapping provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::json;

use crate::maps_client::MapsClient;
use crate::tools::{ToolContext, ToolHandler, error_result, json_result};

pub struct SearchPlacesHandler {
    maps: Arc<MapsClient>,
}

impl SearchPlacesHandler {
    pub fn new(maps: Arc<MapsClient>) -> Self {
        Self { maps }
    }
}

impl ToolHandler for SearchPlacesHandler {
    fn name(&self) -> &str {
        "atlas.search_places"
    }

    fn title(&self) -> Option<&str> {
        Some("Atlas: Search Places")
    }

    fn description(&self) -> &str {
        "Search for places by free-text query (e.g. \"coffee near the Louvre\"). \
         Returns a ranked list of matching places with their provider id, name, \
         address, coordinates, and rating. Pass a returned place id to \
         atlas.place_details for the full record."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));

        let mut properties = serde_json::Map::new();
        properties.insert(
            "query".to_string(),
            json!({
                "type": "string",
                "description": "Free-text search query.",
            }),
        );
        properties.insert(
            "maxResults".to_string(),
            json!({
                "type": "integer",
                "description": "Maximum number of results to return (1-20, default 5).",
                "minimum": 1,
                "maximum": 20,
            }),
        );

        schema.insert("properties".to_string(), json!(properties));
        schema.insert("required".to_string(), json!(["query"]));
        schema
    }

    fn execute(
        &self,
        args: JsonObject,
        _ctx: &ToolContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CallToolResult>> + Send + '_>> {
        let maps = self.maps.clone();

        Box::pin(async move {
            let Some(query) = args.get("query").and_then(|v| v.as_str()).map(str::to_string)
            else {
                return Ok(error_result(
                    "atlas.search_places requires a `query` string argument",
                ));
            };
            if query.trim().is_empty() {
                return Ok(error_result("`query` must not be empty"));
            }

            let max_results = args
                .get("maxResults")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok());

            match maps.search_places(&query, max_results).await {
                Ok(places) => Ok(json_result(
                    json!({
                        "status": "ok",
                        "query": query,
                        "places": places,
                    }),
                    false,
                )),
                Err(e) => Ok(error_result(&format!("Place search failed: {}", e))),
            }
        })
    }
}
