//! Upstream mapping-data client.
//!
//! Thin typed wrapper over the provider's Places and Routes HTTP APIs.
//! Invoked only after a request has been admitted by the gate; the client
//! itself does no authentication beyond presenting the provider API key.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::types::PlaceId;

const PLACES_BASE_URL: &str = "https://places.googleapis.com";
const ROUTES_BASE_URL: &str = "https://routes.googleapis.com";

const SEARCH_FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.location,places.rating";
const DETAILS_FIELD_MASK: &str = "id,displayName,formattedAddress,location,rating,websiteUri,\
     internationalPhoneNumber,regularOpeningHours.weekdayDescriptions";
const ROUTES_FIELD_MASK: &str =
    "routes.distanceMeters,routes.duration,routes.polyline.encodedPolyline";

/// Configuration for the mapping provider.
#[derive(Debug, Clone)]
pub struct MapsConfig {
    pub api_key: String,
    /// Overridable for tests and regional endpoints.
    pub places_base_url: String,
    pub routes_base_url: String,
}

impl MapsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            places_base_url: PLACES_BASE_URL.to_string(),
            routes_base_url: ROUTES_BASE_URL.to_string(),
        }
    }
}

/// Client for place search, place details, and route computation.
pub struct MapsClient {
    client: reqwest::Client,
    config: MapsConfig,
}

impl MapsClient {
    pub fn new(config: MapsConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            config,
        }
    }

    /// Free-text place search.
    pub async fn search_places(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<Vec<PlaceSummary>, MapsError> {
        debug!(query, "Searching places");

        let body = json!({
            "textQuery": query,
            "maxResultCount": max_results.unwrap_or(5).min(20),
        });

        let response = self
            .client
            .post(format!("{}/v1/places:searchText", self.config.places_base_url))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| MapsError::RequestFailed(e.to_string()))?;

        let payload: SearchResponse = decode_response(response).await?;
        Ok(payload
            .places
            .into_iter()
            .map(PlaceSummary::from_payload)
            .collect())
    }

    /// Details for a single place by provider id.
    pub async fn place_details(&self, place_id: &PlaceId) -> Result<PlaceDetails, MapsError> {
        debug!(place_id = %place_id, "Fetching place details");

        // Accept both "places/<id>" and bare "<id>".
        let resource = place_id
            .as_str()
            .strip_prefix("places/")
            .unwrap_or(place_id.as_str());

        let response = self
            .client
            .get(format!(
                "{}/v1/places/{}",
                self.config.places_base_url, resource
            ))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| MapsError::RequestFailed(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(MapsError::PlaceNotFound(place_id.clone()));
        }

        let payload: PlacePayload = decode_response(response).await?;
        Ok(PlaceDetails::from_payload(payload))
    }

    /// Best route between two free-text waypoints.
    pub async fn compute_route(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
    ) -> Result<RouteSummary, MapsError> {
        debug!(origin, destination, mode = mode.as_str(), "Computing route");

        let body = json!({
            "origin": { "address": origin },
            "destination": { "address": destination },
            "travelMode": mode.as_str(),
        });

        let response = self
            .client
            .post(format!(
                "{}/directions/v2:computeRoutes",
                self.config.routes_base_url
            ))
            .header("X-Goog-Api-Key", &self.config.api_key)
            .header("X-Goog-FieldMask", ROUTES_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| MapsError::RequestFailed(e.to_string()))?;

        let payload: RoutesResponse = decode_response(response).await?;
        payload
            .routes
            .into_iter()
            .next()
            .map(RouteSummary::from_payload)
            .ok_or(MapsError::NoRouteFound)
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, MapsError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(MapsError::UpstreamStatus(status.as_u16(), detail));
    }
    response
        .json()
        .await
        .map_err(|e| MapsError::DecodeFailed(e.to_string()))
}

/// Supported travel modes for route computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Drive,
    Walk,
    Bicycle,
    Transit,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drive => "DRIVE",
            Self::Walk => "WALK",
            Self::Bicycle => "BICYCLE",
            Self::Transit => "TRANSIT",
        }
    }

    /// Parse a user-supplied mode string, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "drive" | "driving" | "car" => Some(Self::Drive),
            "walk" | "walking" => Some(Self::Walk),
            "bicycle" | "bike" | "cycling" => Some(Self::Bicycle),
            "transit" => Some(Self::Transit),
            _ => None,
        }
    }
}

/// Geographic coordinate as returned by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHoursPayload {
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}

/// Raw place object from the provider; internal shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacePayload {
    id: String,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    location: Option<LatLng>,
    rating: Option<f64>,
    website_uri: Option<String>,
    international_phone_number: Option<String>,
    regular_opening_hours: Option<OpeningHoursPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<PlacePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePayload {
    distance_meters: Option<u64>,
    duration: Option<String>,
    polyline: Option<PolylinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolylinePayload {
    encoded_polyline: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<RoutePayload>,
}

/// Condensed place result for search responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSummary {
    pub id: PlaceId,
    pub name: String,
    pub address: Option<String>,
    pub location: Option<LatLng>,
    pub rating: Option<f64>,
}

impl PlaceSummary {
    fn from_payload(payload: PlacePayload) -> Self {
        Self {
            id: PlaceId::new(payload.id),
            name: payload
                .display_name
                .map(|t| t.text)
                .unwrap_or_else(|| "(unnamed)".to_string()),
            address: payload.formatted_address,
            location: payload.location,
            rating: payload.rating,
        }
    }
}

/// Full detail view for a single place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub id: PlaceId,
    pub name: String,
    pub address: Option<String>,
    pub location: Option<LatLng>,
    pub rating: Option<f64>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Vec<String>,
}

impl PlaceDetails {
    fn from_payload(payload: PlacePayload) -> Self {
        Self {
            id: PlaceId::new(payload.id),
            name: payload
                .display_name
                .map(|t| t.text)
                .unwrap_or_else(|| "(unnamed)".to_string()),
            address: payload.formatted_address,
            location: payload.location,
            rating: payload.rating,
            website: payload.website_uri,
            phone: payload.international_phone_number,
            opening_hours: payload
                .regular_opening_hours
                .map(|h| h.weekday_descriptions)
                .unwrap_or_default(),
        }
    }
}

/// Condensed route result.
///
/// Fields the provider omitted stay `None` rather than masquerading as a
/// zero-length route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
    pub encoded_polyline: Option<String>,
}

impl RouteSummary {
    fn from_payload(payload: RoutePayload) -> Self {
        Self {
            distance_meters: payload.distance_meters,
            duration_seconds: payload.duration.as_deref().and_then(parse_duration_seconds),
            encoded_polyline: payload.polyline.and_then(|p| p.encoded_polyline),
        }
    }
}

/// Parse the provider's duration format, e.g. "1069s".
fn parse_duration_seconds(value: &str) -> Option<u64> {
    value.strip_suffix('s')?.parse().ok()
}

/// Errors from the mapping provider.
#[derive(Debug, Clone)]
pub enum MapsError {
    /// The request never completed.
    RequestFailed(String),
    /// The provider answered with a non-success status.
    UpstreamStatus(u16, String),
    /// The response body could not be decoded.
    DecodeFailed(String),
    /// No place with the given id.
    PlaceNotFound(PlaceId),
    /// The provider returned no route between the waypoints.
    NoRouteFound,
}

impl fmt::Display for MapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed(msg) => write!(f, "Maps request failed: {}", msg),
            Self::UpstreamStatus(status, detail) => {
                write!(f, "Maps provider returned HTTP {}: {}", status, detail)
            }
            Self::DecodeFailed(msg) => write!(f, "Failed to decode maps response: {}", msg),
            Self::PlaceNotFound(id) => write!(f, "Place not found: {}", id),
            Self::NoRouteFound => write!(f, "No route found between the given waypoints"),
        }
    }
}

impl std::error::Error for MapsError {}
