use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::ToolSettings;
use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

const MAX_PLACES: usize = 10;

/// Nearby-place search by coordinates and place type.
pub struct SearchNearbyPlaces {
    client: Client,
    settings: ToolSettings,
    definition: Tool,
}

#[derive(Deserialize)]
struct Args {
    latitude: f64,
    longitude: f64,
    place_type: String,
    #[serde(default = "default_radius")]
    radius_meters: u32,
}

fn default_radius() -> u32 {
    2000
}

#[derive(Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct Place {
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_ratings_total: Option<u64>,
}

impl SearchNearbyPlaces {
    pub fn new(client: Client, settings: ToolSettings) -> Self {
        let definition = Tool::new(
            "search_nearby_places",
            "Find places of a given type near a coordinate, with addresses \
             and ratings. Use geocode first if you only have an address.",
            json!({
                "type": "object",
                "required": ["latitude", "longitude", "place_type"],
                "properties": {
                    "latitude": {"type": "number"},
                    "longitude": {"type": "number"},
                    "place_type": {
                        "type": "string",
                        "description": "A place type such as 'restaurant', 'museum', or 'park'."
                    },
                    "radius_meters": {
                        "type": "integer",
                        "description": "Search radius in meters. Defaults to 2000."
                    }
                }
            }),
        );
        Self {
            client,
            settings,
            definition,
        }
    }
}

#[async_trait]
impl ToolExecutor for SearchNearbyPlaces {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let url = Url::parse_with_params(
            &format!(
                "{}/maps/api/place/nearbysearch/json",
                self.settings.maps_host.trim_end_matches('/')
            ),
            &[
                ("location", format!("{},{}", args.latitude, args.longitude)),
                ("radius", args.radius_meters.to_string()),
                ("type", args.place_type.clone()),
                ("key", self.settings.maps_api_key.clone()),
            ],
        )
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "nearby search failed: {}",
                response.status()
            )));
        }

        let body: PlacesResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        match body.status.as_str() {
            "OK" => {
                let mut lines = Vec::new();
                for (i, place) in body.results.iter().take(MAX_PLACES).enumerate() {
                    let rating = match (place.rating, place.user_ratings_total) {
                        (Some(rating), Some(total)) => format!("{rating} stars ({total} ratings)"),
                        (Some(rating), None) => format!("{rating} stars"),
                        _ => "unrated".to_string(),
                    };
                    lines.push(format!(
                        "{}. {} - {} - {}",
                        i + 1,
                        place.name,
                        place.vicinity.as_deref().unwrap_or("address unknown"),
                        rating
                    ));
                }
                Ok(lines.join("\n"))
            }
            "ZERO_RESULTS" => Ok(format!(
                "No {} found within {} meters.",
                args.place_type, args.radius_meters
            )),
            status => Err(ToolError::ExecutionFailed(format!(
                "nearby search returned {status}: {}",
                body.error_message.unwrap_or_default()
            ))),
        }
    }
}
