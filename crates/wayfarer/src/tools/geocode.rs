use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::ToolSettings;
use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

/// Resolve an address or place name to coordinates via the Geocoding API.
pub struct Geocode {
    client: Client,
    settings: ToolSettings,
    definition: Tool,
}

#[derive(Deserialize)]
struct Args {
    address: String,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl Geocode {
    pub fn new(client: Client, settings: ToolSettings) -> Self {
        let definition = Tool::new(
            "geocode",
            "Convert an address or place name into latitude/longitude \
             coordinates and a normalized address.",
            json!({
                "type": "object",
                "required": ["address"],
                "properties": {
                    "address": {
                        "type": "string",
                        "description": "The address or place name to geocode."
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
impl ToolExecutor for Geocode {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let url = Url::parse_with_params(
            &format!(
                "{}/maps/api/geocode/json",
                self.settings.maps_host.trim_end_matches('/')
            ),
            &[
                ("address", args.address.as_str()),
                ("key", self.settings.maps_api_key.as_str()),
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
                "geocoding request failed: {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        match body.status.as_str() {
            "OK" => match body.results.first() {
                Some(first) => Ok(format!(
                    "Address: {}\nLatitude: {}\nLongitude: {}",
                    first.formatted_address,
                    first.geometry.location.lat,
                    first.geometry.location.lng
                )),
                None => Ok(format!("No results found for '{}'.", args.address)),
            },
            "ZERO_RESULTS" => Ok(format!("No results found for '{}'.", args.address)),
            status => Err(ToolError::ExecutionFailed(format!(
                "geocoding returned {status}: {}",
                body.error_message.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &mockito::Server) -> ToolSettings {
        let mut settings = ToolSettings::new("search-key", "maps-key");
        settings.maps_host = server.url();
        settings
    }

    #[tokio::test]
    async fn test_geocode_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/maps/api/geocode/json".into()))
            .with_status(200)
            .with_body(
                r#"{"status": "OK", "results": [{
                    "formatted_address": "Seattle, WA, USA",
                    "geometry": {"location": {"lat": 47.6062, "lng": -122.3321}}
                }]}"#,
            )
            .create_async()
            .await;

        let tool = Geocode::new(Client::new(), settings(&server));
        let output = tool.execute(json!({"address": "Seattle"})).await.unwrap();
        assert!(output.contains("Seattle, WA, USA"));
        assert!(output.contains("47.6062"));
    }

    #[tokio::test]
    async fn test_geocode_zero_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/maps/api/geocode/json".into()))
            .with_status(200)
            .with_body(r#"{"status": "ZERO_RESULTS", "results": []}"#)
            .create_async()
            .await;

        let tool = Geocode::new(Client::new(), settings(&server));
        let output = tool.execute(json!({"address": "xyzzy"})).await.unwrap();
        assert!(output.contains("No results"));
    }

    #[tokio::test]
    async fn test_geocode_api_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/maps/api/geocode/json".into()))
            .with_status(200)
            .with_body(r#"{"status": "REQUEST_DENIED", "results": [], "error_message": "bad key"}"#)
            .create_async()
            .await;

        let tool = Geocode::new(Client::new(), settings(&server));
        let result = tool.execute(json!({"address": "Seattle"})).await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed(_))));
    }
}
