use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::ToolSettings;
use crate::errors::{ToolError, ToolResult};
use crate::models::Tool;
use crate::registry::ToolExecutor;

/// Travel distances and durations between sets of places.
pub struct DistanceMatrix {
    client: Client,
    settings: ToolSettings,
    definition: Tool,
}

#[derive(Deserialize)]
struct Args {
    origins: Vec<String>,
    destinations: Vec<String>,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "driving".to_string()
}

#[derive(Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    distance: Option<TextValue>,
    #[serde(default)]
    duration: Option<TextValue>,
}

#[derive(Deserialize)]
struct TextValue {
    text: String,
    value: i64,
}

impl DistanceMatrix {
    pub fn new(client: Client, settings: ToolSettings) -> Self {
        let definition = Tool::new(
            "distance_matrix",
            "Compute travel distance and duration between every origin and \
             every destination. Durations are reported in seconds so they \
             can be fed to optimize_route.",
            json!({
                "type": "object",
                "required": ["origins", "destinations"],
                "properties": {
                    "origins": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Origin addresses or 'lat,lng' pairs."
                    },
                    "destinations": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Destination addresses or 'lat,lng' pairs."
                    },
                    "mode": {
                        "type": "string",
                        "description": "Travel mode: driving, walking, bicycling, or transit. Defaults to driving."
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
impl ToolExecutor for DistanceMatrix {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.origins.is_empty() || args.destinations.is_empty() {
            return Err(ToolError::InvalidArguments(
                "origins and destinations must be non-empty".into(),
            ));
        }

        let url = Url::parse_with_params(
            &format!(
                "{}/maps/api/distancematrix/json",
                self.settings.maps_host.trim_end_matches('/')
            ),
            &[
                ("origins", args.origins.join("|")),
                ("destinations", args.destinations.join("|")),
                ("mode", args.mode.clone()),
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
                "distance matrix request failed: {}",
                response.status()
            )));
        }

        let body: MatrixResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if body.status != "OK" {
            return Err(ToolError::ExecutionFailed(format!(
                "distance matrix returned {}: {}",
                body.status,
                body.error_message.unwrap_or_default()
            )));
        }

        let mut lines = Vec::new();
        for (i, row) in body.rows.iter().enumerate() {
            let origin = args.origins.get(i).map(String::as_str).unwrap_or("?");
            for (j, element) in row.elements.iter().enumerate() {
                let destination = args.destinations.get(j).map(String::as_str).unwrap_or("?");
                if element.status == "OK" {
                    let distance = element.distance.as_ref();
                    let duration = element.duration.as_ref();
                    lines.push(format!(
                        "{} -> {}: {}, {} ({} seconds)",
                        origin,
                        destination,
                        distance.map(|d| d.text.as_str()).unwrap_or("unknown distance"),
                        duration.map(|d| d.text.as_str()).unwrap_or("unknown duration"),
                        duration.map(|d| d.value).unwrap_or(0),
                    ));
                } else {
                    lines.push(format!(
                        "{} -> {}: no route ({})",
                        origin, destination, element.status
                    ));
                }
            }
        }
        Ok(lines.join("\n"))
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
    async fn test_distance_matrix_formats_grid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/maps/api/distancematrix/json".into()),
            )
            .with_status(200)
            .with_body(
                r#"{"status": "OK", "rows": [
                    {"elements": [
                        {"status": "OK",
                         "distance": {"text": "12.4 km", "value": 12400},
                         "duration": {"text": "18 mins", "value": 1080}},
                        {"status": "ZERO_RESULTS"}
                    ]}
                ]}"#,
            )
            .create_async()
            .await;

        let tool = DistanceMatrix::new(Client::new(), settings(&server));
        let output = tool
            .execute(json!({
                "origins": ["Seattle"],
                "destinations": ["Bellevue", "Orcas Island"]
            }))
            .await
            .unwrap();

        assert!(output.contains("Seattle -> Bellevue: 12.4 km, 18 mins (1080 seconds)"));
        assert!(output.contains("Seattle -> Orcas Island: no route (ZERO_RESULTS)"));
    }

    #[tokio::test]
    async fn test_distance_matrix_rejects_empty_origins() {
        let server = mockito::Server::new_async().await;
        let tool = DistanceMatrix::new(Client::new(), settings(&server));
        let result = tool
            .execute(json!({"origins": [], "destinations": ["Bellevue"]}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
