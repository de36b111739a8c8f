use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub latlng: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

/// Resolve the server's coarse location from its public IP.
pub async fn lookup_location(client: &reqwest::Client, host: &str) -> Option<Location> {
    let url = format!("{}/json", host.trim_end_matches('/'));
    let response = client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let body: IpApiResponse = response.json().await.ok()?;
    if body.status != "success" {
        return None;
    }
    Some(Location {
        city: body.city,
        country: body.country,
        latlng: [body.lat, body.lon],
    })
}

async fn get_location(State(state): State<AppState>) -> Result<Json<Location>, StatusCode> {
    match lookup_location(&state.client, &state.location_host).await {
        Some(location) => Ok(Json(location)),
        None => {
            tracing::error!("ip geolocation lookup failed");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/location", get(get_location))
        .with_state(state)
}
