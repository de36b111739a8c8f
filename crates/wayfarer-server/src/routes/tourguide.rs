use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::location::lookup_location;
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
struct TourGuideRequest {
    base_image: String,
    masked_image: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

/// Narrate a user-selected landmark: fill in the caller's location when it
/// is missing, then forward to the tour-guide service and relay its event
/// stream untouched.
async fn tourguide(
    State(state): State<AppState>,
    Json(mut request): Json<TourGuideRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if request.location.is_empty() || (request.lat == 0.0 && request.lon == 0.0) {
        if let Some(located) = lookup_location(&state.client, &state.location_host).await {
            if request.location.is_empty() {
                request.location = format!("{}, {}", located.city, located.country);
            }
            if request.lat == 0.0 && request.lon == 0.0 {
                request.lat = located.latlng[0];
                request.lon = located.latlng[1];
            }
        }
    }

    let response = state
        .client
        .post(&state.tourguide_url)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("tour-guide service unreachable: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    if !response.status().is_success() {
        tracing::error!("tour-guide service returned {}", response.status());
        return Err(StatusCode::BAD_GATEWAY);
    }

    let body = axum::body::Body::from_stream(response.bytes_stream());
    Ok(([(header::CONTENT_TYPE, "text/event-stream")], body))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/tourguide", post(tourguide))
        .with_state(state)
}
