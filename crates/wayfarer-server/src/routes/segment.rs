use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
struct SegmentRequest {
    image: String,
    clicks: Vec<[i64; 2]>,
}

/// Forward a mask-prediction request to the segmentation service and relay
/// the PNG it returns.
async fn segment(
    State(state): State<AppState>,
    Json(request): Json<SegmentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let response = state
        .client
        .post(&state.segmenter_url)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("segmentation service unreachable: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    if !response.status().is_success() {
        tracing::error!("segmentation service returned {}", response.status());
        return Err(StatusCode::BAD_GATEWAY);
    }

    let bytes = response.bytes().await.map_err(|e| {
        tracing::error!("failed reading segmentation response: {}", e);
        StatusCode::BAD_GATEWAY
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/segment", post(segment))
        .with_state(state)
}
