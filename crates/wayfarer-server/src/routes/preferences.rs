use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::session_id;
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
struct AddPreferenceRequest {
    preference: String,
}

#[derive(Debug, Serialize)]
struct AddPreferenceResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct PreferencesResponse {
    preferences: Vec<String>,
}

async fn add_preference(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddPreferenceRequest>,
) -> Json<AddPreferenceResponse> {
    let session = session_id(&headers);
    state
        .preferences
        .add(&session, request.preference.clone());
    Json(AddPreferenceResponse {
        message: format!("Added preference: {}", request.preference),
    })
}

async fn get_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<PreferencesResponse> {
    let session = session_id(&headers);
    Json(PreferencesResponse {
        preferences: state.preferences.list(&session),
    })
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/add_preference", post(add_preference))
        .route("/preferences", get(get_preferences))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wayfarer::providers::mock::MockProvider;

    async fn post_preference(app: &Router, session: &str, preference: &str) {
        let request = Request::builder()
            .uri("/add_preference")
            .method("POST")
            .header("content-type", "application/json")
            .header("x-session-id", session)
            .body(Body::from(format!(r#"{{"preference": "{preference}"}}"#)))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    async fn list_preferences(app: &Router, session: &str) -> Vec<String> {
        let request = Request::builder()
            .uri("/preferences")
            .header("x-session-id", session)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        parsed["preferences"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_add_and_list_preferences() {
        let app = routes(test_state(MockProvider::new(vec![])));

        post_preference(&app, "alpha", "vegetarian").await;
        post_preference(&app, "alpha", "outdoor seating").await;

        let preferences = list_preferences(&app, "alpha").await;
        assert_eq!(preferences, vec!["vegetarian", "outdoor seating"]);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_preferences() {
        let app = routes(test_state(MockProvider::new(vec![])));

        post_preference(&app, "alpha", "vegetarian").await;
        post_preference(&app, "beta", "seafood").await;

        assert_eq!(list_preferences(&app, "alpha").await, vec!["vegetarian"]);
        assert_eq!(list_preferences(&app, "beta").await, vec!["seafood"]);
        assert!(list_preferences(&app, "other").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_header_uses_default_session() {
        let app = routes(test_state(MockProvider::new(vec![])));

        let request = Request::builder()
            .uri("/add_preference")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"preference": "live music"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(list_preferences(&app, "default").await, vec!["live music"]);
    }
}
