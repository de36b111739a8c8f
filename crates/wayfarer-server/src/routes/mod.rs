// Export route modules
pub mod assistant;
pub mod location;
pub mod preferences;
pub mod segment;
pub mod tourguide;

use axum::http::HeaderMap;
use axum::Router;

use crate::state::AppState;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(assistant::routes(state.clone()))
        .merge(location::routes(state.clone()))
        .merge(preferences::routes(state.clone()))
        .merge(segment::routes(state.clone()))
        .merge(tourguide::routes(state))
}

/// The session a request belongs to; absent headers share "default".
pub(crate) fn session_id(headers: &HeaderMap) -> String {
    headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("default")
        .to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use wayfarer::providers::mock::MockProvider;
    use wayfarer::tools::ToolSettings;

    use crate::state::{AppState, PreferenceStore};

    /// State wired to a mock provider and unreachable upstreams; tests
    /// override the hosts they exercise.
    pub fn test_state(provider: MockProvider) -> AppState {
        AppState {
            provider: Arc::new(provider),
            tools: ToolSettings::new("search-key", "maps-key"),
            preferences: PreferenceStore::new(),
            client: reqwest::Client::new(),
            max_rounds: 10,
            segmenter_url: "http://127.0.0.1:9/sam".to_string(),
            tourguide_url: "http://127.0.0.1:9/tourguide".to_string(),
            location_host: "http://127.0.0.1:9".to_string(),
        }
    }
}
