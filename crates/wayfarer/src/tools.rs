//! The tool roster: web search, page reading, and the Maps-backed
//! geography tools, plus the pure route optimizer.
//!
//! Every tool is a pure request/response call with no state shared between
//! invocations beyond the HTTP client's connection pool.
pub mod distance;
pub mod geocode;
pub mod places;
pub mod route;
pub mod search;
pub mod website;

pub use distance::DistanceMatrix;
pub use geocode::Geocode;
pub use places::SearchNearbyPlaces;
pub use route::OptimizeRoute;
pub use search::SearchInternet;
pub use website::ReadWebsite;

/// Settings shared by the networked tools.
///
/// Hosts are overridable so the executors can be pointed at local mocks in
/// tests.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub search_host: String,
    pub search_api_key: String,
    pub maps_host: String,
    pub maps_api_key: String,
}

impl ToolSettings {
    pub fn new<S: Into<String>, M: Into<String>>(search_api_key: S, maps_api_key: M) -> Self {
        Self {
            search_host: "https://api.tavily.com".to_string(),
            search_api_key: search_api_key.into(),
            maps_host: "https://maps.googleapis.com".to_string(),
            maps_api_key: maps_api_key.into(),
        }
    }
}
