use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wayfarer::providers::base::Provider;
use wayfarer::tools::ToolSettings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub tools: ToolSettings,
    pub preferences: PreferenceStore,
    pub client: reqwest::Client,
    pub max_rounds: u32,
    pub segmenter_url: String,
    pub tourguide_url: String,
    pub location_host: String,
}

/// Dining and travel preferences, scoped per session.
///
/// Sessions are identified by the `x-session-id` header; requests without
/// one share the "default" session.
#[derive(Clone, Default)]
pub struct PreferenceStore {
    inner: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, session: &str, preference: String) {
        let mut inner = self.inner.lock().unwrap();
        inner.entry(session.to_string()).or_default().push(preference);
    }

    pub fn list(&self, session: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.get(session).cloned().unwrap_or_default()
    }
}
