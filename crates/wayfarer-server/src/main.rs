mod configuration;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use wayfarer::providers::anthropic::AnthropicProvider;

use configuration::Settings;
use state::{AppState, PreferenceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let provider = AnthropicProvider::new(settings.provider.into_config())?;
    let state = AppState {
        provider: Arc::new(provider),
        tools: settings.tools.into_settings(),
        preferences: PreferenceStore::new(),
        client: reqwest::Client::new(),
        max_rounds: settings.assistant.max_rounds,
        segmenter_url: settings.segmenter.url,
        tourguide_url: settings.tourguide.url,
        location_host: settings.location.host,
    };

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
