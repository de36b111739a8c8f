use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use wayfarer::{
    assistant::{Assistant, AssistantConfig},
    conversation::Conversation,
    events::AssistantEvent,
    registry::ToolSet,
    tools::{
        DistanceMatrix, Geocode, OptimizeRoute, ReadWebsite, SearchInternet, SearchNearbyPlaces,
    },
};

use super::{location::lookup_location, session_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query_type: String,
    query: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum QueryKind {
    Trip,
    Restaurant,
    Place,
}

impl QueryKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trip" => Some(Self::Trip),
            "restaurant" => Some(Self::Restaurant),
            "place" => Some(Self::Place),
            _ => None,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Restaurant => "restaurant",
            Self::Place => "place",
        }
    }
}

// Plain-text chunked response backed by the forwarder channel
struct StreamedText {
    rx: ReceiverStream<String>,
}

impl StreamedText {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for StreamedText {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for StreamedText {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

const TRIP_PROMPT: &str = "You are an AI trip planner.\n\
    The user wants to travel, given a set of places and waypoints.\n\
    \n\
    Your goal is to create a detailed trip plan including:\n\
    1. Route information (directions, distances, estimated travel times).\n\
    2. Suggested activities and attractions along the route and at the destination.\n\
    3. Potential accommodation options at the destination.\n\
    4. Any relevant warnings or advisories for the trip (e.g., road closures, weather).\n\
    \n\
    Use tools to gather the necessary information. Provide the plan.";

fn system_prompt(kind: QueryKind, location: &str, preferences: &str) -> String {
    match kind {
        QueryKind::Trip => TRIP_PROMPT.to_string(),
        QueryKind::Restaurant | QueryKind::Place => {
            let noun = kind.noun();
            let action = if kind == QueryKind::Restaurant {
                "eat"
            } else {
                "visit"
            };
            let additional_info = if kind == QueryKind::Restaurant {
                "recommended menu options, expected price to eat there & overall restaurant rating"
            } else {
                "recommended activities, expected costs & overall ratings"
            };
            format!(
                "You are an AI assistant helping a user find {noun}s in {location}.\n\
                 The user is looking for a {noun} to {action}.\n\
                 The user's preferences are: {preferences}.\n\
                 Your goal is to build a report of the top 5 {noun}s that might suit \
                 the user's preferences, including {additional_info}."
            )
        }
    }
}

fn tool_set_for(kind: QueryKind, state: &AppState) -> Result<ToolSet, wayfarer::errors::AssistantError> {
    let client = state.client.clone();
    let settings = state.tools.clone();
    match kind {
        QueryKind::Trip => ToolSet::new(vec![
            Arc::new(SearchInternet::new(client.clone(), settings.clone())) as _,
            Arc::new(ReadWebsite::new(client.clone())) as _,
            Arc::new(Geocode::new(client.clone(), settings.clone())) as _,
            Arc::new(DistanceMatrix::new(client, settings)) as _,
            Arc::new(OptimizeRoute::new()) as _,
        ]),
        QueryKind::Restaurant | QueryKind::Place => ToolSet::new(vec![
            Arc::new(SearchInternet::new(client.clone(), settings.clone())) as _,
            Arc::new(ReadWebsite::new(client.clone())) as _,
            Arc::new(SearchNearbyPlaces::new(client, settings)) as _,
        ]),
    }
}

// How each event appears in the plain-text body. Completed renders
// nothing; the stream simply closes.
fn render_event(event: &AssistantEvent) -> Option<String> {
    match event {
        AssistantEvent::Text(text) => Some(text.clone()),
        AssistantEvent::ToolStarted { name, .. } => Some(format!("\n[running {name}...]\n")),
        AssistantEvent::ToolCompleted { name, error, .. } => {
            let outcome = if *error { "failed" } else { "ok" };
            Some(format!("[{name} {outcome}]\n"))
        }
        AssistantEvent::Completed => None,
        _ => None,
    }
}

async fn query_assistant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<StreamedText, StatusCode> {
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let Some(kind) = QueryKind::parse(&request.query_type) else {
        let message = format!(
            "Invalid query type: {}. Supported types are 'restaurant', 'place', and 'trip'.",
            request.query_type
        );
        tokio::spawn(async move {
            let _ = tx.send(message).await;
        });
        return Ok(StreamedText::new(stream));
    };

    let session = session_id(&headers);
    let preferences = state.preferences.list(&session).join(", ");
    let location = match lookup_location(&state.client, &state.location_host).await {
        Some(location) => format!("{}, {}", location.city, location.country),
        None => "Unknown, Unknown".to_string(),
    };

    let tools = tool_set_for(kind, &state).map_err(|e| {
        tracing::error!("failed to build tool set: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let conversation = Conversation::new(system_prompt(kind, &location, &preferences), tools)
        .with_user(request.query);

    let provider = Arc::clone(&state.provider);
    let max_rounds = state.max_rounds;

    // Forward events into the channel; the heartbeat notices a
    // disconnected client and drops the stream, cancelling any tools
    // still in flight.
    tokio::spawn(async move {
        let assistant = Assistant::with_config(provider, AssistantConfig { max_rounds });
        let mut stream = assistant.reply(conversation);

        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(Ok(event))) => {
                    let done = matches!(event, AssistantEvent::Completed);
                    if let Some(text) = render_event(&event) {
                        if tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    if done {
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("assistant stream failed: {}", e);
                    let _ = tx.send(format!("\nerror: {e}\n")).await;
                    break;
                }
                Ok(None) => {
                    break;
                }
                Err(_) => {
                    // Heartbeat, used to detect disconnected clients and
                    // then end running tools.
                    if tx.is_closed() {
                        break;
                    }
                    continue;
                }
            }
        }
    });

    Ok(StreamedText::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/query_assistant", post(query_assistant))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wayfarer::providers::base::ModelEvent;
    use wayfarer::providers::mock::MockProvider;

    fn query(query_type: &str, query: &str) -> Request<Body> {
        Request::builder()
            .uri("/query_assistant")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(format!(
                r#"{{"query_type": "{query_type}", "query": "{query}"}}"#
            )))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_query_type_short_circuits() {
        let provider = MockProvider::new(vec![]);
        let app = routes(test_state(provider.clone()));

        let response = app.oneshot(query("hotel", "anything")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert_eq!(
            body,
            "Invalid query type: hotel. Supported types are 'restaurant', 'place', and 'trip'."
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_streams_model_text() {
        let provider = MockProvider::new(vec![vec![
            ModelEvent::TextDelta("Here are ".to_string()),
            ModelEvent::TextDelta("three options.".to_string()),
            ModelEvent::Stop { tool_use: false },
        ]]);
        let app = routes(test_state(provider.clone()));

        let response = app
            .oneshot(query("restaurant", "cheap lunch nearby"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );

        let body = body_text(response).await;
        assert_eq!(body, "Here are three options.");
        assert_eq!(provider.calls(), 1);

        let seen = provider.seen();
        let first_turn = &seen[0];
        assert_eq!(first_turn.len(), 1);
        assert_eq!(first_turn[0].text(), "cheap lunch nearby");
    }

    #[tokio::test]
    async fn test_query_runs_tools_and_streams_markers() {
        let mut search = mockito::Server::new_async().await;
        search
            .mock("POST", "/search")
            .with_status(200)
            .with_body(
                r#"{"results": [
                    {"title": "Best pasta in town", "url": "https://example.com/pasta", "content": "A roundup."}
                ]}"#,
            )
            .create_async()
            .await;

        let provider = MockProvider::new(vec![
            vec![
                ModelEvent::ToolUse {
                    id: "t1".to_string(),
                    call: wayfarer::models::ToolCall::new(
                        "search_internet",
                        serde_json::json!({"query": "pasta nearby"}),
                    ),
                },
                ModelEvent::Stop { tool_use: true },
            ],
            vec![
                ModelEvent::TextDelta("Top pick: Best pasta in town.".to_string()),
                ModelEvent::Stop { tool_use: false },
            ],
        ]);
        let mut state = test_state(provider.clone());
        state.tools.search_host = search.url();
        let app = routes(state);

        let response = app
            .oneshot(query("restaurant", "pasta nearby"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("\n[running search_internet...]\n"));
        assert!(body.contains("[search_internet ok]\n"));
        assert!(body.ends_with("Top pick: Best pasta in town."));
        assert_eq!(provider.calls(), 2);

        // The second round carried the search results back to the model.
        let round_two = &provider.seen()[1];
        let result = round_two
            .iter()
            .flat_map(|m| m.content.iter())
            .find_map(|c| c.as_tool_result())
            .unwrap();
        assert_eq!(result.id, "t1");
        assert!(result.result.as_ref().unwrap().contains("Best pasta in town"));
    }

    #[tokio::test]
    async fn test_stream_error_is_reported_in_body() {
        // A model stream that ends without a stop event is a terminal error.
        let provider = MockProvider::new(vec![vec![ModelEvent::TextDelta(
            "partial".to_string(),
        )]]);
        let app = routes(test_state(provider));

        let response = app.oneshot(query("place", "museums")).await.unwrap();
        let body = body_text(response).await;
        assert!(body.starts_with("partial"));
        assert!(body.contains("\nerror: "));
    }

    #[test]
    fn test_trip_queries_get_routing_tools() {
        let state = test_state(MockProvider::new(vec![]));

        let trip_tools = tool_set_for(QueryKind::Trip, &state).unwrap();
        let names: Vec<String> = trip_tools
            .definitions()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert!(names.contains(&"geocode".to_string()));
        assert!(names.contains(&"distance_matrix".to_string()));
        assert!(names.contains(&"optimize_route".to_string()));
        assert!(!names.contains(&"search_nearby_places".to_string()));

        let place_tools = tool_set_for(QueryKind::Place, &state).unwrap();
        let names: Vec<String> = place_tools
            .definitions()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert!(names.contains(&"search_nearby_places".to_string()));
        assert!(!names.contains(&"optimize_route".to_string()));
    }

    #[test]
    fn test_report_prompt_interpolates_context() {
        let prompt = system_prompt(
            QueryKind::Restaurant,
            "Seattle, United States",
            "vegetarian, outdoor seating",
        );
        assert!(prompt.contains("find restaurants in Seattle, United States"));
        assert!(prompt.contains("a restaurant to eat"));
        assert!(prompt.contains("vegetarian, outdoor seating"));
        assert!(prompt.contains("recommended menu options"));

        let prompt = system_prompt(QueryKind::Place, "Lisbon, Portugal", "");
        assert!(prompt.contains("a place to visit"));
        assert!(prompt.contains("recommended activities"));

        assert!(system_prompt(QueryKind::Trip, "", "").contains("trip planner"));
    }

    #[test]
    fn test_render_event_markers() {
        assert_eq!(
            render_event(&AssistantEvent::Text("hi".to_string())),
            Some("hi".to_string())
        );
        assert_eq!(
            render_event(&AssistantEvent::ToolStarted {
                id: "t1".to_string(),
                name: "geocode".to_string(),
            }),
            Some("\n[running geocode...]\n".to_string())
        );
        assert_eq!(
            render_event(&AssistantEvent::ToolCompleted {
                id: "t1".to_string(),
                name: "geocode".to_string(),
                error: true,
            }),
            Some("[geocode failed]\n".to_string())
        );
        assert_eq!(render_event(&AssistantEvent::Completed), None);
    }
}
