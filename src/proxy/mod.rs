//! Companion HTTP function: issues live-channel credentials to clients and
//! publishes score updates through the managed datastream.

pub mod broker;
pub mod synthetic;

pub use broker::{ChannelBroker, ManagedDatastream};

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::models::{MatchRecord, ScoreUpdateEnvelope};

/// Connection name reported to the broker for client token pairs.
const CONNECTION_NAME: &str = "cricketScoreUpdates";

#[derive(Clone)]
pub struct ProxyState {
    pub broker: Arc<dyn ChannelBroker>,
    pub channel_id: String,
}

type ProxyResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

fn failure(context: &str, e: anyhow::Error) -> (StatusCode, Json<Value>) {
    error!("[Proxy] {}: {:#}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": format!("{:#}", e) })),
    )
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/cricket-scores", get(credentials_handler))
        .route(
            "/publish-cricket-update",
            get(publish_synthetic_handler).post(publish_record_handler),
        )
        .route("/datastreams", get(datastreams_handler))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /cricket-scores – token pair for one client connection
async fn credentials_handler(State(state): State<Arc<ProxyState>>) -> ProxyResult {
    let pair = state
        .broker
        .token_pair(&state.channel_id, CONNECTION_NAME)
        .await
        .map_err(|e| failure("Error getting cricket scores", e))?;

    info!("[Proxy] Issued token pair for channel {}", state.channel_id);
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "websocket": {
                "url": pair.url,
                "zuid": pair.subject_id(),
                "key": pair.key,
            },
            "channelId": state.channel_id,
        })),
    ))
}

async fn publish<T: Serialize>(state: &ProxyState, data: T) -> ProxyResult {
    let envelope = ScoreUpdateEnvelope::new(data);
    let payload = serde_json::to_value(&envelope)
        .map_err(|e| failure("Error encoding cricket update", e.into()))?;

    state
        .broker
        .publish(&state.channel_id, &payload)
        .await
        .map_err(|e| failure("Error publishing cricket update", e))?;

    info!("[Proxy] Cricket score published to channel {}", state.channel_id);
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Cricket score update published",
            "data": payload["data"],
        })),
    ))
}

/// GET /publish-cricket-update – random demo scoreline
async fn publish_synthetic_handler(State(state): State<Arc<ProxyState>>) -> ProxyResult {
    let update = synthetic::synthetic_update(&mut rand::thread_rng(), Utc::now());
    publish(&state, update).await
}

/// POST /publish-cricket-update – publish a caller-supplied record
async fn publish_record_handler(
    State(state): State<Arc<ProxyState>>,
    Json(record): Json<MatchRecord>,
) -> ProxyResult {
    publish(&state, record).await
}

/// GET /datastreams – channel diagnostics
async fn datastreams_handler(State(state): State<Arc<ProxyState>>) -> ProxyResult {
    let channel = state
        .broker
        .channel_details(&state.channel_id)
        .await
        .map_err(|e| failure("Error fetching channel details", e))?;
    let live_count = state
        .broker
        .live_count(&state.channel_id)
        .await
        .map_err(|e| failure("Error fetching live count", e))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "channelId": state.channel_id,
            "channel": channel,
            "liveCount": live_count,
        })),
    ))
}

async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

const INDEX_HTML: &str = "<h1>Cricket Score DataStream Service</h1>\
<p>Available endpoints:</p>\
<ul>\
<li>/cricket-scores - Get WebSocket connection details</li>\
<li>/publish-cricket-update - Publish cricket score update</li>\
<li>/datastreams - Test DataStreams functionality</li>\
</ul>";
