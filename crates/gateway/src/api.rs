//! Gateway handlers.
//!
//! - `GET  /health`                — liveness probe
//! - `POST /v1/chat`               — one turn, buffered JSON response
//! - `GET  /v1/stream`             — WebSocket carrying the typed message protocol
//! - `POST /v1/stop/{connection}`  — set the stop signal for a connection
//! - `DELETE /v1/stop/{connection}` — clear an unconsumed stop signal
//!
//! The REST endpoint runs the same pipeline as the WebSocket and folds
//! the message stream into a single response; the protocol is identical
//! underneath.

use axum::extract::ws::{Message as WsFrame, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use ragline_core::chat_config::ChatbotConfig;
use ragline_core::envelope::StreamMessage;
use ragline_core::retrieval::RetrievalCandidate;
use ragline_core::signal::StopSignalStore;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ragline_agent::TurnRequest;
use ragline_stream::Emitter;

use crate::SharedState;

// ── Request / Response types ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub config: Option<ChatbotConfig>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub connection_id: String,
    pub answer: String,
    pub context: Vec<RetrievalCandidate>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub connection_id: String,
    pub active: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ── Handlers ──────────────────────────────────────────────────────────

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "query must not be empty".into(),
            }),
        ));
    }

    let session_id = payload
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let connection_id = payload
        .connection_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let config = payload
        .config
        .unwrap_or_else(|| ChatbotConfig::new(&state.config.defaults.model_id));

    info!(session_id = %session_id, "v1/chat request");

    let request = TurnRequest {
        query: payload.query,
        session_id: session_id.clone(),
        connection_id: connection_id.clone(),
        config,
    };

    let (mut emitter, mut rx) = Emitter::channel(64);
    let pipeline = state.pipeline.clone();
    let worker = tokio::spawn(async move {
        pipeline.run(request, &mut emitter).await;
    });

    let mut answer = String::new();
    let mut context = Vec::new();
    let mut error = None;
    while let Some(message) = rx.recv().await {
        match message {
            StreamMessage::Chunk { content } => answer.push_str(&content),
            StreamMessage::Context { docs } => context = docs,
            StreamMessage::Error { message } => error = Some(message),
            _ => {}
        }
    }
    let _ = worker.await;

    match error {
        Some(message) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: message }),
        )),
        None => Ok(Json(ChatResponse {
            session_id,
            connection_id,
            answer,
            context,
        })),
    }
}

pub async fn set_stop_handler(
    State(state): State<SharedState>,
    Path(connection_id): Path<String>,
) -> (StatusCode, Json<StopResponse>) {
    state.stop.set(&connection_id).await;
    (
        StatusCode::ACCEPTED,
        Json(StopResponse {
            connection_id,
            active: true,
        }),
    )
}

pub async fn clear_stop_handler(
    State(state): State<SharedState>,
    Path(connection_id): Path<String>,
) -> Json<StopResponse> {
    state.stop.clear(&connection_id).await;
    Json(StopResponse {
        connection_id,
        active: false,
    })
}

// ── WebSocket ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub connection_id: Option<String>,
}

/// One turn request received over the socket.
#[derive(Deserialize)]
struct WsTurnMessage {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    config: Option<ChatbotConfig>,
}

pub async fn stream_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let connection_id = params
        .connection_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    ws.on_upgrade(move |socket| handle_stream(socket, state, connection_id))
}

/// Turns are handled sequentially per connection; cancellation arrives
/// out of band through the stop endpoints, keyed by connection id.
async fn handle_stream(mut socket: WebSocket, state: SharedState, connection_id: String) {
    info!(connection_id = %connection_id, "Stream connection established");
    let default_session = Uuid::new_v4().to_string();

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(WsFrame::Text(text)) => text,
            Ok(WsFrame::Close(_)) => break,
            Ok(_) => continue, // ignore binary, ping, pong
            Err(_) => break,
        };

        let turn: WsTurnMessage = match serde_json::from_str(&text) {
            Ok(turn) => turn,
            Err(e) => {
                if !send_protocol_error(&mut socket, format!("invalid request: {e}")).await {
                    return;
                }
                continue;
            }
        };

        let request = TurnRequest {
            query: turn.query,
            session_id: turn.session_id.unwrap_or_else(|| default_session.clone()),
            connection_id: connection_id.clone(),
            config: turn
                .config
                .unwrap_or_else(|| ChatbotConfig::new(&state.config.defaults.model_id)),
        };

        let (mut emitter, mut rx) = Emitter::channel(64);
        let pipeline = state.pipeline.clone();
        let worker = tokio::spawn(async move {
            pipeline.run(request, &mut emitter).await;
        });

        while let Some(message) = rx.recv().await {
            if !forward(&mut socket, &message).await {
                worker.abort();
                return; // client disconnected
            }
        }
        let _ = worker.await;
    }

    info!(connection_id = %connection_id, "Stream connection closed");
}

async fn forward(socket: &mut WebSocket, message: &StreamMessage) -> bool {
    let frame = match serde_json::to_string(message) {
        Ok(frame) => frame,
        Err(_) => return true,
    };
    socket.send(WsFrame::Text(frame.into())).await.is_ok()
}

/// A request that never reached the pipeline still gets a well-formed
/// `START`/`ERROR` pair; the connection stays open for the next request.
async fn send_protocol_error(socket: &mut WebSocket, message: String) -> bool {
    let (mut emitter, mut rx) = Emitter::channel(4);
    emitter.error(message).await;
    drop(emitter);
    while let Some(message) = rx.recv().await {
        if !forward(socket, &message).await {
            return false;
        }
    }
    true
}
