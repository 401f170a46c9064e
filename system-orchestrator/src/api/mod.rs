//! API module
//!
//! HTTP control surface and read side of the orchestrator. Every event
//! published on the bus is forwarded to websocket clients as JSON.

use crate::event_bus::EventBus;
use crate::orchestrator::Orchestrator;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use orchestrator_protocol::{ControlCommand, TradingRequest};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

const DEFAULT_DECISION_LIMIT: usize = 50;

// App State to share with routes
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub events: EventBus,
}

/// Body of `POST /sessions/:session/command`: free text or a typed command.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommandRequest {
    Query { query: String },
    Command(ControlCommand),
}

#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    pub limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .route("/sessions/:session_id/trade", post(start_trading))
        .route("/sessions/:session_id/command", post(run_command))
        .route("/sessions/:session_id/status", get(get_status))
        .route(
            "/sessions/:session_id/instances/:instance_id/decisions",
            get(get_decisions),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_api_server(
    state: AppState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

// WebSocket Handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state.events))
}

async fn handle_socket(mut socket: WebSocket, events: EventBus) {
    let mut rx = events.subscribe();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("WebSocket client lagging, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize event: {}", e);
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn start_trading(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<TradingRequest>,
) -> impl IntoResponse {
    match state.orchestrator.start(&session_id, request).await {
        Ok(ids) => Json(serde_json::json!({"status": "OK", "instances": ids})),
        Err(e) => Json(serde_json::json!({"status": "ERROR", "msg": e.to_string()})),
    }
}

async fn run_command(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Response {
    let response = match request {
        CommandRequest::Command(command) => {
            Some(state.orchestrator.handle_command(&session_id, command))
        }
        CommandRequest::Query { query } => state.orchestrator.handle_query(&session_id, &query),
    };

    match response {
        Some(response) => Json(response).into_response(),
        None => Json(serde_json::json!({"status": "ERROR", "msg": "Not a control command"}))
            .into_response(),
    }
}

async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    Json(
        state
            .orchestrator
            .handle_command(&session_id, ControlCommand::Status),
    )
}

async fn get_decisions(
    State(state): State<AppState>,
    Path((session_id, instance_id)): Path<(String, String)>,
    Query(query): Query<DecisionsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_DECISION_LIMIT);
    match state
        .orchestrator
        .recent_decisions(&session_id, &instance_id, limit)
    {
        Some(decisions) => Json(serde_json::json!({"status": "OK", "decisions": decisions})),
        None => Json(serde_json::json!({"status": "ERROR", "msg": "Instance not found"})),
    }
}
