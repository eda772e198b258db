//! HTTP surface over the tool dispatcher.
//!
//! `POST /tool` is the canonical entry: `{"name": ..., "input": {...}}`.
//! Convenience GET routes wrap the idempotent read tools. Handlers run to
//! completion over shared memory and local files; they never block the
//! broker's tick loop.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::tools::{dispatch, ToolError};

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    input: Value,
}

fn tool_response(result: Result<Value, ToolError>) -> impl IntoResponse {
    match result {
        Ok(result) => (StatusCode::OK, Json(json!({"ok": true, "result": result}))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "kind": e.kind, "message": e.message})),
        ),
    }
}

async fn handle_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, &call.name, &call.input).await)
}

macro_rules! get_tool {
    ($fn_name:ident, $tool:literal) => {
        async fn $fn_name(State(state): State<AppState>) -> impl IntoResponse {
            tool_response(dispatch(&state, $tool, &Value::Null).await)
        }
    };
}

get_tool!(handle_state, "get_state");
get_tool!(handle_identity, "get_identity");
get_tool!(handle_sensors, "read_sensors");
get_tool!(handle_calibration, "get_calibration");
get_tool!(handle_health_full, "get_health");
get_tool!(handle_trajectory, "get_trajectory");
get_tool!(handle_next_steps, "next_steps");
get_tool!(handle_eisv, "get_eisv_trajectory_state");

async fn handle_set_calibration(
    State(state): State<AppState>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, "set_calibration", &input).await)
}

async fn handle_message(
    State(state): State<AppState>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, "post_message", &input).await)
}

async fn handle_qa(
    State(state): State<AppState>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, "lumen_qa", &input).await)
}

async fn handle_note(
    State(state): State<AppState>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, "leave_agent_note", &input).await)
}

async fn handle_workflow(
    State(state): State<AppState>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    tool_response(dispatch(&state, "unified_workflow", &input).await)
}

async fn liveness() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/tool", post(handle_tool))
        .route("/state", get(handle_state))
        .route("/identity", get(handle_identity))
        .route("/sensors", get(handle_sensors))
        .route("/calibration", get(handle_calibration).post(handle_set_calibration))
        .route("/health/full", get(handle_health_full))
        .route("/trajectory", get(handle_trajectory))
        .route("/eisv", get(handle_eisv))
        .route("/next_steps", get(handle_next_steps))
        .route("/message", post(handle_message))
        .route("/qa", post(handle_qa))
        .route("/note", post(handle_note))
        .route("/workflow", post(handle_workflow))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve; returns the spawned task handle.
pub fn serve(state: AppState, host: &str, port: u16) -> tokio::task::JoinHandle<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Server failed to bind {}: {}", addr, e);
                return;
            }
        };
        tracing::info!("Tool surface listening on {}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    })
}
