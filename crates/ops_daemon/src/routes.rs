use crate::state::{AppState, StreamFrame};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use ops_core::{ActionError, ActionKind, ActionProposal, DashboardView, EventEnvelope};
use serde::Deserialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, HeaderValue::from_static("http://localhost:5173"))
}

pub fn make_router_with_cors(state: AppState, cors_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/view", get(view_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/api/v1/alerts", get(alerts_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/actions/propose", post(propose_handler))
        .route("/api/v1/actions/commit", post(commit_handler))
        .route("/api/v1/source/toggle", post(toggle_source_handler))
        .route("/api/v1/view/switch", post(switch_view_handler))
        .route("/api/v1/chat", post(chat_handler))
        .route("/api/v1/reset", post(reset_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Errors ---

pub enum HttpApiError {
    Action(ActionError),
    Internal(String),
}

impl From<ActionError> for HttpApiError {
    fn from(err: ActionError) -> Self {
        Self::Action(err)
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Action(err) => {
                let (status, code) = match err {
                    ActionError::InvalidIndex { .. } => (StatusCode::NOT_FOUND, "invalid_index"),
                    ActionError::StaleProposal { .. } => (StatusCode::CONFLICT, "stale_proposal"),
                    ActionError::UnknownView(_) => (StatusCode::BAD_REQUEST, "unknown_view"),
                };
                (status, code, err.to_string())
            }
            Self::Internal(message) => {
                tracing::error!("{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        };
        (
            status,
            Json(serde_json::json!({"error": code, "message": message})),
        )
            .into_response()
    }
}

// --- Reads ---

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let paused = app_state.paused.load(Ordering::Relaxed);
    Json(serde_json::json!({
        "tick": sim.state.meta.tick,
        "seed": sim.state.meta.seed,
        "content_version": sim.state.meta.content_version,
        "tick_ms": app_state.tick_period.as_millis(),
        "operator": sim.operator_mode,
        "paused": paused,
    }))
}

pub async fn view_handler(State(app_state): State<AppState>) -> Json<DashboardView> {
    let sim = app_state.sim.lock();
    Json(ops_core::project(&sim.state, &sim.content))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app_state.sim.lock();
    match serde_json::to_string(&sim.state) {
        Ok(json) => {
            drop(sim);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
        }
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            drop(sim);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn metrics_handler(
    State(app_state): State<AppState>,
) -> Json<VecDeque<ops_core::MetricsSnapshot>> {
    let sim = app_state.sim.lock();
    Json(sim.metrics_history.clone())
}

async fn alerts_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    Json(serde_json::json!({ "active_alerts": sim.alert_engine.active_alert_ids() }))
}

// --- Operator input ---

#[derive(Deserialize)]
pub struct ProposeRequest {
    pub kind: ActionKind,
    pub index: usize,
}

/// Computes the confirmation text and savings delta without touching state.
pub async fn propose_handler(
    State(app_state): State<AppState>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<ActionProposal>, HttpApiError> {
    let sim = app_state.sim.lock();
    let proposal = ops_core::propose_action(&sim.state, &sim.content, req.kind, req.index)?;
    Ok(Json(proposal))
}

pub async fn commit_handler(
    State(app_state): State<AppState>,
    Json(proposal): Json<ActionProposal>,
) -> Result<Json<StreamFrame>, HttpApiError> {
    let mut sim = app_state.sim.lock();
    let sim = &mut *sim;
    let events = ops_core::commit_action(&mut sim.state, &sim.content, &proposal)?;
    tracing::info!(kind = ?proposal.kind, target = %proposal.target, "action committed");
    Ok(Json(respond_and_publish(&app_state, sim, events)))
}

pub async fn toggle_source_handler(State(app_state): State<AppState>) -> Json<StreamFrame> {
    let mut sim = app_state.sim.lock();
    let sim = &mut *sim;
    let events = ops_core::toggle_source(&mut sim.state, &sim.content);
    Json(respond_and_publish(&app_state, sim, events))
}

#[derive(Deserialize)]
pub struct SwitchViewRequest {
    pub view: String,
}

pub async fn switch_view_handler(
    State(app_state): State<AppState>,
    Json(req): Json<SwitchViewRequest>,
) -> Result<Json<StreamFrame>, HttpApiError> {
    let mut sim = app_state.sim.lock();
    let events = ops_core::switch_view(&mut sim.state, &req.view)?;
    Ok(Json(respond_and_publish(&app_state, &sim, events)))
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Blank messages are ignored and answer with `"exchange": null`.
pub async fn chat_handler(
    State(app_state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<serde_json::Value> {
    let mut sim = app_state.sim.lock();
    let sim = &mut *sim;
    let exchange = ops_core::send_chat_message(&mut sim.state, &sim.content, &req.message);
    if exchange.is_some() {
        app_state.publish(sim, Vec::new());
    }
    Json(serde_json::json!({ "exchange": exchange }))
}

#[derive(Deserialize, Default)]
pub struct ResetRequest {
    pub seed: Option<u64>,
}

/// Rebuilds the dashboard from content. Without a seed, the current one is reused.
pub async fn reset_handler(
    State(app_state): State<AppState>,
    body: Option<Json<ResetRequest>>,
) -> Result<Json<serde_json::Value>, HttpApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let mut sim = app_state.sim.lock();
    let seed = req.seed.unwrap_or(sim.state.meta.seed);
    sim.reset(seed)
        .map_err(|err| HttpApiError::Internal(format!("reset failed: {err:#}")))?;
    tracing::info!(seed, "dashboard reset");
    app_state.publish(&sim, Vec::new());
    Ok(Json(serde_json::json!({"tick": sim.state.meta.tick, "seed": seed})))
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

fn respond_and_publish(
    app_state: &AppState,
    sim: &crate::state::DashboardSim,
    events: Vec<EventEnvelope>,
) -> StreamFrame {
    let frame = StreamFrame {
        events,
        view: ops_core::project(&sim.state, &sim.content),
    };
    let _ = app_state.frame_tx.send(frame.clone());
    frame
}

// --- Stream ---

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.frame_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(frame) => {
                            let data = serde_json::to_string(&frame).unwrap_or_default();
                            yield Ok(Event::default().event("frame").data(data));
                        }
                        // A slow client only needs the newest view; skip to it.
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "stream subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let tick = sim.lock().state.meta.tick;
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick});
                    yield Ok(Event::default().event("heartbeat").data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
