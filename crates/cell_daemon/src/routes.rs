use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use cell_control::suggest_hint;
use cell_core::{
    compute_metrics, resolve_move, Command, EventEnvelope, MatchMetrics, MoveAction, MovePayload,
    NodeType, Position,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173").unwrap()
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin {cors_origin:?}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/api/v1/hint", get(hint_handler))
        .route("/api/v1/history", get(history_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/move", post(move_handler))
        .route("/api/v1/place", post(place_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let state = &sim.match_state;
    Json(serde_json::json!({
        "match_id": state.meta.match_id,
        "level": state.meta.level,
        "mode": state.setup.mode,
        "tick": state.meta.tick,
        "seed": state.meta.seed,
        "content_version": state.meta.content_version,
        "ticks_per_sec": app_state.ticks_per_sec,
        "seconds_left": state.round.seconds_left,
        "turn": {
            "color": state.turn.current_player(),
            "number": state.turn.turn_number,
            "phase": state.turn.phase,
        },
        "input_side": sim.input_side(),
        "networked": sim.network.is_some(),
        "outcome": state.outcome,
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app_state.sim.lock();
    match serde_json::to_string(&sim.match_state) {
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

pub async fn metrics_handler(State(app_state): State<AppState>) -> Json<MatchMetrics> {
    let sim = app_state.sim.lock();
    Json(compute_metrics(&sim.match_state))
}

#[derive(Serialize)]
struct HintResponse {
    #[serde(flatten)]
    payload: MovePayload,
    kind: cell_core::MoveKind,
    score: f32,
}

pub async fn hint_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let state = &sim.match_state;
    let hint = suggest_hint(state, &sim.content.constants, sim.input_side()).map(|planned| {
        HintResponse {
            payload: MovePayload::between(
                state,
                MoveAction::Connect,
                planned.source,
                planned.target,
            ),
            kind: planned.kind,
            score: planned.score,
        }
    });
    Json(serde_json::json!({ "hint": hint }))
}

pub async fn history_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let sim = app_state.sim.lock();
    match &sim.final_history {
        Some(history) => (StatusCode::OK, Json(serde_json::json!(history))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "match still running"})),
        ),
    }
}

fn rejected(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "error": message })),
    )
}

/// Accepts the same move objects that travel between peers. Accepted moves
/// are queued for the next tick; game-rule rejections stay silent.
pub async fn move_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<MovePayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut sim = app_state.sim.lock();
    if payload.action == MoveAction::Pass {
        return rejected("pass is only sent when a turn times out");
    }
    let Some((from, to)) = resolve_move(&sim.match_state, &payload) else {
        return rejected("no node at the given position");
    };
    let command = match payload.action {
        MoveAction::Cancel => {
            let side = sim.input_side();
            let found = sim
                .match_state
                .connections
                .values()
                .find(|c| c.source == from && c.target == to && c.owner == side)
                .map(|c| c.id);
            match found {
                Some(connection) => Command::Cancel { connection },
                None => return rejected("no such connection"),
            }
        }
        _ => Command::Connect { from, to },
    };
    let id = sim.submit(command);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "command_id": id })),
    )
}

#[derive(Deserialize)]
pub struct PlaceRequest {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

pub async fn place_handler(
    State(app_state): State<AppState>,
    Json(request): Json<PlaceRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut sim = app_state.sim.lock();
    let id = sim.submit(Command::PlaceNode {
        position: Position::new(request.x, request.y),
        node_type: request.node_type,
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "command_id": id })),
    )
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(500));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let (tick, seconds_left) = {
                        let guard = sim.lock();
                        (guard.match_state.meta.tick, guard.match_state.round.seconds_left)
                    };
                    let hb = serde_json::json!({
                        "heartbeat": true,
                        "tick": tick,
                        "seconds_left": seconds_left,
                    });
                    yield Ok(Event::default().data(hb.to_string()));
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
