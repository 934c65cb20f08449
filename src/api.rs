//! External-interface adapter (§4.7): one axum handler per
//! Match/Registry operation, grounded in the teacher's
//! `Router::new().route(...).with_state(state)` shape.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::unbounded_channel;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::MatchError;
use crate::player_registry::PlayerRegistry;
use crate::registry::{RecentStatus, Registry};
use crate::session::SessionStore;
use crate::types::PlayerIdentity;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub players: Arc<dyn PlayerRegistry>,
    pub sessions: Arc<SessionStore>,
    pub debug_route_enabled: bool,
}

pub fn router(state: AppState) -> Router {
    let debug_route_enabled = state.debug_route_enabled;
    let mut router = Router::new()
        .route("/login", post(login))
        .route("/games", post(create_game))
        .route("/games/recent", get(recent_games))
        .route("/games/{key}", get(get_game))
        .route("/games/{key}/move", post(move_piece))
        .route("/games/{key}/ready", post(set_ready))
        .route("/games/{key}/randomize", post(randomize))
        .route("/games/{key}/newgame", post(new_game))
        .route("/games/{key}/ping", post(ping))
        .route("/ws/{key}", get(observe));

    if debug_route_enabled {
        router = router.route("/games/{key}/debug", post(set_debug));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is after the epoch")
        .as_secs_f64()
}

fn bearer_identity(state: &AppState, headers: &axum::http::HeaderMap) -> Result<PlayerIdentity, MatchError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| MatchError::BadRequest("missing Authorization bearer token".to_string()))?;
    state
        .sessions
        .resolve(token)
        .ok_or_else(|| MatchError::ForbiddenActor("unknown or expired session".to_string()))
}

#[derive(Deserialize)]
struct LoginRequest {
    name: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    id: String,
    name: String,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> impl IntoResponse {
    let (token, identity) = state.sessions.login(req.name);
    Json(LoginResponse {
        token,
        id: identity.id,
        name: identity.name,
    })
}

#[derive(Serialize)]
struct CreateGameResponse {
    key: String,
}

async fn create_game(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<CreateGameResponse>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let handle = state.registry.new_match(identity, now());
    Ok(Json(CreateGameResponse { key: handle.key.clone() }))
}

async fn get_game(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    handle.join(identity);
    let snapshot = handle.snapshot(now());
    Ok(Json(serde_json::to_value(&snapshot).expect("snapshot always serializes")))
}

#[derive(Deserialize)]
struct MoveRequest {
    from: String,
    to: String,
}

async fn move_piece(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
    Json(req): Json<MoveRequest>,
) -> Result<Json<serde_json::Value>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    handle.move_piece(&identity, &req.from, &req.to, now())?;
    report_results(&state, &handle).await;
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

#[derive(Deserialize)]
struct ReadyRequest {
    ready: bool,
}

async fn set_ready(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<serde_json::Value>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    handle.set_ready(&identity, req.ready, now())?;
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

async fn randomize(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, MatchError> {
    bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    handle.randomize(now())?;
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

async fn new_game(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .new_game(&key, &identity, now())
        .ok_or_else(|| MatchError::ForbiddenActor("not a party to this match".to_string()))?;
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

async fn ping(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, MatchError> {
    bearer_identity(&state, &headers)?;
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    report_results(&state, &handle).await;
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

#[derive(Deserialize)]
struct DebugRequest {
    debug_no_time: bool,
}

async fn set_debug(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<DebugRequest>,
) -> Result<Json<serde_json::Value>, MatchError> {
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    handle.set_debug_no_time(req.debug_no_time);
    Ok(Json(serde_json::to_value(&handle.snapshot(now())).unwrap()))
}

#[derive(Deserialize)]
struct RecentQuery {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct RecentGameEntry {
    key: String,
    status: &'static str,
}

async fn recent_games(
    State(state): State<AppState>,
    Query(_query): Query<RecentQuery>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Vec<RecentGameEntry>>, MatchError> {
    let identity = bearer_identity(&state, &headers)?;
    let entries = state
        .registry
        .recent(&identity, now())
        .into_iter()
        .map(|m| RecentGameEntry {
            key: m.key,
            status: match m.status {
                RecentStatus::Joinable => "joinable",
                RecentStatus::Returnable => "returnable",
                RecentStatus::Observable => "observable",
            },
        })
        .collect();
    Ok(Json(entries))
}

async fn observe(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, MatchError> {
    let handle = state
        .registry
        .get(&key, now())
        .ok_or_else(|| MatchError::NotFound(format!("no match at key {key:?}")))?;
    Ok(ws.on_upgrade(move |socket| observer_loop(socket, handle)))
}

async fn observer_loop(mut socket: WebSocket, handle: Arc<crate::match_engine::MatchHandle>) {
    let (tx, mut rx) = unbounded_channel::<String>();
    handle.subscribe(tx, now());

    while let Some(payload) = rx.recv().await {
        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

/// Shared by `/move` and `/ping`: if the game just ended, report the
/// result to the Player Registry outside any match lock.
async fn report_results(state: &AppState, handle: &crate::match_engine::MatchHandle) {
    if let Some(pending) = handle.report_results_if_over(now()) {
        if let Err(err) = state.players.record_result(&pending.winner.name, &pending.loser.name).await {
            tracing::error!(error = %err, "failed to persist match result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player_registry::SqlitePlayerRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let players = SqlitePlayerRegistry::new(pool);
        players.migrate().await.unwrap();
        AppState {
            registry: Arc::new(Registry::new()),
            players: Arc::new(players),
            sessions: Arc::new(SessionStore::new()),
            debug_route_enabled: true,
        }
    }

    async fn login_token(app: &Router, name: &str) -> String {
        let body = format!(r#"{{"name":"{name}"}}"#);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_and_fetch_game_round_trips() {
        let app = router(test_state().await);
        let token = login_token(&app, "alice").await;

        let create = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/games")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create.status(), StatusCode::OK);
        let bytes = to_bytes(create.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let key = value["key"].as_str().unwrap().to_string();

        let fetch = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/games/{key}"))
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetch.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_unknown_game_is_404() {
        let app = router(test_state().await);
        let token = login_token(&app, "alice").await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/games/NOPE0000")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_bearer_token_is_bad_request() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/games")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
