//! Front Controller (F): thin HTTP routing per spec.md §6. Every handler
//! validates, delegates to an actor or store, and maps the result onto a
//! status code — no game logic lives here.

use std::sync::Arc;

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{issue_session_token, validate_init_data, verify_session_token, AuthError};
use crate::matchmaker::{MatchmakerHandle, MatchResult};
use crate::room::{LobbyPlayer, RoomRegistry};
use crate::rules::RoomConfig;
use crate::store::{RoomStore, UserStore};
use crate::types::{PlayerId, RoomId};

#[derive(Clone)]
pub struct AppState {
    pub bot_token: Arc<str>,
    pub app_secret: Arc<[u8]>,
    pub rooms: RoomRegistry,
    pub matchmaker: MatchmakerHandle,
    pub room_store: Arc<dyn RoomStore>,
    pub user_store: Arc<dyn UserStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/telegram", post(auth_telegram))
        .route("/api/matchmaking", post(matchmaking))
        .route("/api/room/create", post(create_room))
        .route("/ws/:room_id", get(ws_upgrade))
        .layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct ApiError(StatusCode, &'static str);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

fn bearer_player_id(headers: &HeaderMap, app_secret: &[u8]) -> Result<PlayerId, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError(StatusCode::UNAUTHORIZED, "missing bearer session"))?;
    let token = header.strip_prefix("Bearer ").ok_or(ApiError(StatusCode::UNAUTHORIZED, "malformed authorization header"))?;
    verify_session_token(token, app_secret).map_err(|e| match e {
        AuthError::SessionExpired => ApiError(StatusCode::UNAUTHORIZED, "session expired"),
        _ => ApiError(StatusCode::UNAUTHORIZED, "invalid session"),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthTelegramRequest {
    init_data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthTelegramUser {
    id: uuid::Uuid,
    first_name: String,
    username: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthTelegramResponse {
    session_token: String,
    user: AuthTelegramUser,
}

async fn auth_telegram(State(state): State<AppState>, Json(req): Json<AuthTelegramRequest>) -> Result<Json<AuthTelegramResponse>, ApiError> {
    let telegram_user =
        validate_init_data(&req.init_data, &state.bot_token).map_err(|_| ApiError(StatusCode::UNAUTHORIZED, "hash mismatch"))?;

    let record = state
        .user_store
        .upsert(
            &telegram_user.id.to_string(),
            &telegram_user.first_name,
            telegram_user.username.as_deref(),
            telegram_user.language_code.as_deref(),
        )
        .await
        .map_err(|_| ApiError(StatusCode::INTERNAL_SERVER_ERROR, "user store write failed"))?;

    let session_token = issue_session_token(record.id, &state.app_secret);
    Ok(Json(AuthTelegramResponse {
        session_token,
        user: AuthTelegramUser { id: record.id, first_name: record.first_name, username: record.username },
    }))
}

#[derive(Deserialize)]
struct MatchmakingRequest {
    #[serde(flatten)]
    config: RoomConfig,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum MatchmakingResponse {
    Queued,
    Matched { room_id: RoomId, ws_url: String },
}

async fn matchmaking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MatchmakingRequest>,
) -> Result<Json<MatchmakingResponse>, ApiError> {
    let player_id = bearer_player_id(&headers, &state.app_secret)?;
    let result = state
        .matchmaker
        .enqueue(player_id, req.config)
        .await
        .map_err(|_| ApiError(StatusCode::INTERNAL_SERVER_ERROR, "matchmaking failed"))?;

    Ok(Json(match result {
        MatchResult::Queued => MatchmakingResponse::Queued,
        MatchResult::Matched { room_id } => MatchmakingResponse::Matched { room_id, ws_url: ws_url(room_id) },
    }))
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    #[serde(flatten)]
    config: RoomConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: RoomId,
    ws_url: String,
    config: RoomConfig,
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let player_id = bearer_player_id(&headers, &state.app_secret)?;
    let room_id = RoomId::new();
    let handle = state.rooms.get_or_spawn(room_id, state.room_store.clone());
    let host = LobbyPlayer { id: player_id, display_name: player_id.to_string(), connected: false, ready: false };
    handle
        .init_lobby(vec![host], req.config)
        .await
        .map_err(|_| ApiError(StatusCode::INTERNAL_SERVER_ERROR, "room init failed"))?;

    Ok(Json(CreateRoomResponse { room_id, ws_url: ws_url(room_id), config: req.config }))
}

fn ws_url(room_id: RoomId) -> String {
    format!("/ws/{room_id}")
}

/// Per spec.md §6, the upgrade itself is unauthenticated: the client's
/// first WS frame must be `{type:"JOIN", sessionToken}`, validated inside
/// `ws::connection::handle_socket` against `U` (see spec.md §4.2's
/// `attachSocket` contract). A bare 404 here only covers "no such room";
/// an absent/expired session is a connection-level concern, not an HTTP one.
async fn ws_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.rooms.get(room_id).ok_or(ApiError(StatusCode::NOT_FOUND, "room not found"))?;
    let app_secret = state.app_secret.clone();

    Ok(ws.on_upgrade(move |socket| crate::ws::connection::handle_socket(handle, app_secret, socket)))
}
