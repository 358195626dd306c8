use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::rules::{GameState, RoomConfig};
use crate::types::{PlayerId, RoomId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub connected: bool,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Lobby,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMeta {
    pub room_id: RoomId,
    pub host_id: PlayerId,
    pub config: RoomConfig,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The durable shape written to `room/{roomId}` on every mutation (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRoom {
    pub meta: RoomMeta,
    pub lobby_players: Vec<LobbyPlayer>,
    pub phase: RoomPhase,
    pub game: Option<GameState>,
}

