use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::ErrorFrame;
use crate::rules::{Card, GameView, RoomConfig};
use crate::types::{PlayerId, RoomId};

use super::actor::RoomError;
use super::state::LobbyPlayer;

/// Client WebSocket frames, decoded once into a closed variant set rather
/// than dispatched on a stringly-typed `type` field per call site.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Join { session_token: String },
    Ready { ready: bool },
    Start,
    Attack { card: Card },
    Defend { attack_index: usize, card: Card },
    Transfer { card: Card },
    Take,
    Beat,
    Pass,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub connected: bool,
    pub ready: bool,
}

impl From<&LobbyPlayer> for LobbyPlayerView {
    fn from(p: &LobbyPlayer) -> Self {
        LobbyPlayerView { id: p.id, display_name: p.display_name.clone(), connected: p.connected, ready: p.ready }
    }
}

/// The room's STATE payload, privacy-scoped to the addressee by construction
/// (see `rules::view::GameView`). `RoomState`/`GameState` are never sent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RoomView {
    Lobby { room_id: RoomId, host_id: PlayerId, config: RoomConfig, players: Vec<LobbyPlayerView> },
    Playing { room_id: RoomId, game: GameView },
    Finished { room_id: RoomId, game: GameView },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    State { state: RoomView },
    Info { message: String },
    Error(ErrorFrame),
}

impl ServerFrame {
    pub fn error(frame: ErrorFrame) -> ServerFrame {
        ServerFrame::Error(frame)
    }
}

/// What actually goes out over one socket: a framed `ServerFrame`, or a
/// close handshake carrying one of the reasons spec.md §5 names by name
/// ("replaced" on reconnect, "session expired" on an expired token).
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(ServerFrame),
    Close { code: u16, reason: &'static str },
}

impl Outbound {
    pub fn error(frame: ErrorFrame) -> Outbound {
        Outbound::Frame(ServerFrame::Error(frame))
    }
}

impl From<ServerFrame> for Outbound {
    fn from(frame: ServerFrame) -> Outbound {
        Outbound::Frame(frame)
    }
}

/// Close code for the socket a reconnect displaces (spec.md §5, §4.2).
pub const CLOSE_REPLACED: u16 = 4000;
/// Close code for a socket whose session token has expired (spec.md §5).
pub const CLOSE_SESSION_EXPIRED: u16 = 4001;

pub type SocketSender = mpsc::UnboundedSender<Outbound>;

/// Commands the room actor accepts over its single inbound channel. Every
/// variant that can fail carries a `oneshot` reply so the caller (HTTP
/// handler or WS reader task) can surface the outcome without the actor
/// ever needing to reach back out through a second channel.
#[derive(Debug)]
pub enum RoomCommand {
    InitLobby {
        players: Vec<LobbyPlayer>,
        config: RoomConfig,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    AttachSocket {
        player_id: PlayerId,
        sender: SocketSender,
        reply: oneshot::Sender<Result<u64, RoomError>>,
    },
    DetachSocket {
        player_id: PlayerId,
        generation: u64,
    },
    SetReady {
        player_id: PlayerId,
        generation: u64,
        sender: SocketSender,
        ready: bool,
    },
    StartGame {
        initiator: PlayerId,
        generation: u64,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Submit {
        player_id: PlayerId,
        generation: u64,
        sender: SocketSender,
        event: super::actor::GameplayEvent,
    },
    Snapshot {
        reply: oneshot::Sender<super::state::PersistedRoom>,
    },
}
