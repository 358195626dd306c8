use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::{ErrorCode, ErrorFrame};
use crate::rules::{self, GameState, RoomConfig, RulesError};
use crate::store::RoomStore;
use crate::types::{PlayerId, RoomId};

use super::messages::{LobbyPlayerView, Outbound, RoomCommand, RoomView, ServerFrame, SocketSender, CLOSE_REPLACED};
use super::state::{LobbyPlayer, PersistedRoom, RoomMeta, RoomPhase};

/// The gameplay subset of client frames, applied directly against
/// `rules::GameState`.
pub use rules::Action as GameplayEvent;

const PERSIST_DEADLINE: Duration = Duration::from_secs(5);
const IDLE_EVICTION: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error, Clone)]
pub enum RoomError {
    #[error("room already initialised")]
    RoomExists,
    #[error("room is full")]
    RoomFull,
    #[error("player is not part of this game")]
    NotInGame,
    #[error("socket was not joined")]
    NotJoined,
    #[error("room is not ready to start")]
    RoomNotReady,
    #[error("game has finished")]
    GameFinished,
    #[error("game is not currently playing")]
    GameNotPlaying,
    #[error("persistence write failed")]
    PersistFailed,
    #[error("room is poisoned after an invariant violation")]
    Poisoned,
    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl RoomError {
    /// `None` for errors that never reach a WS client (e.g. `RoomExists`,
    /// surfaced only as an HTTP 409 by the front controller).
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            RoomError::RoomExists => None,
            RoomError::RoomFull => Some(ErrorCode::RoomFull),
            RoomError::NotInGame => Some(ErrorCode::NotInGame),
            RoomError::NotJoined => Some(ErrorCode::NotJoined),
            RoomError::RoomNotReady => Some(ErrorCode::RoomNotReady),
            RoomError::GameFinished => Some(ErrorCode::GameFinished),
            RoomError::GameNotPlaying => Some(ErrorCode::GameNotPlaying),
            RoomError::PersistFailed | RoomError::Poisoned => Some(ErrorCode::PersistFailed),
            RoomError::Rules(e) => Some(e.code()),
        }
    }
}

/// Cheap, cloneable handle to a live room task. Nothing outside the task
/// ever touches `RoomState` directly — every mutation goes through this
/// channel, so two events for the same room can never interleave.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
    last_active_epoch_secs: Arc<AtomicI64>,
}

impl RoomHandle {
    pub fn idle_for(&self) -> Duration {
        let last = self.last_active_epoch_secs.load(Ordering::Relaxed);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Duration::from_secs((now - last).max(0) as u64)
    }

    pub fn is_evictable(&self) -> bool {
        self.idle_for() >= IDLE_EVICTION
    }

    pub async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.tx.send(command).await.map_err(|_| RoomError::Poisoned)
    }

    pub async fn init_lobby(&self, players: Vec<LobbyPlayer>, config: RoomConfig) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::InitLobby { players, config, reply }).await?;
        rx.await.map_err(|_| RoomError::Poisoned)?
    }

    /// Returns the socket's generation on success: every later command the
    /// caller issues for `player_id` must carry it back so a reconnect that
    /// displaces this socket can be told apart from the socket itself.
    pub async fn attach_socket(&self, player_id: PlayerId, sender: SocketSender) -> Result<u64, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::AttachSocket { player_id, sender, reply }).await?;
        rx.await.map_err(|_| RoomError::Poisoned)?
    }

    pub async fn start_game(&self, initiator: PlayerId, generation: u64) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::StartGame { initiator, generation, reply }).await?;
        rx.await.map_err(|_| RoomError::Poisoned)?
    }

    pub async fn snapshot(&self) -> Result<PersistedRoom, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RoomError::Poisoned)
    }
}

struct RoomActor {
    room_id: RoomId,
    meta: Option<RoomMeta>,
    lobby_players: Vec<LobbyPlayer>,
    phase: RoomPhase,
    game: Option<GameState>,
    /// Each attached socket is tagged with the generation it was given by
    /// `attach_socket`. A reconnect bumps the generation for that player id,
    /// so any in-flight command still carrying the prior generation is
    /// recognised as coming from the displaced socket (spec.md §5) and is
    /// dropped with `NOT_JOINED` instead of being applied.
    sockets: HashMap<PlayerId, (SocketSender, u64)>,
    next_generation: u64,
    store: Arc<dyn RoomStore>,
    poisoned: bool,
    last_active: Arc<AtomicI64>,
}

/// Spawns a room as its own task, the actor-not-shared-memory model from
/// DESIGN NOTES §9. On start, if a snapshot already exists under
/// `room/{roomId}` it is loaded before the actor handles its first command.
pub fn spawn_room(room_id: RoomId, store: Arc<dyn RoomStore>) -> RoomHandle {
    let (tx, rx) = mpsc::channel(64);
    let last_active = Arc::new(AtomicI64::new(OffsetDateTime::now_utc().unix_timestamp()));
    let actor_last_active = last_active.clone();

    tokio::spawn(async move {
        let mut actor = RoomActor {
            room_id,
            meta: None,
            lobby_players: Vec::new(),
            phase: RoomPhase::Lobby,
            game: None,
            sockets: HashMap::new(),
            next_generation: 0,
            store,
            poisoned: false,
            last_active: actor_last_active,
        };
        if let Ok(Some(snapshot)) = actor.store.load(room_id).await {
            actor.hydrate(snapshot);
        }
        actor.run(rx).await;
    });

    RoomHandle { room_id, tx, last_active_epoch_secs: last_active }
}

impl RoomActor {
    fn hydrate(&mut self, snapshot: PersistedRoom) {
        self.meta = Some(snapshot.meta);
        self.lobby_players = snapshot.lobby_players;
        self.phase = snapshot.phase;
        self.game = snapshot.game;
    }

    fn touch(&self) {
        self.last_active.store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::Relaxed);
    }

    async fn run(&mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(command) = rx.recv().await {
            self.touch();
            self.handle(command).await;
        }
        info!(room_id = %self.room_id, "room actor shutting down, no remaining handles");
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::InitLobby { players, config, reply } => {
                let result = self.init_lobby(players, config).await;
                let _ = reply.send(result);
            }
            RoomCommand::AttachSocket { player_id, sender, reply } => {
                let result = self.attach_socket(player_id, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::DetachSocket { player_id, generation } => {
                // A displaced socket's own close/read-loop exit must not
                // clobber the reconnected socket that replaced it.
                if self.current_generation(player_id) != Some(generation) {
                    return;
                }
                self.sockets.remove(&player_id);
                if let Some(p) = self.lobby_players.iter_mut().find(|p| p.id == player_id) {
                    p.connected = false;
                }
                self.broadcast().await;
            }
            RoomCommand::SetReady { player_id, generation, sender, ready } => {
                if self.current_generation(player_id) != Some(generation) {
                    let _ = sender.send(Outbound::error(ErrorFrame::new(ErrorCode::NotJoined)));
                    return;
                }
                if let Some(p) = self.lobby_players.iter_mut().find(|p| p.id == player_id) {
                    p.ready = ready;
                }
                self.persist_and_broadcast(None).await;
            }
            RoomCommand::StartGame { initiator, generation, reply } => {
                let result = self.start_game(initiator, generation).await;
                let _ = reply.send(result);
            }
            RoomCommand::Submit { player_id, generation, sender, event } => {
                if self.current_generation(player_id) != Some(generation) {
                    let _ = sender.send(Outbound::error(ErrorFrame::new(ErrorCode::NotJoined)));
                    return;
                }
                self.submit(player_id, event).await;
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> PersistedRoom {
        PersistedRoom {
            meta: self.meta.clone().expect("room initialised before snapshot"),
            lobby_players: self.lobby_players.clone(),
            phase: self.phase,
            game: self.game.clone(),
        }
    }

    async fn init_lobby(&mut self, players: Vec<LobbyPlayer>, config: RoomConfig) -> Result<(), RoomError> {
        if self.meta.is_some() {
            return Err(RoomError::RoomExists);
        }
        let host_id = players.first().ok_or(RoomError::RoomNotReady)?.id;
        let meta = RoomMeta { room_id: self.room_id, host_id, config, created_at: OffsetDateTime::now_utc() };
        self.meta = Some(meta);
        self.lobby_players = players;
        self.phase = RoomPhase::Lobby;

        if let Err(e) = self.persist().await {
            self.meta = None;
            self.lobby_players.clear();
            return Err(e);
        }
        Ok(())
    }

    fn current_generation(&self, player_id: PlayerId) -> Option<u64> {
        self.sockets.get(&player_id).map(|(_, generation)| *generation)
    }

    async fn attach_socket(&mut self, player_id: PlayerId, sender: SocketSender) -> Result<u64, RoomError> {
        match self.phase {
            RoomPhase::Lobby => {
                let already_member = self.lobby_players.iter().any(|p| p.id == player_id);
                if !already_member {
                    let max = self.meta.as_ref().map(|m| m.config.max_players as usize).unwrap_or(0);
                    if self.lobby_players.len() >= max {
                        return Err(RoomError::RoomFull);
                    }
                    self.lobby_players.push(LobbyPlayer { id: player_id, display_name: player_id.to_string(), connected: true, ready: false });
                }
            }
            RoomPhase::Playing | RoomPhase::Finished => {
                let in_game = self.game.as_ref().map(|g| g.order.contains(&player_id)).unwrap_or(false);
                if !in_game {
                    return Err(RoomError::NotInGame);
                }
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        if let Some((old, _)) = self.sockets.insert(player_id, (sender, generation)) {
            let _ = old.send(Outbound::Close { code: CLOSE_REPLACED, reason: "replaced" });
        }
        if let Some(p) = self.lobby_players.iter_mut().find(|p| p.id == player_id) {
            p.connected = true;
        }
        self.broadcast().await;
        Ok(generation)
    }

    async fn start_game(&mut self, initiator: PlayerId, generation: u64) -> Result<(), RoomError> {
        if self.current_generation(initiator) != Some(generation) {
            return Err(RoomError::NotJoined);
        }
        let meta = self.meta.as_ref().ok_or(RoomError::RoomNotReady)?;
        if meta.host_id != initiator {
            return Err(RoomError::RoomNotReady);
        }
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::RoomNotReady);
        }
        let count = self.lobby_players.len();
        if count < 2 || count > meta.config.max_players as usize {
            return Err(RoomError::RoomNotReady);
        }
        if !self.lobby_players.iter().all(|p| p.ready) {
            return Err(RoomError::RoomNotReady);
        }

        let order: Vec<PlayerId> = self.lobby_players.iter().map(|p| p.id).collect();
        let game = rules::new_game(meta.config, order);
        let before = self.snapshot();
        self.phase = RoomPhase::Playing;
        self.game = Some(game);

        match self.persist().await {
            Ok(()) => {
                self.broadcast().await;
                Ok(())
            }
            Err(e) => {
                self.hydrate(before);
                Err(e)
            }
        }
    }

    async fn submit(&mut self, player_id: PlayerId, event: GameplayEvent) {
        if self.poisoned {
            self.send_error(player_id, ErrorFrame::new(ErrorCode::PersistFailed)).await;
            return;
        }
        let Some(game) = self.game.as_ref() else {
            self.send_error(player_id, ErrorFrame::new(ErrorCode::GameNotPlaying)).await;
            return;
        };
        let result = rules::apply(game, player_id, &event);
        let next_game = match result {
            Ok(g) => g,
            Err(e) => {
                self.send_error(player_id, ErrorFrame::new(e.code())).await;
                return;
            }
        };

        let before = self.snapshot();
        self.game = Some(next_game);
        if self.game.as_ref().map(|g| g.phase == rules::Phase::Finished).unwrap_or(false) {
            self.phase = RoomPhase::Finished;
        }

        if !self.invariants_hold() {
            error!(room_id = %self.room_id, "invariant violation detected post-mutation, poisoning room");
            self.hydrate(before);
            self.poisoned = true;
            self.send_error(player_id, ErrorFrame::new(ErrorCode::PersistFailed)).await;
            return;
        }

        match self.persist().await {
            Ok(()) => self.broadcast().await,
            Err(_) => {
                self.hydrate(before);
                self.send_error(player_id, ErrorFrame::new(ErrorCode::PersistFailed)).await;
            }
        }
    }

    /// Card conservation and bounded-table sanity checks, run once per
    /// mutation. A failure here is the `Fatal` error kind from §7: the
    /// room is poisoned rather than left in a silently corrupt state.
    fn invariants_hold(&self) -> bool {
        let Some(game) = self.game.as_ref() else { return true };
        if game.table.len() > game.round_limit || game.round_limit > 6 {
            return false;
        }
        for pair in &game.table {
            if let Some(d) = pair.defense {
                if !rules::beats(d, pair.attack, game.trump_suit) {
                    return false;
                }
            }
        }
        if game.phase == rules::Phase::Playing && rules::state::active_count(&game.active) >= 2 && game.attacker_id == game.defender_id {
            return false;
        }
        true
    }

    async fn persist(&self) -> Result<(), RoomError> {
        let Some(meta) = self.meta.as_ref() else { return Ok(()) };
        let snapshot = PersistedRoom {
            meta: meta.clone(),
            lobby_players: self.lobby_players.clone(),
            phase: self.phase,
            game: self.game.clone(),
        };
        match tokio::time::timeout(PERSIST_DEADLINE, self.store.save(self.room_id, &snapshot)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(room_id = %self.room_id, error = %e, "persist failed");
                Err(RoomError::PersistFailed)
            }
            Err(_) => {
                warn!(room_id = %self.room_id, "persist deadline exceeded");
                Err(RoomError::PersistFailed)
            }
        }
    }

    async fn persist_and_broadcast(&mut self, on_player: Option<PlayerId>) {
        if let Err(_e) = self.persist().await {
            if let Some(p) = on_player {
                self.send_error(p, ErrorFrame::new(ErrorCode::PersistFailed)).await;
            }
            return;
        }
        self.broadcast().await;
    }

    async fn send_error(&self, player_id: PlayerId, frame: ErrorFrame) {
        if let Some((sender, _)) = self.sockets.get(&player_id) {
            let _ = sender.send(Outbound::error(frame));
        }
    }

    async fn broadcast(&self) {
        let Some(meta) = self.meta.as_ref() else { return };
        for (player_id, (sender, _)) in &self.sockets {
            let view = match (&self.phase, &self.game) {
                (RoomPhase::Lobby, _) => RoomView::Lobby {
                    room_id: self.room_id,
                    host_id: meta.host_id,
                    config: meta.config,
                    players: self.lobby_players.iter().map(LobbyPlayerView::from).collect(),
                },
                (RoomPhase::Playing, Some(game)) => {
                    RoomView::Playing { room_id: self.room_id, game: rules::view_for(game, *player_id) }
                }
                (RoomPhase::Finished, Some(game)) => {
                    RoomView::Finished { room_id: self.room_id, game: rules::view_for(game, *player_id) }
                }
                _ => continue,
            };
            let _ = sender.send(Outbound::Frame(ServerFrame::State { state: view }));
        }
    }
}
