//! Matchmaker Actor (M): per-`RoomConfig` FIFO queues and short-lived
//! `playerId -> roomId` bindings, owned by a single task so the
//! dequeue-mint-bind sequence is atomic as a unit (SPEC §4.3.1) — a
//! concurrent map alone can't give that for free.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::room::{LobbyPlayer, RoomRegistry};
use crate::rules::RoomConfig;
use crate::store::RoomStore;
use crate::types::{PlayerId, RoomId};

const BINDING_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MatchResult {
    Queued,
    Matched { room_id: RoomId },
}

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum MatchmakerError {
    #[error("failed to initialise the matched room")]
    MatchFailed,
}

enum MatchmakerCommand {
    Enqueue { player_id: PlayerId, config: RoomConfig, reply: oneshot::Sender<Result<MatchResult, MatchmakerError>> },
}

#[derive(Clone)]
pub struct MatchmakerHandle {
    tx: mpsc::Sender<MatchmakerCommand>,
}

impl MatchmakerHandle {
    pub async fn enqueue(&self, player_id: PlayerId, config: RoomConfig) -> Result<MatchResult, MatchmakerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MatchmakerCommand::Enqueue { player_id, config, reply })
            .await
            .map_err(|_| MatchmakerError::MatchFailed)?;
        rx.await.map_err(|_| MatchmakerError::MatchFailed)?
    }
}

struct Binding {
    room_id: RoomId,
    expires_at: OffsetDateTime,
}

struct MatchmakerActor {
    queues: HashMap<RoomConfig, VecDeque<PlayerId>>,
    bindings: HashMap<PlayerId, Binding>,
    registry: RoomRegistry,
    store: Arc<dyn RoomStore>,
}

pub fn spawn_matchmaker(registry: RoomRegistry, store: Arc<dyn RoomStore>) -> MatchmakerHandle {
    let (tx, mut rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut actor = MatchmakerActor { queues: HashMap::new(), bindings: HashMap::new(), registry, store };
        while let Some(command) = rx.recv().await {
            match command {
                MatchmakerCommand::Enqueue { player_id, config, reply } => {
                    let result = actor.enqueue(player_id, config).await;
                    let _ = reply.send(result);
                }
            }
        }
    });
    MatchmakerHandle { tx }
}

impl MatchmakerActor {
    async fn enqueue(&mut self, player_id: PlayerId, config: RoomConfig) -> Result<MatchResult, MatchmakerError> {
        if let Some(binding) = self.bindings.get(&player_id) {
            if binding.expires_at > OffsetDateTime::now_utc() {
                return Ok(MatchResult::Matched { room_id: binding.room_id });
            }
            self.bindings.remove(&player_id);
        }

        let queue = self.queues.entry(config).or_default();
        if !queue.contains(&player_id) {
            queue.push_back(player_id);
        }

        if queue.len() < config.max_players as usize {
            return Ok(MatchResult::Queued);
        }

        let group: Vec<PlayerId> = queue.drain(..config.max_players as usize).collect();
        let room_id = RoomId::new();
        let players: Vec<LobbyPlayer> = group
            .iter()
            .map(|id| LobbyPlayer { id: *id, display_name: id.to_string(), connected: false, ready: false })
            .collect();

        let handle = self.registry.get_or_spawn(room_id, self.store.clone());
        match handle.init_lobby(players, config).await {
            Ok(()) => {
                let expires_at = OffsetDateTime::now_utc() + BINDING_TTL;
                for id in &group {
                    self.bindings.insert(*id, Binding { room_id, expires_at });
                }
                info!(%room_id, players = group.len(), "matchmaker grouped a room");
                if group.contains(&player_id) {
                    Ok(MatchResult::Matched { room_id })
                } else {
                    Ok(MatchResult::Queued)
                }
            }
            Err(e) => {
                warn!(%room_id, error = %e, "init_lobby failed, returning players to queue");
                let queue = self.queues.entry(config).or_default();
                for id in group.into_iter().rev() {
                    queue.push_front(id);
                }
                Err(MatchmakerError::MatchFailed)
            }
        }
    }
}
