use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::store::RoomStore;
use crate::types::RoomId;

use super::actor::{spawn_room, RoomHandle};

/// Process-wide table of live room actors, grounded in the teacher's
/// `AppState { rooms: Arc<DashMap<Uuid, Arc<Room>>> }`. Holding a
/// `RoomHandle` here is the only thing keeping a room's task alive —
/// dropping the entry lets the actor's channel close and the task exit.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id).map(|h| h.clone())
    }

    pub fn get_or_spawn(&self, room_id: RoomId, store: Arc<dyn RoomStore>) -> RoomHandle {
        self.rooms.entry(room_id).or_insert_with(|| spawn_room(room_id, store)).clone()
    }

    /// Drops handles for rooms idle past the eviction threshold. Run on a
    /// timer from `main`; a room with no remaining sockets but recent
    /// activity survives a sweep or two before it is actually collected.
    pub fn evict_idle(&self) {
        let stale: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().is_evictable())
            .map(|entry| *entry.key())
            .collect();
        for room_id in stale {
            self.rooms.remove(&room_id);
            info!(%room_id, "evicted idle room");
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}
