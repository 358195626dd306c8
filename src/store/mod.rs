//! Interface contracts for the two durable stores the spec treats as
//! external collaborators (§1, §6.1): the key–value room store and the
//! relational user directory. Only in-memory implementations live here —
//! a production deployment swaps these for a real KV/SQL backend without
//! touching `room`, `matchmaker`, or `auth`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::room::state::PersistedRoom;
use crate::types::RoomId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store write timed out")]
    Timeout,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn load(&self, room_id: RoomId) -> Result<Option<PersistedRoom>, StoreError>;
    async fn save(&self, room_id: RoomId, snapshot: &PersistedRoom) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: uuid::Uuid,
    pub external_id: String,
    pub first_name: String,
    pub username: Option<String>,
    pub language_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, external_id: &str, first_name: &str, username: Option<&str>, language_code: Option<&str>) -> Result<UserRecord, StoreError>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<UserRecord>, StoreError>;
}

/// `DashMap`-backed room store, grounded in the teacher's
/// `AppState { rooms: Arc<DashMap<Uuid, Arc<Room>>> }` registry pattern.
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: DashMap<RoomId, PersistedRoom>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn load(&self, room_id: RoomId) -> Result<Option<PersistedRoom>, StoreError> {
        Ok(self.rooms.get(&room_id).map(|r| r.clone()))
    }

    async fn save(&self, room_id: RoomId, snapshot: &PersistedRoom) -> Result<(), StoreError> {
        self.rooms.insert(room_id, snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    by_external_id: DashMap<String, uuid::Uuid>,
    users: DashMap<uuid::Uuid, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert(&self, external_id: &str, first_name: &str, username: Option<&str>, language_code: Option<&str>) -> Result<UserRecord, StoreError> {
        let now = OffsetDateTime::now_utc();
        if let Some(id) = self.by_external_id.get(external_id).map(|e| *e) {
            let mut record = self.users.get_mut(&id).expect("indexed user exists");
            record.first_name = first_name.to_string();
            record.username = username.map(|s| s.to_string());
            record.language_code = language_code.map(|s| s.to_string());
            record.updated_at = now;
            return Ok(record.clone());
        }
        let id = uuid::Uuid::new_v4();
        let record = UserRecord {
            id,
            external_id: external_id.to_string(),
            first_name: first_name.to_string(),
            username: username.map(|s| s.to_string()),
            language_code: language_code.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.by_external_id.insert(external_id.to_string(), id);
        self.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .by_external_id
            .get(external_id)
            .and_then(|id| self.users.get(&id).map(|r| r.clone())))
    }
}
