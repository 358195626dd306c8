//! The Room Actor (A): one `tokio` task per live room, owning its
//! `RoomState`/`GameState` exclusively. Every other part of the service
//! reaches a room only through a `RoomHandle`'s channel.

pub mod actor;
pub mod messages;
pub mod registry;
pub mod state;

pub use actor::{spawn_room, GameplayEvent, RoomError, RoomHandle};
pub use messages::{
    ClientFrame, Outbound, RoomCommand, RoomView, ServerFrame, SocketSender, CLOSE_REPLACED, CLOSE_SESSION_EXPIRED,
};
pub use registry::RoomRegistry;
pub use state::{LobbyPlayer, PersistedRoom, RoomMeta, RoomPhase};
