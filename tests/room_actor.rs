//! S6 — reconnect replaces socket. Drives a real `RoomActor` task through its
//! `RoomHandle` channel, the same way the HTTP layer and `ws::connection`
//! would, and checks the close-and-replace handshake on the socket table.

use std::sync::Arc;

use durak_server::error::ErrorCode;
use durak_server::room::{spawn_room, GameplayEvent, LobbyPlayer, Outbound, RoomCommand, RoomView, ServerFrame, CLOSE_REPLACED};
use durak_server::rules::{DeckSize, GameMode, RoomConfig};
use durak_server::store::InMemoryRoomStore;
use durak_server::types::RoomId;
use tokio::sync::mpsc;
use uuid::Uuid;

fn config() -> RoomConfig {
    RoomConfig { mode: GameMode::Podkidnoy, deck_size: DeckSize::Full, max_players: 2, taker_skips_refill: false }
}

#[tokio::test]
async fn reconnect_closes_old_socket_and_state_is_untouched() {
    let store = Arc::new(InMemoryRoomStore::new());
    let room_id = RoomId::new();
    let handle = spawn_room(room_id, store);

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let host = LobbyPlayer { id: a, display_name: a.to_string(), connected: false, ready: false };
    let guest = LobbyPlayer { id: b, display_name: b.to_string(), connected: false, ready: false };
    handle.init_lobby(vec![host, guest], config()).await.unwrap();

    let (tx1, mut rx1) = mpsc::unbounded_channel::<Outbound>();
    let generation1 = handle.attach_socket(a, tx1.clone()).await.unwrap();

    // First attach's own broadcast: a fresh lobby STATE frame.
    match rx1.recv().await.unwrap() {
        Outbound::Frame(ServerFrame::State { state: RoomView::Lobby { .. } }) => {}
        other => panic!("expected initial lobby state, got {other:?}"),
    }

    let (tx2, mut rx2) = mpsc::unbounded_channel::<Outbound>();
    let generation2 = handle.attach_socket(a, tx2).await.unwrap();
    assert_ne!(generation1, generation2);

    // The displaced socket is closed with the "replaced" reason...
    match rx1.recv().await.unwrap() {
        Outbound::Close { code, reason } => {
            assert_eq!(code, CLOSE_REPLACED);
            assert_eq!(reason, "replaced");
        }
        other => panic!("expected close-replaced, got {other:?}"),
    }

    // ...and the new socket gets a fresh STATE in its place.
    match rx2.recv().await.unwrap() {
        Outbound::Frame(ServerFrame::State { state: RoomView::Lobby { players, .. } }) => {
            assert_eq!(players.len(), 2);
            let rejoined = players.iter().find(|p| p.id == a).unwrap();
            assert!(rejoined.connected);
        }
        other => panic!("expected lobby state on the new socket, got {other:?}"),
    }

    // No state mutation beyond the socket table: the lobby roster is the same
    // two seats, and a snapshot still round-trips through the room store.
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.lobby_players.len(), 2);
}

#[tokio::test]
async fn stale_socket_generation_is_rejected_not_applied() {
    let store = Arc::new(InMemoryRoomStore::new());
    let room_id = RoomId::new();
    let handle = spawn_room(room_id, store);

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let host = LobbyPlayer { id: a, display_name: a.to_string(), connected: false, ready: false };
    let guest = LobbyPlayer { id: b, display_name: b.to_string(), connected: false, ready: false };
    handle.init_lobby(vec![host, guest], config()).await.unwrap();

    let (tx1, mut rx1) = mpsc::unbounded_channel::<Outbound>();
    let stale_generation = handle.attach_socket(a, tx1.clone()).await.unwrap();
    rx1.recv().await.unwrap(); // initial lobby state

    let (tx2, mut rx2) = mpsc::unbounded_channel::<Outbound>();
    handle.attach_socket(a, tx2).await.unwrap();
    rx1.recv().await.unwrap(); // close-replaced on the displaced socket
    rx2.recv().await.unwrap(); // fresh state on the new socket

    // An in-flight command from the displaced socket, stamped with its old
    // generation and its own sender, must not reach the room state — it is
    // rejected straight back to that sender with NOT_JOINED.
    handle
        .send(RoomCommand::SetReady { player_id: a, generation: stale_generation, sender: tx1.clone(), ready: true })
        .await
        .unwrap();
    match rx1.recv().await.unwrap() {
        Outbound::Frame(ServerFrame::Error(err)) => assert_eq!(err.code, ErrorCode::NotJoined),
        other => panic!("expected NOT_JOINED on the stale socket, got {other:?}"),
    }

    handle
        .send(RoomCommand::Submit {
            player_id: a,
            generation: stale_generation,
            sender: tx1,
            event: GameplayEvent::Pass,
        })
        .await
        .unwrap();
    match rx1.recv().await.unwrap() {
        Outbound::Frame(ServerFrame::Error(err)) => assert_eq!(err.code, ErrorCode::NotJoined),
        other => panic!("expected NOT_JOINED on the stale socket, got {other:?}"),
    }

    let snapshot = handle.snapshot().await.unwrap();
    let rejoined = snapshot.lobby_players.iter().find(|p| p.id == a).unwrap();
    assert!(!rejoined.ready, "stale SetReady must not have mutated lobby state");
}
