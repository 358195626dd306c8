//! WebSocket connection lifecycle, grounded in the teacher's
//! `ws::connection::handle_socket` read/echo loop, generalized from a
//! placeholder echo into the full JOIN-then-gameplay frame dispatch of
//! spec.md §4.2/§6.
//!
//! A connection starts unauthenticated: the upgrade itself never checks a
//! session, per spec.md §6 ("standard WebSocket upgrade"). The first frame
//! must be `JOIN`; everything sent before that is rejected with
//! `NOT_JOINED` and never reaches the room actor.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::auth::{verify_session_token, AuthError};
use crate::error::{ErrorCode, ErrorFrame};
use crate::room::{ClientFrame, Outbound, RoomCommand, RoomHandle, ServerFrame, SocketSender, CLOSE_SESSION_EXPIRED};
use crate::rules::Action;
use crate::types::PlayerId;

/// Drives one socket end to end: reads frames, authenticates via JOIN,
/// attaches to the room, forwards gameplay events, and detaches on close.
pub async fn handle_socket(handle: RoomHandle, app_secret: Arc<[u8]>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(frame) => {
                    let Ok(text) = serde_json::to_string(&frame) else { continue };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let _ = sink.send(Message::Close(Some(CloseFrame { code, reason: reason.into() }))).await;
                    break;
                }
            }
        }
    });

    // (PlayerId, generation): the generation ties every command this
    // connection sends back to the socket `attach_socket` handed out, so a
    // reconnect that displaces this socket leaves its in-flight frames
    // identifiable and droppable by the actor (spec.md §5).
    let mut player_id: Option<(PlayerId, u64)> = None;

    loop {
        let Some(message) = stream.next().await else { break };
        let message = match message {
            Ok(m) => m,
            Err(_) => break,
        };

        match message {
            Message::Text(text) => {
                if !process_text(&handle, &app_secret, &tx, &mut player_id, &text).await {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some((id, generation)) = player_id {
        let _ = handle.send(RoomCommand::DetachSocket { player_id: id, generation }).await;
    }
    writer.abort();
    debug!(room_id = %handle.room_id, "socket closed");
}

fn send_error(tx: &SocketSender, code: ErrorCode) {
    let _ = tx.send(Outbound::Frame(ServerFrame::error(ErrorFrame::new(code))));
}

/// Returns `false` when the connection should be torn down (session
/// expired, bad session, or the room refused the join).
async fn process_text(
    handle: &RoomHandle,
    app_secret: &[u8],
    tx: &SocketSender,
    player_id: &mut Option<(PlayerId, u64)>,
    text: &str,
) -> bool {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => {
            send_error(tx, ErrorCode::BadJson);
            return true;
        }
    };

    match frame {
        ClientFrame::Join { session_token } => {
            if player_id.is_some() {
                return true;
            }
            match verify_session_token(&session_token, app_secret) {
                Ok(id) => match handle.attach_socket(id, tx.clone()).await {
                    Ok(generation) => {
                        *player_id = Some((id, generation));
                        true
                    }
                    Err(e) => {
                        if let Some(code) = e.code() {
                            send_error(tx, code);
                        }
                        false
                    }
                },
                Err(AuthError::SessionExpired) => {
                    let _ = tx.send(Outbound::Close { code: CLOSE_SESSION_EXPIRED, reason: "session expired" });
                    false
                }
                Err(_) => {
                    send_error(tx, ErrorCode::BadSession);
                    false
                }
            }
        }
        other => {
            let Some((id, generation)) = *player_id else {
                send_error(tx, ErrorCode::NotJoined);
                return true;
            };
            dispatch_gameplay(handle, id, generation, other, tx).await
        }
    }
}

async fn dispatch_gameplay(
    handle: &RoomHandle,
    player_id: PlayerId,
    generation: u64,
    frame: ClientFrame,
    tx: &SocketSender,
) -> bool {
    let command = match frame {
        ClientFrame::Ready { ready } => RoomCommand::SetReady { player_id, generation, sender: tx.clone(), ready },
        ClientFrame::Start => {
            if let Err(e) = handle.start_game(player_id, generation).await {
                if let Some(code) = e.code() {
                    send_error(tx, code);
                }
            }
            return true;
        }
        ClientFrame::Attack { card } => {
            RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Attack { card } }
        }
        ClientFrame::Defend { attack_index, card } => {
            RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Defend { attack_index, card } }
        }
        ClientFrame::Transfer { card } => {
            RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Transfer { card } }
        }
        ClientFrame::Take => RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Take },
        ClientFrame::Beat => RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Beat },
        ClientFrame::Pass => RoomCommand::Submit { player_id, generation, sender: tx.clone(), event: Action::Pass },
        ClientFrame::Join { .. } => unreachable!("JOIN handled by the caller"),
    };
    handle.send(command).await.is_ok()
}
