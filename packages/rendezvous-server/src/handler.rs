//! Per-connection WebSocket handling: assign a client id, dispatch
//! `ClientMessage`s into `RelayState`, and forward whatever the state
//! queues back out. The socket is split so a spawned sender task can
//! forward queued replies while the main loop keeps reading.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::RelayState;

pub async fn handle_websocket(socket: WebSocket, state: RelayState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(&state, &client_id, &tx, client_msg),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed client message");
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("invalid message: {e}"),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "websocket read error");
                break;
            }
        }
    }

    state.remove_client(&client_id);
    tracing::info!(client_id = client_id.as_str(), "client disconnected");
    sender_task.abort();
}

/// Pure dispatch: translate one inbound `ClientMessage` into state
/// mutations and/or an outbound reply.
fn handle_client_message(
    state: &RelayState,
    client_id: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::CreateRoom => {
            let code = state.create_room(client_id, tx.clone());
            tracing::info!(client_id, code = code.as_str(), "room created");
            let _ = tx.send(ServerMessage::RoomCreated { code });
        }
        ClientMessage::JoinRoom { code } => {
            use crate::state::JoinOutcome;
            match state.join_room(&code, client_id, tx.clone()) {
                JoinOutcome::Joined { .. } => {
                    tracing::info!(client_id, code = code.as_str(), "room joined");
                    let _ = tx.send(ServerMessage::RoomJoined { code });
                }
                JoinOutcome::UnknownRoom => {
                    let _ = tx.send(ServerMessage::Error {
                        message: "invalid room".into(),
                    });
                }
            }
        }
        ClientMessage::Offer { payload } => {
            state.relay(client_id, ServerMessage::Offer { payload });
        }
        ClientMessage::Answer { payload } => {
            state.relay(client_id, ServerMessage::Answer { payload });
        }
        ClientMessage::IceCandidate { payload } => {
            state.relay(client_id, ServerMessage::IceCandidate { payload });
        }
    }
}
