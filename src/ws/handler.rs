//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::snapshot::{outbound_channel, Outbound, SnapshotBroadcaster};
use crate::game::{room_key, Input, RoomRegistry, SharedRoom};
use crate::ws::protocol::{ClientMsg, PlayerId, ProtocolError};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = outbound_channel();

    // Writer task: room frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut session = Session::new(out_tx);

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        let outcome = match result {
            Ok(Message::Text(text)) => session.handle_text(&state.registry, &text),
            Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame),
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
                Ok(())
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
                Ok(())
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        };

        if let Err(e) = outcome {
            warn!(conn_id = %conn_id, error = %e, "Discarding client message");
            session.reply_error(&e);
        }
    }

    session.disconnect();
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Per-connection routing state: which room and player this socket is bound to
pub struct Session {
    outbound: Outbound,
    membership: Option<(SharedRoom, PlayerId)>,
}

impl Session {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            membership: None,
        }
    }

    #[cfg(test)]
    pub fn player_id(&self) -> Option<PlayerId> {
        self.membership.as_ref().map(|(_, id)| *id)
    }

    /// Decode one text frame and route it
    pub fn handle_text(&mut self, registry: &RoomRegistry, text: &str) -> Result<(), ProtocolError> {
        match ClientMsg::decode(text)? {
            ClientMsg::Join { match_name } => {
                if self.membership.is_some() {
                    return Err(ProtocolError::AlreadyJoined);
                }
                let key = room_key(&match_name);
                let (room, player_id) = registry.join(&key, self.outbound.clone());
                self.membership = Some((room, player_id));
                Ok(())
            }
            ClientMsg::Input { timestamp, keys } => {
                let Some((room, player_id)) = &self.membership else {
                    return Err(ProtocolError::NotInRoom);
                };
                // A vanished player (room reset, race with leave) just drops the input
                room.lock().enqueue(
                    player_id,
                    Input {
                        timestamp,
                        keys: keys.into(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Tell the client its message was rejected
    pub fn reply_error(&self, error: &ProtocolError) {
        if let Some(frame) = SnapshotBroadcaster::encode(&error.to_msg()) {
            let _ = self.outbound.try_send(frame);
        }
    }

    /// Leave the room this connection joined, if any
    pub fn disconnect(&mut self) {
        if let Some((room, player_id)) = self.membership.take() {
            room.lock().leave(&player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::sync::mpsc::Receiver;

    use crate::config::Config;
    use crate::game::snapshot::Frame;

    fn setup() -> (RoomRegistry, Session, Receiver<Frame>) {
        let registry = RoomRegistry::new(Arc::new(Config::default()));
        let (tx, rx) = outbound_channel();
        (registry, Session::new(tx), rx)
    }

    fn next_json(rx: &mut Receiver<Frame>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn join_creates_prefixed_room_and_welcomes() {
        let (registry, mut session, mut rx) = setup();
        session
            .handle_text(&registry, r#"{"type":"join","match":"42"}"#)
            .unwrap();

        let room = registry.get("match-42").unwrap();
        let player_id = session.player_id().unwrap();
        assert!(room.lock().has_player(&player_id));

        let welcome = next_json(&mut rx);
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["id"], player_id.to_string());
    }

    #[test]
    fn input_is_buffered_not_applied() {
        let (registry, mut session, _rx) = setup();
        session
            .handle_text(&registry, r#"{"type":"join","match":"a"}"#)
            .unwrap();
        session
            .handle_text(
                &registry,
                r#"{"type":"input","timestamp":5,"keys":{"a":false,"d":true,"w":false,"space":false}}"#,
            )
            .unwrap();

        let room = registry.get("match-a").unwrap();
        let room = room.lock();
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.round_number(), 0);
    }

    #[test]
    fn input_before_join_is_rejected() {
        let (registry, mut session, _rx) = setup();
        let err = session
            .handle_text(&registry, r#"{"type":"input","timestamp":1,"keys":{}}"#)
            .unwrap_err();
        assert_eq!(err.code(), "not_in_room");
    }

    #[test]
    fn second_join_is_rejected() {
        let (registry, mut session, _rx) = setup();
        session
            .handle_text(&registry, r#"{"type":"join","match":"a"}"#)
            .unwrap();
        let err = session
            .handle_text(&registry, r#"{"type":"join","match":"b"}"#)
            .unwrap_err();
        assert_eq!(err.code(), "already_joined");
        assert!(registry.get("match-b").is_none());
    }

    #[test]
    fn malformed_message_gets_error_reply_and_session_survives() {
        let (registry, mut session, mut rx) = setup();
        let err = session.handle_text(&registry, "{oops").unwrap_err();
        session.reply_error(&err);

        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["code"], "bad_message");

        session
            .handle_text(&registry, r#"{"type":"join","match":"a"}"#)
            .unwrap();
        assert!(session.player_id().is_some());
    }

    #[test]
    fn disconnect_removes_player() {
        let (registry, mut session, _rx) = setup();
        session
            .handle_text(&registry, r#"{"type":"join","match":"a"}"#)
            .unwrap();
        let player_id = session.player_id().unwrap();

        session.disconnect();

        let room = registry.get("match-a").unwrap();
        assert!(!room.lock().has_player(&player_id));
        assert!(session.player_id().is_none());
        // a second disconnect is harmless
        session.disconnect();
    }
}
