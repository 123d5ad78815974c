//! Client-side wire types for the rendezvous pairing service.
//!
//! Two peers use a short-lived JSON-over-WebSocket connection to a
//! rendezvous server purely to exchange an `offer`/`answer`/ICE
//! candidate handshake; the payloads themselves are opaque to both the
//! server and this crate (they belong to whatever transport the two
//! peers end up using). Once the direct channel is up, the rendezvous
//! connection can be dropped.

use serde::{Deserialize, Serialize};

/// Messages a client sends to the rendezvous server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Ask the server to mint a new room and become its host.
    CreateRoom,
    /// Join a room the host already created.
    JoinRoom { code: String },
    /// Opaque session-description payload, relayed to the other
    /// participant in the room.
    Offer { payload: String },
    Answer { payload: String },
    IceCandidate { payload: String },
}

/// Messages the rendezvous server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The room was created; `code` is the four-digit code to share
    /// with the peer out of band.
    RoomCreated { code: String },
    /// Confirms the guest's join was accepted.
    RoomJoined { code: String },
    /// Tells the host a guest joined their room.
    ClientJoined { client_id: String },
    Offer { payload: String },
    Answer { payload: String },
    IceCandidate { payload: String },
    /// The request could not be completed (unknown room code, room
    /// already full, etc).
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_kebab_case_tags() {
        let json = serde_json::to_string(&ClientMessage::CreateRoom).unwrap();
        assert_eq!(json, r#"{"type":"create-room"}"#);

        let json = serde_json::to_string(&ClientMessage::JoinRoom {
            code: "4821".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"join-room""#));
        assert!(json.contains(r#""code":"4821""#));
    }

    #[test]
    fn server_messages_round_trip() {
        let messages = vec![
            ServerMessage::RoomCreated {
                code: "1234".into(),
            },
            ServerMessage::RoomJoined {
                code: "1234".into(),
            },
            ServerMessage::ClientJoined {
                client_id: "guest-1".into(),
            },
            ServerMessage::Offer {
                payload: "sdp-offer-blob".into(),
            },
            ServerMessage::Answer {
                payload: "sdp-answer-blob".into(),
            },
            ServerMessage::IceCandidate {
                payload: "candidate-blob".into(),
            },
            ServerMessage::Error {
                message: "room not found".into(),
            },
        ];
        for message in messages {
            let json = serde_json::to_string(&message).unwrap();
            let decoded: ServerMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn error_message_uses_kebab_case_tag() {
        let json = serde_json::to_string(&ServerMessage::Error {
            message: "invalid room".into(),
        })
        .unwrap();
        assert!(json.starts_with(r#"{"type":"error""#));
    }
}
