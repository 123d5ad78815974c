//! Wire messages for the rendezvous WebSocket, independent of
//! `transfer_core::rendezvous_client`'s client-side mirror of the same
//! shapes — the two crates never share a dependency on each other's
//! message types, each defining its own half of the same wire contract.

use serde::{Deserialize, Serialize};

/// Messages a connected peer sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Mint a new room and become its host.
    CreateRoom,
    /// Join a room a host already created.
    JoinRoom { code: String },
    /// Opaque connection-setup payloads, relayed verbatim to whichever
    /// other participant is in the same room.
    Offer { payload: String },
    Answer { payload: String },
    IceCandidate { payload: String },
}

/// Messages the server sends to a connected peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomCreated { code: String },
    RoomJoined { code: String },
    ClientJoined { client_id: String },
    Offer { payload: String },
    Answer { payload: String },
    IceCandidate { payload: String },
    Error { message: String },
}
