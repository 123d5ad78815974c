//! Bulk file transfer engine.
//!
//! A file is split into main chunks, each subdivided into sub-chunks
//! (see [`chunk_plan`]). The sender streams sub-chunks across an
//! already-established, ordered, message-oriented [`transport`] under
//! a backpressure and admission-control gate ([`send`]); the receiver
//! verifies each sub-chunk's digest ([`integrity`]) and assembles them
//! in order ([`receive`]). A [`session`] tracks which phase a paired
//! connection is in. Two peers find each other through a short-lived
//! [`rendezvous_client`] handshake with a separate pairing server.

pub mod adaptive;
pub mod chunk_plan;
pub mod config;
pub mod error;
pub mod framing;
pub mod integrity;
pub mod receive;
pub mod rendezvous_client;
pub mod send;
pub mod session;
pub mod sink;
pub mod source;
pub mod stats;
pub mod time;
pub mod transport;

pub use error::{Error, Result};
