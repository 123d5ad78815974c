//! # Error Handling
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error
//! ├── Framing Errors (100-199)
//! │   ├── Truncated
//! │   ├── UnknownTag
//! │   ├── MalformedControl
//! │   └── LengthMismatch
//! ├── Chunk Plan Errors (200-299)
//! │   └── PlanMismatch
//! ├── Integrity Errors (300-399)
//! │   ├── DigestMismatch
//! │   └── AssemblyLengthMismatch
//! ├── Transport Errors (400-499)
//! │   ├── TransientSend
//! │   └── ChannelClosed
//! ├── I/O Errors (500-599)
//! │   ├── SourceRead
//! │   └── SinkWrite
//! └── Session Errors (600-699)
//!     ├── FatalTransfer
//!     └── RendezvousError
//! ```

use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the transfer engine.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Framing Errors (100-199)
    // ========================================================================
    /// Fewer bytes were available than the frame's own header declared.
    #[error("frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The leading discriminator byte was neither the control nor the
    /// data tag.
    #[error("unknown frame tag: {0:#x}")]
    UnknownTag(u8),

    /// A control frame's JSON body didn't parse or didn't match any
    /// known variant.
    #[error("malformed control frame: {0}")]
    MalformedControl(#[from] serde_json::Error),

    /// A data frame's header declared a payload length that didn't
    /// match the bytes actually present.
    #[error("data frame length mismatch: header said {declared}, got {actual}")]
    LengthMismatch { declared: u32, actual: u32 },

    /// A data frame's declared payload length exceeds the configured
    /// sub-chunk size.
    #[error("data frame payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: u32, max: u32 },

    // ========================================================================
    // Chunk Plan Errors (200-299)
    // ========================================================================
    /// The receiver's derived chunk plan disagrees with the sender's
    /// announced counts.
    #[error("chunk plan mismatch: sender announced {announced} sub-chunks, derived {derived}")]
    PlanMismatch { announced: u32, derived: u32 },

    // ========================================================================
    // Integrity Errors (300-399)
    // ========================================================================
    /// A sub-chunk's payload did not hash to its announced digest.
    #[error("digest mismatch for sub-chunk {flat_index}")]
    DigestMismatch { flat_index: u32 },

    /// A sub-chunk's payload length didn't match the length the chunk
    /// plan assigns to its flat index, even though the digest matched.
    #[error(
        "assembled length mismatch for sub-chunk {flat_index}: plan says {expected} bytes, got {actual}"
    )]
    AssemblyLengthMismatch {
        flat_index: u32,
        expected: u32,
        actual: u32,
    },

    // ========================================================================
    // Transport Errors (400-499)
    // ========================================================================
    /// A send attempt failed for a reason expected to clear on retry
    /// (e.g. the transport's outbound queue was momentarily full).
    #[error("transient send error: {0}")]
    TransientSend(String),

    /// The underlying channel closed while a send or receive was
    /// outstanding.
    #[error("transport channel closed")]
    ChannelClosed,

    // ========================================================================
    // I/O Errors (500-599)
    // ========================================================================
    /// Reading the source file failed.
    #[error("failed to read source file: {0}")]
    SourceRead(String),

    /// Writing the destination file failed.
    #[error("failed to write sink file: {0}")]
    SinkWrite(String),

    // ========================================================================
    // Session Errors (600-699)
    // ========================================================================
    /// A sub-chunk exhausted its retry budget; the transfer cannot
    /// complete.
    #[error("sub-chunk {flat_index} failed after {retries} retries")]
    FatalTransfer { flat_index: u32, retries: u32 },

    /// The rendezvous service rejected or could not complete pairing.
    #[error("rendezvous error: {0}")]
    Rendezvous(String),

    /// A session method was called in a phase that doesn't permit it
    /// (e.g. starting a new transfer while one is in progress).
    #[error("invalid session transition: {0}")]
    InvalidTransition(String),
}
