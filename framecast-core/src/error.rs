//! Domain-specific error types for the framecast protocol.
//!
//! All fallible operations return `Result<T, FramecastError>`.
//! Malformed datagrams surface as typed errors so the receive loops can
//! drop them without panicking.

use std::collections::TryReserveError;
use std::net::SocketAddr;

use thiserror::Error;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum FramecastError {
    // ── Wire Errors ──────────────────────────────────────────────
    /// The datagram is shorter than the structure it should contain.
    #[error("datagram too short: {actual} < {expected}")]
    Truncated { expected: usize, actual: usize },

    /// The leading tag byte does not name a known message type.
    #[error("unknown message type: {0:#x}")]
    UnknownMessageType(u8),

    /// A known message type arrived on the wrong channel.
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessageType { expected: u8, actual: u8 },

    /// The chunk declares more payload than a datagram may carry.
    #[error("chunk too large: {size} bytes (max {max})")]
    ChunkTooLarge { size: usize, max: usize },

    /// The datagram length disagrees with the length its header declares.
    #[error("invalid datagram length: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A control sample carried a non-finite axis value.
    #[error("invalid control sample: {0}")]
    InvalidControl(&'static str),

    // ── Frame Errors ─────────────────────────────────────────────
    /// A chunk would write outside its frame's raster.
    #[error("chunk out of bounds: offset {offset} + size {size} > frame size {frame_size}")]
    ChunkOutOfBounds {
        offset: usize,
        size: usize,
        frame_size: usize,
    },

    /// The chunk index is not below the frame's chunk count.
    #[error("chunk index {index} out of range (total {total})")]
    ChunkIndexOutOfRange { index: u32, total: u32 },

    /// The frame geometry cannot be represented or exceeds the limit.
    #[error("invalid frame geometry {width}x{height} with {total_chunks} chunks: {reason}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        total_chunks: u32,
        reason: &'static str,
    },

    /// The raster handed to the fragmenter has the wrong length.
    #[error("raster length mismatch: expected {expected} bytes, got {actual}")]
    RasterLength { expected: usize, actual: usize },

    /// Frame storage could not be allocated.
    #[error("frame storage allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    // ── Collaborator Errors ──────────────────────────────────────
    /// The frame source failed to produce a raster.
    #[error("frame source error: {0}")]
    Source(String),

    /// The display sink rejected a frame.
    #[error("display error: {0}")]
    Display(String),

    // ── Socket Errors ────────────────────────────────────────────
    /// A socket could not be created or bound at start-up.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The socket layer reported an error.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
