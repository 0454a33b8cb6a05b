//! # framecast-core
//!
//! Best-effort UDP transport for raw raster frames, with a control
//! channel running the other way.
//!
//! This crate contains:
//! - **Wire format**: `ChunkHeader`, `ControlSample`, `MessageType`
//! - **Codec**: `DatagramCodec` for one-message-per-datagram I/O via `tokio_util`
//! - **Sender side**: `Fragmenter`, `Pacer`, `AssociationTracker`, `Sender`
//! - **Receiver side**: `Reassembler`, `DisplayBuffer`, `ControlEmitter`, `Receiver`
//! - **Boundaries**: `FrameSource`, `DisplaySink`, `InputProvider`
//! - **Stats**: per-side counters and a rolling `ThroughputMeter`
//! - **Error**: `FramecastError`, a typed `thiserror`-based error enum

pub mod association;
pub mod codec;
pub mod control;
pub mod display;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod net;
pub mod pacer;
pub mod reassembly;
pub mod receiver;
pub mod sender;
pub mod source;
pub mod stats;
pub mod wire;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use association::AssociationTracker;
pub use codec::{DatagramCodec, OutgoingChunk};
pub use control::{ControlEmitter, InputProvider, InputSnapshot, JoystickState, KeyboardState};
pub use display::{DisplayBuffer, DisplaySink};
pub use error::FramecastError;
pub use fragment::{ChunkPlan, DatagramSink, FrameSendReport, Fragmenter, FragmenterConfig};
pub use frame::RawFrame;
pub use pacer::Pacer;
pub use reassembly::{ChunkOutcome, FrameBuffer, FrameState, Reassembler};
pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{Sender, SenderConfig};
pub use source::{FrameSource, RawVideoFile, TestPattern};
pub use stats::{ReceiverCounters, SenderCounters, ThroughputMeter};
pub use wire::{
    BYTES_PER_PIXEL, ChunkHeader, ControlSample, DEFAULT_CONTROL_PORT, DEFAULT_VIDEO_PORT,
    MAX_CHUNK_PAYLOAD, MAX_DATAGRAM_SIZE, MessageType,
};
