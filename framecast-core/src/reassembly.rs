//! Receiver-side reassembly of chunk datagrams into frames.
//!
//! Only the most recently started frame is tracked. The first chunk of a
//! different `frame_id` resets the in-progress buffer, abandoning whatever
//! was partially assembled; no signal is raised beyond a counter. Chunks
//! of one frame may arrive in any order, and duplicates are ignored.
//!
//! ```text
//! EMPTY ──first chunk──► ASSEMBLING ──all chunks──► COMPLETE
//!                            ▲                          │
//!                            └──── new frame_id ────────┘
//! ```

use std::collections::TryReserveError;

use tracing::{debug, trace, warn};

use crate::codec::DatagramCodec;
use crate::error::FramecastError;
use crate::wire::ChunkHeader;

/// Default ceiling on a single frame's raster allocation (64 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

fn zeroed<T: Clone>(len: usize, value: T) -> Result<Vec<T>, TryReserveError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, value);
    Ok(v)
}

// ── FrameState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Empty,
    Assembling,
    Complete,
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// The in-progress frame. Storage is allocated lazily and reused.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    started: bool,
    frame_id: u32,
    width: u32,
    height: u32,
    total_chunks: u32,
    chunks_received: u32,
    chunk_status: Vec<bool>,
    pixel_data: Vec<u8>,
    complete: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FrameState {
        match (self.started, self.complete) {
            (false, _) => FrameState::Empty,
            (true, false) => FrameState::Assembling,
            (true, true) => FrameState::Complete,
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn chunks_received(&self) -> u32 {
        self.chunks_received
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn has_chunk(&self, index: u32) -> bool {
        self.chunk_status.get(index as usize).copied().unwrap_or(false)
    }

    pub fn pixel_data(&self) -> &[u8] {
        &self.pixel_data
    }

    fn has_progress(&self) -> bool {
        self.started && !self.complete && self.chunks_received > 0
    }

    fn matches_geometry(&self, header: &ChunkHeader) -> bool {
        !self.pixel_data.is_empty()
            && self.width == header.width
            && self.height == header.height
            && self.total_chunks == header.total_chunks
    }

    /// Start tracking `frame_id` from scratch, keeping the storage.
    fn reset(&mut self, frame_id: u32) {
        self.started = true;
        self.frame_id = frame_id;
        self.chunks_received = 0;
        self.complete = false;
        self.chunk_status.fill(false);
    }

    /// Swap in freshly zeroed storage for a new geometry.
    fn install(&mut self, header: &ChunkHeader, chunk_status: Vec<bool>, pixel_data: Vec<u8>) {
        self.width = header.width;
        self.height = header.height;
        self.total_chunks = header.total_chunks;
        self.chunks_received = 0;
        self.complete = false;
        self.chunk_status = chunk_status;
        self.pixel_data = pixel_data;
    }
}

// ── ChunkOutcome ─────────────────────────────────────────────────

/// How one datagram was classified.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Stored; the frame is still incomplete.
    Accepted {
        frame_id: u32,
        chunks_received: u32,
        total_chunks: u32,
    },
    /// Stored, and it was the last missing chunk.
    Completed { frame_id: u32 },
    /// Already had this chunk; nothing changed.
    Duplicate { frame_id: u32, chunk_index: u32 },
    /// Dropped without touching the frame.
    Rejected(FramecastError),
}

impl ChunkOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ChunkOutcome::Accepted { .. } | ChunkOutcome::Completed { .. })
    }
}

// ── Reassembler ──────────────────────────────────────────────────

pub struct Reassembler {
    codec: DatagramCodec,
    max_frame_bytes: usize,
    frame: FrameBuffer,
    frames_abandoned: u64,
}

impl Reassembler {
    pub fn new(max_chunk_payload: usize, max_frame_bytes: usize) -> Self {
        Self {
            codec: DatagramCodec::with_max_chunk_payload(max_chunk_payload),
            max_frame_bytes,
            frame: FrameBuffer::new(),
            frames_abandoned: 0,
        }
    }

    pub fn codec(&self) -> &DatagramCodec {
        &self.codec
    }

    /// The in-progress buffer.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Incomplete frames discarded because a newer one started.
    pub fn frames_abandoned(&self) -> u64 {
        self.frames_abandoned
    }

    /// Validate a raw chunk datagram and feed it to the buffer.
    pub fn accept_datagram(&mut self, datagram: &[u8]) -> ChunkOutcome {
        match self.codec.decode_chunk(datagram) {
            Ok((header, payload)) => self.accept_chunk(&header, payload),
            Err(e) => {
                trace!("dropping malformed datagram: {e}");
                ChunkOutcome::Rejected(e)
            }
        }
    }

    /// Feed an already validated chunk to the buffer.
    pub fn accept_chunk(&mut self, header: &ChunkHeader, payload: &[u8]) -> ChunkOutcome {
        let new_frame = !self.frame.started || header.frame_id != self.frame.frame_id;
        let resize = !self.frame.matches_geometry(header);

        // Allocate before touching the buffer so a failure leaves it as it was.
        let storage = if resize {
            match self.allocate(header) {
                Ok(storage) => Some(storage),
                Err(e) => {
                    warn!("cannot hold frame {}: {e}", header.frame_id);
                    return ChunkOutcome::Rejected(e);
                }
            }
        } else {
            None
        };

        if (new_frame || storage.is_some()) && self.frame.has_progress() {
            debug!(
                "abandoning frame {} at {}/{} chunks",
                self.frame.frame_id, self.frame.chunks_received, self.frame.total_chunks
            );
            self.frames_abandoned += 1;
        }
        if new_frame {
            self.frame.reset(header.frame_id);
        }
        if let Some((chunk_status, pixel_data)) = storage {
            debug!(
                "allocated frame storage: {}x{}, {} chunks",
                header.width, header.height, header.total_chunks
            );
            self.frame.install(header, chunk_status, pixel_data);
        }

        let index = header.chunk_index;
        if index >= self.frame.total_chunks {
            return ChunkOutcome::Rejected(FramecastError::ChunkIndexOutOfRange {
                index,
                total: self.frame.total_chunks,
            });
        }
        if self.frame.chunk_status[index as usize] {
            return ChunkOutcome::Duplicate {
                frame_id: header.frame_id,
                chunk_index: index,
            };
        }

        let offset = header.chunk_offset as usize;
        let end = offset + payload.len();
        if end > self.frame.pixel_data.len() {
            return ChunkOutcome::Rejected(FramecastError::ChunkOutOfBounds {
                offset,
                size: payload.len(),
                frame_size: self.frame.pixel_data.len(),
            });
        }

        self.frame.pixel_data[offset..end].copy_from_slice(payload);
        self.frame.chunk_status[index as usize] = true;
        self.frame.chunks_received += 1;

        if self.frame.chunks_received == self.frame.total_chunks {
            self.frame.complete = true;
            ChunkOutcome::Completed {
                frame_id: self.frame.frame_id,
            }
        } else {
            ChunkOutcome::Accepted {
                frame_id: self.frame.frame_id,
                chunks_received: self.frame.chunks_received,
                total_chunks: self.frame.total_chunks,
            }
        }
    }

    fn allocate(&self, header: &ChunkHeader) -> Result<(Vec<bool>, Vec<u8>), FramecastError> {
        let geometry_error = |reason| FramecastError::InvalidGeometry {
            width: header.width,
            height: header.height,
            total_chunks: header.total_chunks,
            reason,
        };

        let frame_len = header
            .frame_len()
            .ok_or_else(|| geometry_error("raster size overflows"))?;
        if frame_len == 0 {
            return Err(geometry_error("empty raster"));
        }
        if frame_len > self.max_frame_bytes {
            return Err(geometry_error("raster exceeds frame size limit"));
        }
        if header.total_chunks == 0 || header.total_chunks as usize > frame_len {
            return Err(geometry_error("chunk count does not fit raster"));
        }

        let chunk_status = zeroed(header.total_chunks as usize, false)?;
        let pixel_data = zeroed(frame_len, 0u8)?;
        Ok((chunk_status, pixel_data))
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(crate::wire::MAX_CHUNK_PAYLOAD, DEFAULT_MAX_FRAME_BYTES)
    }
}

// ── Tests ────────────────────────────────────────────────────────
