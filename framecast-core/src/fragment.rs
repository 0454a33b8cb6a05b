//! Sender-side fragmentation of raster frames into chunk datagrams.
//!
//! A frame of `S` bytes is cut into `ceil(S / C)` chunks of at most `C`
//! payload bytes. Each chunk carries a [`ChunkHeader`] describing where it
//! lands in the raster, so the receiver needs no other framing. Chunks are
//! fired without waiting for acknowledgment; a short pause every few
//! chunks keeps a whole frame from leaving as a single burst.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio_util::codec::Encoder;
use tracing::{debug, trace, warn};

use crate::codec::{DatagramCodec, OutgoingChunk};
use crate::error::FramecastError;
use crate::frame::RawFrame;
use crate::wire::{ChunkHeader, MAX_CHUNK_PAYLOAD, MAX_DATAGRAM_SIZE, raster_len};

// ── DatagramSink ─────────────────────────────────────────────────

/// Anything that can put a datagram on the wire.
#[async_trait]
pub trait DatagramSink: Send {
    async fn send_datagram(&mut self, datagram: &[u8], target: SocketAddr) -> std::io::Result<usize>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_datagram(&mut self, datagram: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        self.send_to(datagram, target).await
    }
}

// ── Chunk planning ───────────────────────────────────────────────

/// Position of one chunk within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
}

/// Number of chunks needed for `frame_len` bytes at `payload_cap` bytes each.
pub fn total_chunks(frame_len: usize, payload_cap: usize) -> usize {
    frame_len.div_ceil(payload_cap)
}

/// Iterator over the chunk spans of a frame.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    frame_len: usize,
    payload_cap: usize,
    next: usize,
    total: usize,
}

impl ChunkPlan {
    /// # Panics
    ///
    /// Panics if `payload_cap` is zero.
    pub fn new(frame_len: usize, payload_cap: usize) -> Self {
        assert!(payload_cap > 0, "payload cap must be positive");
        Self {
            frame_len,
            payload_cap,
            next: 0,
            total: total_chunks(frame_len, payload_cap),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        let offset = index * self.payload_cap;
        let size = self.payload_cap.min(self.frame_len - offset);
        self.next += 1;
        Some(ChunkSpan {
            index,
            offset,
            size,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkPlan {}

// ── FragmenterConfig ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FragmenterConfig {
    /// Maximum payload bytes per chunk.
    pub payload_cap: usize,
    /// Pause after every `burst_len`-th chunk (0 disables pausing).
    pub burst_len: usize,
    pub burst_pause: Duration,
}

impl FragmenterConfig {
    /// Payload cap that keeps every datagram within `max_datagram` bytes.
    pub fn for_datagram_size(max_datagram: usize) -> Self {
        Self {
            payload_cap: max_datagram
                .saturating_sub(ChunkHeader::SIZE)
                .clamp(1, MAX_CHUNK_PAYLOAD),
            ..Self::default()
        }
    }
}

impl Default for FragmenterConfig {
    fn default() -> Self {
        Self {
            payload_cap: MAX_DATAGRAM_SIZE - ChunkHeader::SIZE,
            burst_len: 10,
            burst_pause: Duration::from_millis(1),
        }
    }
}

// ── FrameSendReport ──────────────────────────────────────────────

/// What happened to one frame handed to the fragmenter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSendReport {
    /// Frame id stamped on the chunks, `None` if the frame was withheld.
    pub frame_id: Option<u32>,
    pub total_chunks: usize,
    /// Chunks the socket accepted.
    pub chunks_sent: usize,
    pub bytes_sent: usize,
    pub send_errors: usize,
}

impl FrameSendReport {
    pub fn withheld() -> Self {
        Self::default()
    }

    pub fn was_sent(&self) -> bool {
        self.frame_id.is_some()
    }
}

// ── Fragmenter ───────────────────────────────────────────────────

/// Splits frames into chunk datagrams and stamps them with a running
/// frame id.
pub struct Fragmenter {
    config: FragmenterConfig,
    codec: DatagramCodec,
    buffer: BytesMut,
    frame_id: u32,
}

impl Fragmenter {
    pub fn new(config: FragmenterConfig) -> Self {
        assert!(config.payload_cap > 0, "payload cap must be positive");
        let buffer = BytesMut::with_capacity(ChunkHeader::SIZE + config.payload_cap);
        Self {
            config,
            codec: DatagramCodec::new(),
            buffer,
            frame_id: 0,
        }
    }

    pub fn config(&self) -> &FragmenterConfig {
        &self.config
    }

    /// Id of the most recently sent frame (0 before the first).
    pub fn last_frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Chunk layout for `frame`, after validating its geometry.
    pub fn plan(&self, frame: &RawFrame) -> Result<ChunkPlan, FramecastError> {
        let expected = raster_len(frame.width, frame.height).ok_or(FramecastError::InvalidGeometry {
            width: frame.width,
            height: frame.height,
            total_chunks: 0,
            reason: "raster size overflows",
        })?;
        if frame.data.len() != expected {
            return Err(FramecastError::RasterLength {
                expected,
                actual: frame.data.len(),
            });
        }
        if u32::try_from(expected).is_err() {
            return Err(FramecastError::InvalidGeometry {
                width: frame.width,
                height: frame.height,
                total_chunks: 0,
                reason: "raster does not fit 32-bit offsets",
            });
        }
        Ok(ChunkPlan::new(expected, self.config.payload_cap))
    }

    /// Fragment `frame` and send every chunk to `destination`.
    ///
    /// Without a destination nothing is sent and the frame is dropped:
    /// frames are never queued for a receiver that has not associated yet.
    pub async fn send_frame<S: DatagramSink + ?Sized>(
        &mut self,
        sink: &mut S,
        destination: Option<SocketAddr>,
        frame: &RawFrame,
    ) -> Result<FrameSendReport, FramecastError> {
        let Some(target) = destination else {
            trace!("no receiver associated, dropping frame");
            return Ok(FrameSendReport::withheld());
        };

        let plan = self.plan(frame)?;
        if plan.total() == 0 {
            warn!("empty {}x{} frame, nothing to send", frame.width, frame.height);
            return Ok(FrameSendReport::withheld());
        }

        self.frame_id = self.frame_id.wrapping_add(1);
        let mut report = FrameSendReport {
            frame_id: Some(self.frame_id),
            total_chunks: plan.total(),
            ..FrameSendReport::default()
        };

        for span in plan {
            let header = ChunkHeader {
                frame_id: self.frame_id,
                chunk_index: span.index as u32,
                total_chunks: report.total_chunks as u32,
                width: frame.width,
                height: frame.height,
                chunk_size: span.size as u32,
                chunk_offset: span.offset as u32,
            };

            self.buffer.clear();
            self.codec.encode(
                OutgoingChunk {
                    header,
                    payload: &frame.data[span.offset..span.offset + span.size],
                },
                &mut self.buffer,
            )?;

            match sink.send_datagram(&self.buffer, target).await {
                Ok(n) => {
                    report.chunks_sent += 1;
                    report.bytes_sent += n;
                }
                Err(e) => {
                    report.send_errors += 1;
                    debug!("send of chunk {} to {target} failed: {e}", span.index);
                }
            }

            if self.config.burst_len > 0
                && span.index % self.config.burst_len == 0
                && !self.config.burst_pause.is_zero()
            {
                tokio::time::sleep(self.config.burst_pause).await;
            }
        }

        if report.send_errors > 0 {
            warn!(
                "frame {}: {}/{} chunks failed to send",
                self.frame_id, report.send_errors, report.total_chunks
            );
        }

        Ok(report)
    }
}

// ── Tests ────────────────────────────────────────────────────────
