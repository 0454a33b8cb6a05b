//! Raster frames handed from a frame source to the fragmenter.
//!
//! The raster layout is fixed configuration, not negotiated: tightly
//! packed RGB24 rows, [`crate::wire::BYTES_PER_PIXEL`] bytes per pixel,
//! no row padding.

use crate::error::FramecastError;
use crate::wire::raster_len;

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed raster ready to be fragmented.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Packed RGB24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Build a frame, checking that `data` matches the geometry.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FramecastError> {
        let expected = raster_len(width, height).ok_or(FramecastError::InvalidGeometry {
            width,
            height,
            total_chunks: 0,
            reason: "raster size overflows",
        })?;
        if data.len() != expected {
            return Err(FramecastError::RasterLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// An all-black frame.
    pub fn black(width: u32, height: u32) -> Result<Self, FramecastError> {
        let len = raster_len(width, height).ok_or(FramecastError::InvalidGeometry {
            width,
            height,
            total_chunks: 0,
            reason: "raster size overflows",
        })?;
        Self::new(width, height, vec![0; len])
    }
}
