//! Display buffer swap and the display sink boundary.
//!
//! The receiver keeps a second, independently owned buffer that the
//! render path reads. It is only ever written by one bulk copy from a
//! completed [`FrameBuffer`], so the renderer never sees a half-assembled
//! frame while the reassembler keeps overwriting its own storage.

use tracing::debug;

use crate::error::FramecastError;
use crate::reassembly::FrameBuffer;
use crate::wire::raster_len;

/// Presents completed frames, e.g. a window or a recorder.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: &DisplayBuffer) -> Result<(), FramecastError>;
}

#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    frame_id: u32,
    width: u32,
    height: u32,
    pixel_data: Vec<u8>,
    complete: bool,
}

impl DisplayBuffer {
    /// A black raster of the initial resolution, not yet complete.
    pub fn new(width: u32, height: u32) -> Result<Self, FramecastError> {
        let len = raster_len(width, height).ok_or(FramecastError::InvalidGeometry {
            width,
            height,
            total_chunks: 0,
            reason: "raster size overflows",
        })?;
        let mut pixel_data = Vec::new();
        pixel_data.try_reserve_exact(len)?;
        pixel_data.resize(len, 0);
        Ok(Self {
            frame_id: 0,
            width,
            height,
            pixel_data,
            complete: false,
        })
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

    pub fn pixel_data(&self) -> &[u8] {
        &self.pixel_data
    }

    /// Whether a frame has ever been swapped in.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Copy a completed frame in, taking over its dimensions and id.
    ///
    /// An incomplete frame is refused and leaves the buffer untouched.
    pub fn present_from(&mut self, frame: &FrameBuffer) -> Result<(), FramecastError> {
        if !frame.is_complete() {
            return Err(FramecastError::Display(format!(
                "frame {} is incomplete ({}/{} chunks)",
                frame.frame_id(),
                frame.chunks_received(),
                frame.total_chunks()
            )));
        }

        let src = frame.pixel_data();
        if src.len() != self.pixel_data.len() {
            debug!(
                "display resized {}x{} -> {}x{}",
                self.width,
                self.height,
                frame.width(),
                frame.height()
            );
            let mut resized = Vec::new();
            resized.try_reserve_exact(src.len())?;
            resized.extend_from_slice(src);
            self.pixel_data = resized;
        } else {
            self.pixel_data.copy_from_slice(src);
        }

        self.frame_id = frame.frame_id();
        self.width = frame.width();
        self.height = frame.height();
        self.complete = true;
        Ok(())
    }
}
