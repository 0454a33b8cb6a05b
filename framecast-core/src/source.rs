//! Frame sources: the boundary between the sender and whatever decodes
//! video into raw rasters.
//!
//! Decoding and colour conversion live outside this crate. A source only
//! has to hand over packed RGB24 rasters at a fixed resolution. Two
//! built-in sources cover testing and pre-decoded footage.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FramecastError;
use crate::frame::RawFrame;
use crate::wire::{BYTES_PER_PIXEL, raster_len};

/// Produces successive raster frames at a known resolution.
pub trait FrameSource: Send {
    /// Resolution of the frames this source yields.
    fn dimensions(&self) -> (u32, u32);

    /// Produce the next frame.
    ///
    /// `Ok(None)` means no new frame is ready yet; the sender then falls
    /// back to re-sending the newest frame it has.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, FramecastError>;
}

fn checked_len(width: u32, height: u32) -> Result<usize, FramecastError> {
    match raster_len(width, height) {
        Some(len) if len > 0 => Ok(len),
        _ => Err(FramecastError::InvalidGeometry {
            width,
            height,
            total_chunks: 0,
            reason: "source resolution must be non-zero",
        }),
    }
}

// ── TestPattern ──────────────────────────────────────────────────

/// Animated gradient, useful to eyeball tearing and frame drops.
pub struct TestPattern {
    width: u32,
    height: u32,
    frame_number: u32,
    buffer: Vec<u8>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Result<Self, FramecastError> {
        let len = checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            frame_number: 0,
            buffer: vec![0; len],
        })
    }

    fn paint(&mut self) {
        let n = self.frame_number;
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for (y, row) in self.buffer.chunks_exact_mut(stride).enumerate() {
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let (x, y) = (x as u32, y as u32);
                px[0] = x.wrapping_add(n.wrapping_mul(4)) as u8;
                px[1] = y.wrapping_add(n.wrapping_mul(2)) as u8;
                px[2] = (x ^ y).wrapping_add(n) as u8;
            }
        }
    }
}

impl FrameSource for TestPattern {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, FramecastError> {
        self.paint();
        self.frame_number = self.frame_number.wrapping_add(1);
        RawFrame::new(self.width, self.height, self.buffer.clone()).map(Some)
    }
}

// ── RawVideoFile ─────────────────────────────────────────────────

/// Reads consecutive packed RGB24 frames from a file, looping back to the
/// start at end of file.
///
/// A trailing partial frame is ignored.
pub struct RawVideoFile {
    path: PathBuf,
    file: File,
    width: u32,
    height: u32,
    frame_len: usize,
}

impl RawVideoFile {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self, FramecastError> {
        let frame_len = checked_len(width, height)?;
        let file = File::open(path).map_err(|e| {
            FramecastError::Source(format!("cannot open {}: {e}", path.display()))
        })?;
        let file_len = file.metadata()?.len();
        if file_len < frame_len as u64 {
            return Err(FramecastError::Source(format!(
                "{} holds {file_len} bytes, less than one {width}x{height} frame ({frame_len} bytes)",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            width,
            height,
            frame_len,
        })
    }
}

impl FrameSource for RawVideoFile {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, FramecastError> {
        let mut data = vec![0; self.frame_len];
        match self.file.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("end of {}, rewinding", self.path.display());
                self.file.seek(SeekFrom::Start(0))?;
                self.file.read_exact(&mut data)?;
            }
            Err(e) => return Err(e.into()),
        }
        RawFrame::new(self.width, self.height, data).map(Some)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("framecast-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_pattern_animates() {
        let mut src = TestPattern::new(8, 4).unwrap();
        let a = src.next_frame().unwrap().unwrap();
        let b = src.next_frame().unwrap().unwrap();
        assert_eq!(a.data.len(), 8 * 4 * 3);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(TestPattern::new(0, 4).is_err());
    }

    #[test]
    fn raw_file_loops_at_eof() {
        let path = temp_path("loop.rgb");
        // Two 2x1 frames plus a trailing partial frame.
        let mut bytes: Vec<u8> = vec![1; 6];
        bytes.extend_from_slice(&[2; 6]);
        bytes.extend_from_slice(&[3; 4]);
        std::fs::write(&path, &bytes).unwrap();

        let mut src = RawVideoFile::open(&path, 2, 1).unwrap();
        let frames: Vec<u8> = (0..4)
            .map(|_| src.next_frame().unwrap().unwrap().data[0])
            .collect();
        assert_eq!(frames, vec![1, 2, 1, 2]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn raw_file_too_small() {
        let path = temp_path("small.rgb");
        std::fs::write(&path, [0u8; 5]).unwrap();
        assert!(matches!(
            RawVideoFile::open(&path, 2, 1),
            Err(FramecastError::Source(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
