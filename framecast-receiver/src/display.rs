//! Headless display sink.
//!
//! Stands in for a window: counts presented frames and, when a snapshot
//! path is configured, periodically writes the current frame as a binary
//! PPM image so the stream can be inspected without a GUI.
//!
//! Snapshots are written on Tokio's blocking pool from a copy of the
//! raster, so `present` must be called from inside a runtime.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use framecast_core::display::{DisplayBuffer, DisplaySink};
use framecast_core::error::FramecastError;

pub struct HeadlessDisplay {
    snapshot: Option<PathBuf>,
    snapshot_every: u64,
    presented: u64,
    writer: Option<JoinHandle<std::io::Result<()>>>,
}

impl HeadlessDisplay {
    /// `snapshot_every` of 0 is treated as 1.
    pub fn new(snapshot: Option<PathBuf>, snapshot_every: u64) -> Self {
        Self {
            snapshot,
            snapshot_every: snapshot_every.max(1),
            presented: 0,
            writer: None,
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn start_snapshot(&mut self, path: PathBuf, frame: &DisplayBuffer) {
        if self.writer.as_ref().is_some_and(|w| !w.is_finished()) {
            debug!("previous snapshot still writing, skipping frame {}", frame.frame_id());
            return;
        }

        let (width, height) = (frame.width(), frame.height());
        let pixels = frame.pixel_data().to_vec();
        self.writer = Some(tokio::task::spawn_blocking(move || {
            let result = write_ppm(&path, width, height, &pixels);
            if let Err(e) = &result {
                warn!("snapshot {}: {e}", path.display());
            }
            result
        }));
    }
}

/// Write a packed RGB24 raster as a binary PPM (P6).
pub fn write_ppm(path: &Path, width: u32, height: u32, pixels: &[u8]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{width} {height}\n255\n")?;
    out.write_all(pixels)?;
    out.flush()
}

impl DisplaySink for HeadlessDisplay {
    fn present(&mut self, frame: &DisplayBuffer) -> Result<(), FramecastError> {
        self.presented += 1;
        debug!(
            "present frame {} ({}x{})",
            frame.frame_id(),
            frame.width(),
            frame.height()
        );

        if let Some(path) = &self.snapshot {
            if self.presented % self.snapshot_every == 0 {
                let path = path.clone();
                self.start_snapshot(path, frame);
            }
        }
        Ok(())
    }
}
