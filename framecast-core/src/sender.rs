//! Sender service: one cooperative loop per process.
//!
//! Each pass:
//!
//! 1. Drains every queued control datagram into the [`AssociationTracker`].
//! 2. Idles while no receiver is associated.
//! 3. Produces the next frame from the [`FrameSource`].
//! 4. Fragments and sends it through the [`Fragmenter`].
//! 5. Updates statistics and sleeps out the rest of the frame budget.
//!
//! The association is written by step 1 and read by step 4 of the same
//! loop, so no locking is involved.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, error, info, trace, warn};

use crate::association::AssociationTracker;
use crate::error::FramecastError;
use crate::fragment::{FrameSendReport, Fragmenter, FragmenterConfig};
use crate::frame::RawFrame;
use crate::net;
use crate::pacer::Pacer;
use crate::source::FrameSource;
use crate::stats::{DEFAULT_STATS_INTERVAL, SenderCounters, SenderStats};
use crate::wire::{ControlSample, DEFAULT_CONTROL_PORT, DEFAULT_VIDEO_PORT};

// ── SenderConfig ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Where the control socket is bound.
    pub control_addr: SocketAddr,
    /// Port the receiver listens on for video.
    pub video_port: u16,
    pub target_fps: u32,
    pub fragmenter: FragmenterConfig,
    /// Sleep between checks while no receiver is associated.
    pub idle_delay: Duration,
    /// Re-send the newest frame when the source has nothing new.
    pub repeat_last_frame: bool,
    pub stats_interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            control_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_CONTROL_PORT)),
            video_port: DEFAULT_VIDEO_PORT,
            target_fps: 30,
            fragmenter: FragmenterConfig::default(),
            idle_delay: Duration::from_millis(100),
            repeat_last_frame: true,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

// ── Sender ───────────────────────────────────────────────────────

pub struct Sender {
    config: SenderConfig,
    control_socket: UdpSocket,
    video_socket: UdpSocket,
    source: Box<dyn FrameSource>,
    fragmenter: Fragmenter,
    pacer: Pacer,
    association: AssociationTracker,
    stats: SenderStats,
    last_frame: Option<RawFrame>,
    control_buf: Vec<u8>,
    running: Arc<AtomicBool>,
}

impl Sender {
    /// Bind the control port and an ephemeral video socket.
    pub fn bind(config: SenderConfig, source: Box<dyn FrameSource>) -> Result<Self, FramecastError> {
        let control_socket = net::bind_udp(config.control_addr, None)?;
        let video_socket = net::bind_ephemeral_for(config.control_addr)?;
        Ok(Self::from_sockets(config, control_socket, video_socket, source))
    }

    /// Build a sender around already bound sockets.
    pub fn from_sockets(
        config: SenderConfig,
        control_socket: UdpSocket,
        video_socket: UdpSocket,
        source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            fragmenter: Fragmenter::new(config.fragmenter.clone()),
            pacer: Pacer::new(config.target_fps),
            association: AssociationTracker::new(config.video_port),
            stats: SenderStats::new(config.stats_interval),
            last_frame: None,
            // One spare byte so oversized control datagrams fail the exact-size check.
            control_buf: vec![0; ControlSample::SIZE + 1],
            running: Arc::new(AtomicBool::new(true)),
            config,
            control_socket,
            video_socket,
            source,
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn local_control_addr(&self) -> Result<SocketAddr, FramecastError> {
        Ok(self.control_socket.local_addr()?)
    }

    pub fn association(&self) -> &AssociationTracker {
        &self.association
    }

    pub fn counters(&self) -> SenderCounters {
        self.stats.counters()
    }

    /// A cloneable handle; storing `false` stops the loop after the
    /// current pass.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped. Only a failing frame source ends the loop early.
    pub async fn run(&mut self) -> Result<(), FramecastError> {
        let (width, height) = self.source.dimensions();
        info!(
            "sender up: control on {}, streaming {width}x{height} at {} fps to port {}",
            self.local_control_addr()?,
            self.pacer.target_fps(),
            self.config.video_port
        );

        while self.is_running() {
            self.drain_control();

            if !self.association.is_connected() {
                self.stats.maybe_report();
                tokio::time::sleep(self.config.idle_delay).await;
                continue;
            }

            self.pacer.begin_frame();
            if let Err(e) = self.send_next_frame().await {
                error!("frame source failed: {e}");
                return Err(e);
            }
            self.stats.maybe_report();
            self.pacer.pace().await;
        }

        match (self.association.destination(), self.association.connected_duration()) {
            (Some(dest), Some(d)) => {
                info!("sender stopped after {:.1}s associated, last receiver {dest}", d.as_secs_f64())
            }
            _ => info!("sender stopped; no receiver ever associated"),
        }
        Ok(())
    }

    /// Read every queued control datagram without blocking.
    ///
    /// Returns how many valid samples were taken.
    pub fn drain_control(&mut self) -> usize {
        let mut taken = 0;
        loop {
            match self.control_socket.try_recv_from(&mut self.control_buf) {
                Ok((n, from)) => match ControlSample::decode(&self.control_buf[..n]) {
                    Ok(sample) => {
                        self.association.observe(from, sample);
                        self.stats.record_control();
                        taken += 1;
                    }
                    Err(e) => trace!("dropping control datagram from {from}: {e}"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    // ICMP errors from a vanished peer surface here on some platforms.
                    debug!("control socket: {e}");
                    break;
                }
            }
        }
        taken
    }

    /// Produce one frame and send it to the current destination.
    pub async fn send_next_frame(&mut self) -> Result<FrameSendReport, FramecastError> {
        match self.source.next_frame()? {
            Some(frame) => {
                self.stats.record_produced();
                self.last_frame = Some(frame);
            }
            None if self.config.repeat_last_frame && self.last_frame.is_some() => {
                trace!("source idle, repeating newest frame");
            }
            None => return Ok(FrameSendReport::withheld()),
        }

        let Some(frame) = self.last_frame.as_ref() else {
            return Ok(FrameSendReport::withheld());
        };

        let destination = self.association.destination();
        let report = match self
            .fragmenter
            .send_frame(&mut self.video_socket, destination, frame)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("cannot fragment {}x{} frame: {e}", frame.width, frame.height);
                FrameSendReport::withheld()
            }
        };
        self.stats.record_frame(&report);
        Ok(report)
    }
}

// ── Tests ────────────────────────────────────────────────────────
