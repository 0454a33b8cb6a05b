//! Receiver service: one cooperative loop per process.
//!
//! Every tick (1 ms by default) the loop drains all queued video
//! datagrams into the [`Reassembler`], presents a newly completed frame
//! to the [`DisplaySink`], emits a control sample when one is due, and
//! reports statistics.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::control::{ControlEmitter, DEFAULT_CONTROL_INTERVAL, InputProvider};
use crate::display::{DisplayBuffer, DisplaySink};
use crate::error::FramecastError;
use crate::net;
use crate::reassembly::{ChunkOutcome, DEFAULT_MAX_FRAME_BYTES, Reassembler};
use crate::stats::{DEFAULT_STATS_INTERVAL, ReceiverCounters, ReceiverStats};
use crate::wire::{
    DEFAULT_CONTROL_PORT, DEFAULT_HEIGHT, DEFAULT_VIDEO_PORT, DEFAULT_WIDTH, MAX_CHUNK_PAYLOAD,
};

// ── ReceiverConfig ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// The sender's control endpoint.
    pub server_control_addr: SocketAddr,
    /// Where the video socket is bound.
    pub video_addr: SocketAddr,
    /// Kernel receive buffer for the video socket; `None` keeps the OS default.
    pub recv_buffer: Option<usize>,
    pub max_chunk_payload: usize,
    pub max_frame_bytes: usize,
    /// Resolution of the black display shown before the first frame.
    pub initial_width: u32,
    pub initial_height: u32,
    pub tick: Duration,
    pub control_interval: Duration,
    pub stats_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            server_control_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_CONTROL_PORT)),
            video_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_VIDEO_PORT)),
            recv_buffer: Some(net::DEFAULT_RECV_BUFFER),
            max_chunk_payload: MAX_CHUNK_PAYLOAD,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            initial_width: DEFAULT_WIDTH,
            initial_height: DEFAULT_HEIGHT,
            tick: Duration::from_millis(1),
            control_interval: DEFAULT_CONTROL_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

// ── Receiver ─────────────────────────────────────────────────────

pub struct Receiver {
    config: ReceiverConfig,
    video_socket: UdpSocket,
    control_socket: UdpSocket,
    reassembler: Reassembler,
    display: DisplayBuffer,
    sink: Box<dyn DisplaySink>,
    input: Box<dyn InputProvider>,
    emitter: ControlEmitter,
    stats: ReceiverStats,
    recv_buf: Vec<u8>,
    needs_present: bool,
    running: Arc<AtomicBool>,
}

impl Receiver {
    /// Bind the video port and an ephemeral control socket.
    pub fn bind(
        config: ReceiverConfig,
        sink: Box<dyn DisplaySink>,
        input: Box<dyn InputProvider>,
    ) -> Result<Self, FramecastError> {
        let video_socket = net::bind_udp(config.video_addr, config.recv_buffer)?;
        let control_socket = net::bind_ephemeral_for(config.server_control_addr)?;
        Self::from_sockets(config, video_socket, control_socket, sink, input)
    }

    /// Build a receiver around already bound sockets.
    pub fn from_sockets(
        config: ReceiverConfig,
        video_socket: UdpSocket,
        control_socket: UdpSocket,
        sink: Box<dyn DisplaySink>,
        input: Box<dyn InputProvider>,
    ) -> Result<Self, FramecastError> {
        let reassembler = Reassembler::new(config.max_chunk_payload, config.max_frame_bytes);
        let recv_buf = vec![0; reassembler.codec().recv_buffer_len()];
        let display = DisplayBuffer::new(config.initial_width, config.initial_height)?;

        Ok(Self {
            reassembler,
            display,
            sink,
            input,
            emitter: ControlEmitter::new(config.control_interval),
            stats: ReceiverStats::new(config.stats_interval),
            recv_buf,
            needs_present: false,
            running: Arc::new(AtomicBool::new(true)),
            config,
            video_socket,
            control_socket,
        })
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn local_video_addr(&self) -> Result<SocketAddr, FramecastError> {
        Ok(self.video_socket.local_addr()?)
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    pub fn counters(&self) -> ReceiverCounters {
        self.stats.counters()
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped.
    pub async fn run(&mut self) -> Result<(), FramecastError> {
        info!(
            "receiver up: video on {}, control to {}",
            self.local_video_addr()?,
            self.config.server_control_addr
        );

        let mut tick = tokio::time::interval(self.config.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.is_running() {
            tick.tick().await;
            self.drain_video();
            self.render();
            self.emit_control().await?;
            self.stats.maybe_report();
        }

        info!("receiver stopped");
        Ok(())
    }

    /// Read every queued video datagram without blocking.
    ///
    /// Returns how many datagrams were read.
    pub fn drain_video(&mut self) -> usize {
        let mut read = 0;
        loop {
            let n = match self.video_socket.try_recv_from(&mut self.recv_buf) {
                Ok((n, _)) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("video socket: {e}");
                    break;
                }
            };
            read += 1;
            self.stats.record_datagram(n);

            match self.reassembler.accept_datagram(&self.recv_buf[..n]) {
                ChunkOutcome::Accepted { .. } => self.stats.record_accepted(),
                ChunkOutcome::Completed { frame_id } => {
                    self.stats.record_accepted();
                    self.stats
                        .record_completed(frame_id, self.reassembler.frame().total_chunks());
                    self.swap();
                }
                ChunkOutcome::Duplicate { .. } => self.stats.record_duplicate(),
                ChunkOutcome::Rejected(e) => {
                    trace!("rejected datagram ({n} bytes): {e}");
                    self.stats.record_rejected();
                }
            }
        }
        self.stats.set_abandoned(self.reassembler.frames_abandoned());
        read
    }

    fn swap(&mut self) {
        match self.display.present_from(self.reassembler.frame()) {
            Ok(()) => {
                self.stats.record_displayed();
                self.needs_present = true;
            }
            Err(e) => warn!("display swap failed: {e}"),
        }
    }

    /// Hand the display buffer to the sink if a new frame landed.
    pub fn render(&mut self) {
        if !self.needs_present {
            return;
        }
        self.needs_present = false;
        if let Err(e) = self.sink.present(&self.display) {
            warn!("display sink rejected frame {}: {e}", self.display.frame_id());
        }
    }

    /// Send a control sample if one is due.
    pub async fn emit_control(&mut self) -> Result<bool, FramecastError> {
        self.emitter
            .emit(
                &mut self.control_socket,
                self.config.server_control_addr,
                &mut *self.input,
            )
            .await
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::control::{InputSnapshot, KeyboardState};
    use crate::net::bind_udp;
    use crate::wire::{ChunkHeader, ControlSample};

    #[derive(Clone, Default)]
    struct Shown(Arc<Mutex<Vec<u32>>>);

    impl DisplaySink for Shown {
        fn present(&mut self, frame: &DisplayBuffer) -> Result<(), FramecastError> {
            self.0
                .lock()
                .map_err(|_| FramecastError::Display("poisoned".into()))?
                .push(frame.frame_id());
            Ok(())
        }
    }

    struct Idle;

    impl InputProvider for Idle {
        fn poll(&mut self) -> InputSnapshot {
            InputSnapshot::Keyboard(KeyboardState::default())
        }
    }

    fn loopback() -> UdpSocket {
        bind_udp("127.0.0.1:0".parse().unwrap(), None).unwrap()
    }

    fn receiver(server: SocketAddr, shown: Shown) -> Receiver {
        let config = ReceiverConfig {
            server_control_addr: server,
            initial_width: 2,
            initial_height: 2,
            ..ReceiverConfig::default()
        };
        Receiver::from_sockets(config, loopback(), loopback(), Box::new(shown), Box::new(Idle))
            .unwrap()
    }

    fn chunk(frame_id: u32, index: u32, fill: u8) -> Vec<u8> {
        let header = ChunkHeader {
            frame_id,
            chunk_index: index,
            total_chunks: 2,
            width: 2,
            height: 2,
            chunk_size: 6,
            chunk_offset: index * 6,
        };
        let mut dgram = header.to_bytes().to_vec();
        dgram.extend_from_slice(&[fill; 6]);
        dgram
    }

    #[tokio::test]
    async fn drains_reassembles_and_presents() {
        let server = loopback();
        let shown = Shown::default();
        let mut r = receiver(server.local_addr().unwrap(), shown.clone());
        let video = r.local_video_addr().unwrap();

        for dgram in [chunk(1, 1, 7), chunk(1, 1, 7), vec![1, 2, 3], chunk(1, 0, 7)] {
            server.send_to(&dgram, video).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(r.drain_video(), 4);
        r.render();
        r.render();

        let c = r.counters();
        assert_eq!(c.chunks_accepted, 2);
        assert_eq!(c.duplicates, 1);
        assert_eq!(c.rejected, 1);
        assert_eq!(c.frames_completed, 1);
        assert_eq!(c.frames_displayed, 1);
        assert_eq!(r.display().pixel_data(), &[7u8; 12][..]);
        assert_eq!(*shown.0.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn first_control_sample_goes_out_immediately() {
        let server = loopback();
        let mut r = receiver(server.local_addr().unwrap(), Shown::default());

        assert!(r.emit_control().await.unwrap());
        assert!(!r.emit_control().await.unwrap());

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(1), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ControlSample::decode(&buf[..n]).unwrap(), ControlSample::default());
    }
}
