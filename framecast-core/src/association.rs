//! Sender-side association with the single receiver.
//!
//! There is no handshake. The first valid control datagram binds the
//! sender to its source address, with the well-known video port put in
//! place of the source port. Later control datagrams re-target the
//! association (a reconnecting client, a new ephemeral port). The
//! association is never torn down.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::wire::ControlSample;

pub struct AssociationTracker {
    video_port: u16,
    destination: Option<SocketAddr>,
    connected_since: Option<Instant>,
    last_control: ControlSample,
}

impl AssociationTracker {
    pub fn new(video_port: u16) -> Self {
        Self {
            video_port,
            destination: None,
            connected_since: None,
            last_control: ControlSample::default(),
        }
    }

    /// Record a valid control sample from `source`.
    ///
    /// Returns `true` when this sample established the association.
    pub fn observe(&mut self, source: SocketAddr, sample: ControlSample) -> bool {
        let destination = SocketAddr::new(source.ip(), self.video_port);
        let first = self.connected_since.is_none();

        if first {
            info!("receiver associated from {source}; streaming video to {destination}");
            self.connected_since = Some(Instant::now());
        } else if self.destination != Some(destination) {
            info!("receiver moved to {source}; streaming video to {destination}");
        }

        debug!(
            "control: x={:.2} y={:.2} buttons={}",
            sample.x_axis,
            sample.y_axis,
            sample.buttons_display()
        );

        self.destination = Some(destination);
        self.last_control = sample;
        first
    }

    pub fn is_connected(&self) -> bool {
        self.connected_since.is_some()
    }

    /// Where video chunks go, once associated.
    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }

    /// Time since the association was first established.
    pub fn connected_duration(&self) -> Option<Duration> {
        self.connected_since.map(|since| since.elapsed())
    }

    /// The most recent control sample (neutral before the first one).
    pub fn last_control(&self) -> ControlSample {
        self.last_control
    }
}
