//! Receiver-side control emitter.
//!
//! Local input is polled at a fixed rate and the resulting sample is sent
//! to the sender's control port. A joystick wins over the keyboard when
//! present. Missed intervals are not made up: at most one sample leaves
//! per poll, however late the poll is.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::codec::DatagramCodec;
use crate::error::FramecastError;
use crate::fragment::DatagramSink;
use crate::wire::ControlSample;

/// Default emission interval (50 Hz).
pub const DEFAULT_CONTROL_INTERVAL: Duration = Duration::from_millis(20);

// ── Input snapshots ──────────────────────────────────────────────

/// Raw joystick readings, in device order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoystickState {
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
}

/// Keyboard fallback: WASD for the axes, four action keys for buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardState {
    /// W
    pub up: bool,
    /// S
    pub down: bool,
    /// A
    pub left: bool,
    /// D
    pub right: bool,
    /// Space, Left Shift, E, Q.
    pub buttons: [bool; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputSnapshot {
    Joystick(JoystickState),
    Keyboard(KeyboardState),
}

/// Polls local input devices.
pub trait InputProvider: Send {
    fn poll(&mut self) -> InputSnapshot;
}

fn sanitize(axis: f32) -> f32 {
    if axis.is_finite() {
        axis.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

// ── ControlEmitter ───────────────────────────────────────────────

pub struct ControlEmitter {
    interval: Duration,
    last_sent: Option<Instant>,
    sample: ControlSample,
    codec: DatagramCodec,
    buffer: BytesMut,
    samples_sent: u64,
}

impl ControlEmitter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            sample: ControlSample::default(),
            codec: DatagramCodec::new(),
            buffer: BytesMut::with_capacity(ControlSample::SIZE),
            samples_sent: 0,
        }
    }

    pub fn samples_sent(&self) -> u64 {
        self.samples_sent
    }

    /// Whether a sample is owed at `now`. The very first one always is.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Fold one input snapshot into the persistent sample.
    ///
    /// A joystick with fewer than two axes keeps the previous axes, and
    /// only the buttons it reports are overwritten. The keyboard resets
    /// the axes and overwrites buttons 0..4, leaving the rest alone.
    pub fn apply(&mut self, snapshot: &InputSnapshot) -> ControlSample {
        match snapshot {
            InputSnapshot::Joystick(js) => {
                if let [x, y, ..] = js.axes.as_slice() {
                    self.sample.x_axis = sanitize(*x);
                    self.sample.y_axis = sanitize(*y);
                }
                for (slot, &pressed) in self.sample.buttons.iter_mut().zip(&js.buttons) {
                    *slot = pressed;
                }
            }
            InputSnapshot::Keyboard(kb) => {
                let mut x = 0.0f32;
                let mut y = 0.0f32;
                if kb.up {
                    y -= 1.0;
                }
                if kb.down {
                    y += 1.0;
                }
                if kb.left {
                    x -= 1.0;
                }
                if kb.right {
                    x += 1.0;
                }
                self.sample.x_axis = x;
                self.sample.y_axis = y;
                self.sample.buttons[..kb.buttons.len()].copy_from_slice(&kb.buttons);
            }
        }
        self.sample
    }

    /// Poll `input` and update the sample if one is due at `now`.
    pub fn poll<P: InputProvider + ?Sized>(
        &mut self,
        now: Instant,
        input: &mut P,
    ) -> Option<ControlSample> {
        if !self.is_due(now) {
            return None;
        }
        self.last_sent = Some(now);
        let snapshot = input.poll();
        Some(self.apply(&snapshot))
    }

    /// Poll and, if due, send one sample to `target`.
    ///
    /// Returns whether a sample was put on the wire. A failed send is
    /// logged and not retried; the next interval sends a fresh sample.
    pub async fn emit<S, P>(
        &mut self,
        sink: &mut S,
        target: SocketAddr,
        input: &mut P,
    ) -> Result<bool, FramecastError>
    where
        S: DatagramSink + ?Sized,
        P: InputProvider + ?Sized,
    {
        let Some(sample) = self.poll(Instant::now(), input) else {
            return Ok(false);
        };

        self.buffer.clear();
        self.codec.encode(sample, &mut self.buffer)?;
        match sink.send_datagram(&self.buffer, target).await {
            Ok(_) => {
                self.samples_sent += 1;
                trace!(
                    "control -> {target}: x={:.2} y={:.2} buttons={}",
                    sample.x_axis,
                    sample.y_axis,
                    sample.buttons_display()
                );
                Ok(true)
            }
            Err(e) => {
                debug!("control send to {target} failed: {e}");
                Ok(false)
            }
        }
    }
}

impl Default for ControlEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_INTERVAL)
    }
}

// ── Tests ────────────────────────────────────────────────────────
