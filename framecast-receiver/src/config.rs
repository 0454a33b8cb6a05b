//! Receiver configuration.

use std::io::ErrorKind;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::net::DEFAULT_RECV_BUFFER;
use framecast_core::reassembly::DEFAULT_MAX_FRAME_BYTES;
use framecast_core::receiver::ReceiverConfig;
use framecast_core::wire::{
    DEFAULT_CONTROL_PORT, DEFAULT_HEIGHT, DEFAULT_VIDEO_PORT, DEFAULT_WIDTH, MAX_CHUNK_PAYLOAD,
};

use crate::display::HeadlessDisplay;
use crate::input::InputMode;

/// Top-level configuration for the receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverSettings {
    pub network: NetworkConfig,
    pub display: DisplayConfig,
    pub control: ControlConfig,
    pub stats: StatsConfig,
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IP address of the sender.
    pub server_address: String,
    /// The sender's control port.
    pub control_port: u16,
    /// Local address to bind the video socket on.
    pub bind_address: String,
    pub video_port: u16,
    /// Largest chunk payload accepted.
    pub max_chunk_payload: usize,
    /// Kernel receive buffer for the video socket (0 = OS default).
    pub recv_buffer_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Resolution shown (black) until the first frame arrives.
    pub width: u32,
    pub height: u32,
    /// Receive loop tick in milliseconds.
    pub tick_ms: u64,
    /// Largest frame raster accepted, in bytes.
    pub max_frame_bytes: usize,
    /// Write a PPM snapshot of the displayed frame here (empty disables).
    pub snapshot_path: String,
    /// Snapshot every N presented frames.
    pub snapshot_every: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub interval_ms: u64,
    pub input: InputMode,
    /// Period of the `sweep` input, in milliseconds.
    pub sweep_period_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub interval_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Optional log file.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".into(),
            control_port: DEFAULT_CONTROL_PORT,
            bind_address: "0.0.0.0".into(),
            video_port: DEFAULT_VIDEO_PORT,
            max_chunk_payload: MAX_CHUNK_PAYLOAD,
            recv_buffer_bytes: DEFAULT_RECV_BUFFER,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            tick_ms: 1,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            snapshot_path: String::new(),
            snapshot_every: 30,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            interval_ms: 20,
            input: InputMode::Idle,
            sweep_period_ms: 4000,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ReceiverSettings {
    /// Read and parse a TOML file.
    ///
    /// A missing file surfaces as [`ErrorKind::NotFound`], a file that does
    /// not parse as [`ErrorKind::InvalidData`]. Callers fall back to
    /// defaults and log the cause once logging is up.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
    }

    /// Convert into the library's [`ReceiverConfig`], clamping values.
    pub fn to_receiver_config(&self) -> Result<ReceiverConfig, AddrParseError> {
        let server: IpAddr = self.network.server_address.parse()?;
        let bind: IpAddr = self.network.bind_address.parse()?;
        let recv_buffer = match self.network.recv_buffer_bytes {
            0 => None,
            n => Some(n),
        };

        Ok(ReceiverConfig {
            server_control_addr: SocketAddr::new(server, self.network.control_port),
            video_addr: SocketAddr::new(bind, self.network.video_port),
            recv_buffer,
            max_chunk_payload: self.network.max_chunk_payload.clamp(1, u16::MAX as usize),
            max_frame_bytes: self.display.max_frame_bytes.max(1),
            initial_width: self.display.width.max(1),
            initial_height: self.display.height.max(1),
            tick: Duration::from_millis(self.display.tick_ms.clamp(1, 100)),
            control_interval: Duration::from_millis(self.control.interval_ms.max(1)),
            stats_interval: Duration::from_millis(self.stats.interval_ms.max(100)),
        })
    }

    pub fn headless_display(&self) -> HeadlessDisplay {
        let snapshot = match self.display.snapshot_path.as_str() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };
        HeadlessDisplay::new(snapshot, self.display.snapshot_every)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.control.sweep_period_ms.max(1))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ReceiverSettings::default()).unwrap();
        assert!(text.contains("server_address"));
        assert!(text.contains("input = \"idle\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ReceiverSettings::default()).unwrap();
        let parsed: ReceiverSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.video_port, 5555);
        assert_eq!(parsed.control.interval_ms, 20);
        assert_eq!(parsed.display.max_frame_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn to_receiver_config_defaults() {
        let cfg = ReceiverSettings::default().to_receiver_config().unwrap();
        assert_eq!(cfg.server_control_addr, "127.0.0.1:5556".parse().unwrap());
        assert_eq!(cfg.video_addr, "0.0.0.0:5555".parse().unwrap());
        assert_eq!(cfg.tick, Duration::from_millis(1));
        assert_eq!(cfg.control_interval, Duration::from_millis(20));
        assert_eq!(cfg.max_chunk_payload, 1400);
    }

    #[test]
    fn to_receiver_config_clamps() {
        let mut settings = ReceiverSettings::default();
        settings.display.tick_ms = 0;
        settings.network.recv_buffer_bytes = 0;
        settings.display.width = 0;
        let cfg = settings.to_receiver_config().unwrap();
        assert_eq!(cfg.tick, Duration::from_millis(1));
        assert_eq!(cfg.recv_buffer, None);
        assert_eq!(cfg.initial_width, 1);
    }

    #[test]
    fn bad_server_address_is_reported() {
        let mut settings = ReceiverSettings::default();
        settings.network.server_address = "sender.local:5556".into();
        assert!(settings.to_receiver_config().is_err());
    }

    #[test]
    fn load_reports_why_defaults_are_used() {
        let path = std::env::temp_dir().join(format!("framecast-receiver-{}.toml", std::process::id()));
        assert_eq!(ReceiverSettings::load(&path).unwrap_err().kind(), ErrorKind::NotFound);

        std::fs::write(&path, "[display]\nwidth = \"wide\"\n").unwrap();
        assert_eq!(ReceiverSettings::load(&path).unwrap_err().kind(), ErrorKind::InvalidData);

        std::fs::write(&path, "[display]\nwidth = 320\n").unwrap();
        let loaded = ReceiverSettings::load(&path).unwrap();
        assert_eq!(loaded.display.width, 320);
        assert_eq!(loaded.display.height, 480);
        std::fs::remove_file(&path).ok();
    }
}
