//! Configuration for the sender.

use std::io::ErrorKind;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::error::FramecastError;
use framecast_core::fragment::FragmenterConfig;
use framecast_core::pacer::MAX_FPS;
use framecast_core::sender::SenderConfig;
use framecast_core::source::{FrameSource, RawVideoFile, TestPattern};
use framecast_core::wire::{ChunkHeader, DEFAULT_CONTROL_PORT, DEFAULT_VIDEO_PORT};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderSettings {
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub source: SourceConfig,
    pub stats: StatsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address to bind the control socket on.
    pub bind_address: String,
    /// UDP port receivers send control samples to.
    pub control_port: u16,
    /// UDP port receivers listen on for video.
    pub video_port: u16,
    /// Largest datagram to emit, header included.
    pub max_datagram_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Pause after every `burst_len`-th chunk (0 disables pausing).
    pub burst_len: usize,
    pub burst_pause_us: u64,
    /// Sleep between association checks while no receiver is known.
    pub idle_delay_ms: u64,
    /// Re-send the newest frame when the source has nothing new.
    pub repeat_last_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Animated gradient.
    Pattern,
    /// Consecutive packed RGB24 frames read from `path`, looping.
    RawFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            control_port: DEFAULT_CONTROL_PORT,
            video_port: DEFAULT_VIDEO_PORT,
            max_datagram_size: framecast_core::wire::MAX_DATAGRAM_SIZE,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            width: framecast_core::wire::DEFAULT_WIDTH,
            height: framecast_core::wire::DEFAULT_HEIGHT,
            burst_len: 10,
            burst_pause_us: 1000,
            idle_delay_ms: 100,
            repeat_last_frame: true,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Pattern,
            path: PathBuf::new(),
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

impl SenderSettings {
    /// Read and parse a TOML file.
    ///
    /// A missing file surfaces as [`ErrorKind::NotFound`], a file that does
    /// not parse as [`ErrorKind::InvalidData`]. Callers fall back to
    /// defaults and log the cause once logging is up.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
    }

    /// Convert into the library's [`SenderConfig`], clamping values.
    pub fn to_sender_config(&self) -> Result<SenderConfig, AddrParseError> {
        let ip: IpAddr = self.network.bind_address.parse()?;
        let mut fragmenter = FragmenterConfig::for_datagram_size(
            self.network.max_datagram_size.max(ChunkHeader::SIZE + 1),
        );
        fragmenter.burst_len = self.stream.burst_len;
        fragmenter.burst_pause = Duration::from_micros(self.stream.burst_pause_us);

        Ok(SenderConfig {
            control_addr: SocketAddr::new(ip, self.network.control_port),
            video_port: self.network.video_port,
            target_fps: self.stream.fps.clamp(1, MAX_FPS),
            fragmenter,
            idle_delay: Duration::from_millis(self.stream.idle_delay_ms.max(1)),
            repeat_last_frame: self.stream.repeat_last_frame,
            stats_interval: Duration::from_millis(self.stats.interval_ms.max(100)),
        })
    }

    /// Open the configured frame source at the configured resolution.
    pub fn open_source(&self) -> Result<Box<dyn FrameSource>, FramecastError> {
        let (width, height) = (self.stream.width, self.stream.height);
        Ok(match self.source.kind {
            SourceKind::Pattern => Box::new(TestPattern::new(width, height)?),
            SourceKind::RawFile => Box::new(RawVideoFile::open(&self.source.path, width, height)?),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&SenderSettings::default()).unwrap();
        assert!(text.contains("control_port"));
        assert!(text.contains("kind = \"pattern\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&SenderSettings::default()).unwrap();
        let parsed: SenderSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.video_port, 5555);
        assert_eq!(parsed.network.control_port, 5556);
        assert_eq!(parsed.stream.fps, 30);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: SenderSettings = toml::from_str(
            "[source]\nkind = \"raw-file\"\npath = \"clip.rgb\"\n[stream]\nfps = 60\n",
        )
        .unwrap();
        assert_eq!(parsed.source.kind, SourceKind::RawFile);
        assert_eq!(parsed.stream.fps, 60);
        assert_eq!(parsed.stream.width, 640);
    }

    #[test]
    fn to_sender_config_clamps() {
        let mut cfg = SenderSettings::default();
        cfg.stream.fps = 10_000;
        cfg.network.max_datagram_size = 9000;
        let svc = cfg.to_sender_config().unwrap();
        assert_eq!(svc.target_fps, MAX_FPS);
        assert_eq!(svc.fragmenter.payload_cap, framecast_core::wire::MAX_CHUNK_PAYLOAD);
        assert_eq!(svc.control_addr, "0.0.0.0:5556".parse().unwrap());
    }

    #[test]
    fn default_payload_fits_datagram() {
        let svc = SenderSettings::default().to_sender_config().unwrap();
        assert_eq!(svc.fragmenter.payload_cap, 1371);
        assert_eq!(svc.fragmenter.burst_pause, Duration::from_millis(1));
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut cfg = SenderSettings::default();
        cfg.network.bind_address = "not-an-ip".into();
        assert!(cfg.to_sender_config().is_err());
    }

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("framecast-sender-{tag}-{}.toml", std::process::id()))
    }

    #[test]
    fn load_reads_written_defaults() {
        let path = temp_path("ok");
        std::fs::write(&path, toml::to_string_pretty(&SenderSettings::default()).unwrap()).unwrap();
        let loaded = SenderSettings::load(&path).unwrap();
        assert_eq!(loaded.stream.idle_delay_ms, 100);
        assert!(loaded.stream.repeat_last_frame);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_file_is_invalid_data() {
        let path = temp_path("bad");
        std::fs::write(&path, "stream = 12").unwrap();
        let err = SenderSettings::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = SenderSettings::load(&temp_path("absent")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn missing_raw_file_fails_to_open() {
        let mut cfg = SenderSettings::default();
        cfg.source.kind = SourceKind::RawFile;
        cfg.source.path = PathBuf::from("/nonexistent/framecast.rgb");
        assert!(cfg.open_source().is_err());
    }
}
