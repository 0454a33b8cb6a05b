//! framecast sender — entry point.
//!
//! ```text
//! framecast-sender                   Stream with defaults (test pattern)
//! framecast-sender --config <path>   Load a custom config TOML
//! framecast-sender --source <file>   Stream a raw RGB24 file instead
//! framecast-sender --gen-config      Write default config to stdout
//! ```

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast_core::Sender;
use framecast_sender::config::{LoggingConfig, SenderSettings, SourceKind};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-sender", about = "Stream raw frames over UDP")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-sender.toml")]
    config: PathBuf,

    /// File of packed RGB24 frames to stream (overrides config).
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderSettings::default())?;
        println!("{text}");
        return Ok(());
    }

    let (mut config, load_error) = match SenderSettings::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (SenderSettings::default(), Some(e)),
    };
    if let Some(path) = cli.source {
        config.source.kind = SourceKind::RawFile;
        config.source.path = path;
    }

    init_tracing(&config.logging)?;
    match load_error {
        None => info!("config: {}", cli.config.display()),
        Some(e) if e.kind() == ErrorKind::NotFound => {
            info!("no config at {}; using defaults", cli.config.display())
        }
        Some(e) => warn!("invalid config {}: {e}; using defaults", cli.config.display()),
    }

    info!("framecast-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("source: {:?} {}", config.source.kind, config.source.path.display());

    let source = config.open_source()?;
    let mut sender = Sender::bind(config.to_sender_config()?, source)?;
    let stop = sender.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    sender.run().await?;

    Ok(())
}
