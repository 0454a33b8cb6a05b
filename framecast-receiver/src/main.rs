//! framecast receiver — entry point.
//!
//! ```text
//! framecast-receiver                   Receive from 127.0.0.1 with defaults
//! framecast-receiver --server <ip>     Sender address (overrides config)
//! framecast-receiver --config <path>   Use custom config TOML
//! framecast-receiver --gen-config      Dump default config and exit
//! ```

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framecast_core::Receiver;
use framecast_receiver::config::{LoggingConfig, ReceiverSettings};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-receiver", about = "Receive and display raw frames over UDP")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-receiver.toml")]
    config: PathBuf,

    /// Sender IP address (overrides config). Example: 192.168.1.100
    #[arg(short, long)]
    server: Option<String>,

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
        let text = toml::to_string_pretty(&ReceiverSettings::default())?;
        println!("{text}");
        return Ok(());
    }

    let (mut config, load_error) = match ReceiverSettings::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (ReceiverSettings::default(), Some(e)),
    };
    if let Some(addr) = cli.server {
        config.network.server_address = addr;
    }

    init_tracing(&config.logging)?;
    match load_error {
        None => info!("config: {}", cli.config.display()),
        Some(e) if e.kind() == ErrorKind::NotFound => {
            info!("no config at {}; using defaults", cli.config.display())
        }
        Some(e) => warn!("invalid config {}: {e}; using defaults", cli.config.display()),
    }

    info!("framecast-receiver v{}", env!("CARGO_PKG_VERSION"));
    info!("input: {:?}", config.control.input);

    let display = config.headless_display();
    let input = config.control.input.provider(config.sweep_period());
    let mut receiver = Receiver::bind(config.to_receiver_config()?, Box::new(display), input)?;
    let stop = receiver.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    receiver.run().await?;

    Ok(())
}
