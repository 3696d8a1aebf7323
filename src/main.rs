//! NMEA Fix CLI - stream fix summaries from a serial GPS receiver.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use nmea_fix::{
    ByteSource, Config, Decoder, DecoderStats, FixRecord, Frame, FrameReader, ReaderSource,
    Shutdown, metrics::start_metrics_server, open_serial,
};
use std::fs::File;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// NMEA Fix - decode NMEA-0183 sentences from a GPS receiver into fixes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial device path (or a capture file with --replay, "-" for stdin)
    device: Option<String>,

    /// Serial baud rate
    #[arg(short, long, env = "NMEA_BAUD")]
    baud: Option<u32>,

    /// Per-read transport timeout in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Read a recorded capture instead of a serial device
    #[arg(long)]
    replay: bool,

    /// Print each fix as JSON
    #[arg(long)]
    json: bool,

    /// Print statistics every N seconds (0 = never)
    #[arg(short, long)]
    stats_interval: Option<u64>,

    /// Serve metrics over HTTP
    #[arg(long)]
    metrics: bool,

    /// Port for the metrics endpoint
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Maximum runtime in seconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_runtime: u64,
}

impl Args {
    /// Overlay command-line values on the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(timeout) = self.read_timeout_ms {
            config.read_timeout_ms = timeout;
        }
        if let Some(interval) = self.stats_interval {
            config.stats_interval = interval;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        config.json |= self.json;
        config.metrics_enabled |= self.metrics;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let Some(device) = config.device.clone() else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    info!("NMEA Fix starting...");
    info!("Device: {}", device);

    let source = open_source(&device, &config, args.replay)?;

    let stats = Arc::new(DecoderStats::new());
    let (fix_tx, fix_rx) = watch::channel(FixRecord::new());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx_clone.send(true);
    });

    // Optional max runtime
    if args.max_runtime > 0 {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(args.max_runtime)).await;
            info!("Max runtime reached");
            let _ = shutdown_tx_clone.send(true);
        });
    }

    if config.metrics_enabled {
        let stats_clone = Arc::clone(&stats);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, stats_clone, fix_rx).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let stats_interval = config.stats_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                eprintln!("\n{}", stats_clone.summary());
            }
        });
    }

    let decoder_stats = Arc::clone(&stats);
    tokio::task::spawn_blocking(move || {
        run_decoder(source, &config, decoder_stats, fix_tx, shutdown_rx)
    })
    .await
    .context("Decoder task panicked")??;

    // Print final statistics
    eprintln!("\n\nFINAL STATISTICS");
    eprintln!("{}", stats.summary());

    Ok(())
}

/// Open the serial device, or a capture file when replaying.
fn open_source(device: &str, config: &Config, replay: bool) -> Result<Box<dyn ByteSource + Send>> {
    if !replay {
        let port = open_serial(device, config.baud_rate, config.read_timeout())
            .with_context(|| format!("Failed to open serial device {}", device))?;
        return Ok(Box::new(port));
    }

    if device == "-" {
        return Ok(Box::new(ReaderSource::new(io::stdin())));
    }

    let file =
        File::open(device).with_context(|| format!("Failed to open capture file {}", device))?;
    Ok(Box::new(ReaderSource::new(file)))
}

/// Decode until cancelled or the source disconnects, printing every frame.
fn run_decoder(
    source: Box<dyn ByteSource + Send>,
    config: &Config,
    stats: Arc<DecoderStats>,
    publisher: watch::Sender<FixRecord>,
    shutdown: Shutdown,
) -> Result<()> {
    let reader = FrameReader::with_stats(source, stats).with_max_line_len(config.max_line_len);
    let mut decoder = Decoder::from_reader(reader)
        .with_policy(config.policy())
        .with_publisher(publisher);

    for frame in decoder.frames(shutdown) {
        render(&frame, config.json)?;
    }

    decoder.close();
    Ok(())
}

/// Print one frame. Errors take a single line and the loop carries on.
fn render(frame: &Frame, json: bool) -> Result<()> {
    match frame {
        Frame::Fix(fix) if json => println!("{}", serde_json::to_string(fix)?),
        Frame::Fix(fix) => println!("{}", fix),
        Frame::Error(e) => {
            warn!("Acquisition failed: {}", e);
            println!("error: {}", e);
        }
    }
    Ok(())
}
