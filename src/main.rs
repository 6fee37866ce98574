use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zonetrack_rs::config::Config;
use zonetrack_rs::integration::{FramePipeline, publish_signals};
use zonetrack_rs::inventory::{
    ConfirmationStatus, InventoryObjectKind, JsonFileStore, ScanSignal, ServiceContext,
};
use zonetrack_rs::tracker::Detection;

#[derive(Parser)]
#[command(
    name = "zonetrack",
    about = "Zone tracking and inventory reconciliation",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, global = true, env = "ZONETRACK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run recorded detections through the tracking pipeline
    Replay {
        /// JSON lines file, one array of detections per frame
        frames: PathBuf,

        /// Feed the produced vision signals into the inventory service
        #[arg(long)]
        submit: bool,
    },

    /// Commit a scan against the persisted inventory
    Scan {
        /// Scanned object id
        id: String,

        #[arg(long, default_value = "filament_spool")]
        kind: InventoryObjectKind,

        /// Zone the object was scanned in
        #[arg(long)]
        zone: Option<String>,

        /// Printer the spool was scanned onto
        #[arg(long)]
        printer: Option<String>,
    },

    /// Print the persisted inventory as JSON
    Show,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zonetrack=info,zonetrack_rs=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay { frames, submit } => replay(&config, &frames, submit),
        Commands::Scan {
            id,
            kind,
            zone,
            printer,
        } => {
            let service = open_service(&config)?;
            let mut signal = ScanSignal::new(id, kind);
            if let Some(zone) = zone {
                signal = signal.at_zone(zone);
            }
            if let Some(printer) = printer {
                signal = signal.on_printer(printer);
            }
            let ack = service.submit_scan(&signal)?;
            println!("{}", serde_json::to_string_pretty(&ack)?);
            Ok(())
        }
        Commands::Show => {
            let service = open_service(&config)?;
            println!("{}", serde_json::to_string_pretty(&service.snapshot())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            Ok(config)
        }
    }
}

fn open_service(config: &Config) -> Result<ServiceContext> {
    let blobs = JsonFileStore::new(&config.storage.path);
    ServiceContext::open(config, Box::new(blobs))
        .with_context(|| format!("failed to open inventory at {}", config.storage.path.display()))
}

fn replay(config: &Config, frames: &Path, submit: bool) -> Result<()> {
    let file =
        File::open(frames).with_context(|| format!("failed to open {}", frames.display()))?;
    let mut pipeline = FramePipeline::from_config(config);
    let mut service = if submit {
        Some(open_service(config)?)
    } else {
        None
    };

    let mut processed = 0usize;
    let mut published = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let detections: Vec<Detection> = match serde_json::from_str(&line) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed frame");
                continue;
            }
        };

        let Some(report) = pipeline.process_detections(detections, None) else {
            continue;
        };
        processed += 1;
        if report.events.is_empty() && report.signals.is_empty() {
            continue;
        }
        println!(
            "{}",
            json!({
                "frame": report.frame_index,
                "events": report.events,
                "changes": report.changes,
                "signals": report.signals,
            })
        );
        if let Some(service) = service.as_mut() {
            published += publish_signals(&report.signals, service);
        }
    }
    info!(processed, published, "replay finished");

    if let Some(service) = service {
        let pending = service.list_pending(Some(ConfirmationStatus::Pending));
        println!("{}", serde_json::to_string_pretty(&pending)?);
    }
    Ok(())
}
