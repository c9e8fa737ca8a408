//! NWM Velocity Snapshot - Batch Job
//!
//! Run once per schedule tick (cron, ECS scheduled task, ...). Each run:
//! 1. Finds the newest published NWM analysis cycle on the NOAA archive
//! 2. Downloads its channel_rt file and decodes velocity + streamflow
//! 3. Classifies every reach into velocity and flow bands
//! 4. Publishes one JSON snapshot to S3, or to a local file with --dry-run
//!
//! Usage:
//!   nwm_velocity_service --dry-run                         # write ./current_velocity.json
//!   nwm_velocity_service                                   # publish to S3
//!   nwm_velocity_service --reference-time 2024-05-01T12:00:00Z --dry-run
//!
//! Environment:
//!   S3_BUCKET_NAME, AWS_REGION, AWS_PROFILE, OUTPUT_KEY_PREFIX,
//!   NWM_LOOKBACK_HOURS, NWM_DOMAIN, MIN_STREAMFLOW_CMS, RUST_LOG

use std::error::Error;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

use nwm_velocity_service::config;
use nwm_velocity_service::ingest::archive::NwmArchive;
use nwm_velocity_service::ingest::channel_rt::NetcdfDecoder;
use nwm_velocity_service::job::Job;
use nwm_velocity_service::logging;
use nwm_velocity_service::publish::{self, PublishOutcome, RunMode};

#[derive(Parser)]
#[command(name = "nwm_velocity_service")]
#[command(about = "Publish a classified NWM channel velocity snapshot")]
struct Cli {
    /// Write the snapshot to a local file instead of uploading it
    #[arg(long)]
    dry_run: bool,

    /// Cycle to aim for (RFC 3339); defaults to now
    #[arg(long)]
    reference_time: Option<DateTime<Utc>>,

    /// Config file (defaults to ./nwm_velocity.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dry-run output file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    dotenv::dotenv().ok();
    logging::init_logger();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = config::load_config(cli.config.as_deref())?;

    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Publish
    };

    if let Some(path) = cli.output {
        if mode == RunMode::DryRun {
            config.output.local_path = path;
        } else {
            log::warn!("--output only applies with --dry-run; ignoring {}", path.display());
        }
    }

    log::info!("NWM velocity snapshot ({:?})", mode);

    let archive = NwmArchive::new(&config.archive)?;
    let sink = publish::open_sink(mode, &config.output)?;
    let job = Job::new(config);

    let report = job.run(&archive, &NetcdfDecoder, sink.as_ref(), cli.reference_time, Utc::now())?;

    match &report.outcome {
        PublishOutcome::Published { location, .. } => log::info!(
            "Done: {} sites for cycle {} at {}",
            report.site_count,
            report.reference_time().to_rfc3339(),
            location
        ),
        PublishOutcome::SkippedNewerExists { published, .. } => log::info!(
            "Done: cycle {} left in place (live snapshot is {})",
            report.reference_time().to_rfc3339(),
            published.to_rfc3339()
        ),
    }

    Ok(())
}
