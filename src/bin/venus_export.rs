use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use venus_export::channel::{channels_in, ChannelGroup};
use venus_export::{
    ExportConfig, ExportRequest, ExportService, Exporter, TimeWindow, Timestamp,
};

#[derive(Parser)]
#[command(name = "venus-export")]
#[command(about = "Export VENUS telemetry channels over a time window to CSV")]
struct Cli {
    /// JSON config file; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory holding the partition files
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export channels over [start, end) to a CSV file
    Export {
        /// Comma-separated channel ids, in output column order (e.g. inj_mbar,ext_mbar)
        #[arg(long, value_delimiter = ',', required = true)]
        channels: Vec<String>,

        /// Window start (YYYY-MM-DD[ HH:MM[:SS]])
        #[arg(long)]
        start: String,

        /// Window end, exclusive (YYYY-MM-DD[ HH:MM[:SS]])
        #[arg(long)]
        end: String,

        /// Treat --start/--end as whole days, end day included
        #[arg(long)]
        whole_days: bool,

        /// Directory the CSV is published to
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Written in place of missing samples
        #[arg(long)]
        missing_marker: Option<String>,
    },
    /// List the partition anchors available in the store
    Dates,
    /// List the known channels by group
    Channels,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    if let Some(store) = cli.store {
        config.store = store;
    }

    match cli.command {
        Commands::Export {
            channels,
            start,
            end,
            whole_days,
            output_dir,
            deadline_secs,
            missing_marker,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if deadline_secs.is_some() {
                config.deadline_secs = deadline_secs;
            }
            if let Some(marker) = missing_marker {
                config.missing_marker = marker;
            }

            let window = if whole_days {
                let first = Timestamp::parse(&start)?.to_datetime().date();
                let last = Timestamp::parse(&end)?.to_datetime().date();
                TimeWindow::from_dates(first, last)?
            } else {
                TimeWindow::parse(&start, &end)?
            };
            let request = ExportRequest::new(channels, window)?;

            info!("store: {}", config.store.display());
            let service = ExportService::new(Exporter::new(config)?);
            let artifact = service
                .submit(request)?
                .wait()
                .with_context(|| format!("export {window}"))?;
            println!("{}", artifact.path().display());
            eprintln!("rows={}", artifact.rows());
        }
        Commands::Dates => {
            let exporter = Exporter::new(config)?;
            let index = exporter.index()?;
            for skipped in index.skipped() {
                eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            for date in index.available_dates() {
                println!("{date}");
            }
        }
        Commands::Channels => {
            for group in ChannelGroup::ALL {
                println!("{group}");
                for channel in channels_in(group) {
                    println!("  {:<16} {}", channel.id, channel.label);
                }
            }
        }
    }

    Ok(())
}
