//! smsrelay CLI
//!
//! Maintenance tools for smsrelay data directories.
//!
//! # Commands
//!
//! - `inspect` - Display journal statistics and device queues
//! - `verify` - Check queue linkage
//! - `compact` - Rewrite the journal as a single snapshot
//! - `dump-journal` - Dump journal records for debugging
//! - `tail` - Show a device's newest notifications
//!
//! Commands open the directory exclusively; stop the server first.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// smsrelay maintenance tools.
#[derive(Parser)]
#[command(name = "smsrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display journal statistics and device queues
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check queue linkage
    Verify {
        /// Only check this device
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Rewrite the journal as a single snapshot
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Dump journal records for debugging
    DumpJournal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show a device's newest notifications
    Tail {
        /// Device id
        #[arg(short, long)]
        device: String,

        /// Number of notifications
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify { device } => {
            let path = cli.path.ok_or("Data directory required for verify")?;
            commands::verify::run(&path, device.as_deref())?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Data directory required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Data directory required for dump-journal")?;
            commands::dump_journal::run(&path, limit, &format)?;
        }
        Commands::Tail {
            device,
            count,
            format,
        } => {
            let path = cli.path.ok_or("Data directory required for tail")?;
            commands::tail::run(&path, &device, count, &format)?;
        }
        Commands::Version => {
            println!("smsrelay CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
