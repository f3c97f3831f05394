//! smsrelay server
//!
//! Serves the notification relay over HTTP. Settings come from `SMSRELAY_*`
//! environment variables; flags override them.

use clap::Parser;
use smsrelay_server::{RelayServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// SMS notification relay server.
#[derive(Parser)]
#[command(name = "smsrelay-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Data directory; notifications are kept in memory when unset
    #[arg(short, long, conflicts_with = "memory")]
    data_dir: Option<PathBuf>,

    /// Keep notifications in memory even if SMSRELAY_DATA_DIR is set
    #[arg(long)]
    memory: bool,

    /// Notifications kept per device
    #[arg(long)]
    max_queue_length: Option<u64>,

    /// Long-poll timeout in seconds
    #[arg(long)]
    long_poll_secs: Option<u64>,

    /// Upper bound for fetch_count
    #[arg(long)]
    max_fetch_count: Option<usize>,

    /// fetch_count for requests that omit it (with --lenient-query)
    #[arg(long)]
    default_fetch_count: Option<usize>,

    /// Let fetches omit fetch_count and long_polling instead of failing
    #[arg(long)]
    lenient_query: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(addr) = self.bind {
            config = config.with_bind_addr(addr);
        }
        if let Some(dir) = self.data_dir {
            config = config.with_data_dir(dir);
        }
        if self.memory {
            config = config.with_memory_backend();
        }
        if let Some(max) = self.max_queue_length {
            config = config.with_max_queue_length(max);
        }
        if let Some(secs) = self.long_poll_secs {
            config = config.with_long_poll_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_fetch_count {
            config = config.with_max_fetch_count(max);
        }
        if let Some(count) = self.default_fetch_count {
            config = config.with_default_fetch_count(count);
        }
        if self.lenient_query {
            config = config.with_require_query_params(false);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.apply(ServerConfig::from_env()?);
    info!(?config, "starting smsrelay server");

    let server = RelayServer::new(config)?;
    server.serve(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_fetch_settings() {
        let args = Args::parse_from(["smsrelay-server", "--max-fetch-count", "5"]);
        let config = args.apply(ServerConfig::default());
        assert_eq!(config.max_fetch_count, 5);
        assert_eq!(config.default_fetch_count, 5);
        assert!(config.require_query_params);
        assert!(config.validate().is_ok());

        let args = Args::parse_from([
            "smsrelay-server",
            "--max-fetch-count",
            "40",
            "--default-fetch-count",
            "25",
            "--lenient-query",
        ]);
        let config = args.apply(ServerConfig::default());
        assert_eq!(config.default_fetch_count, 25);
        assert!(!config.require_query_params);
    }
}
