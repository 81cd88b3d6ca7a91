//! beacon - a Raft-replicated key-value node with an HTTP control plane.

mod join;
mod observability;
mod serve;

use anyhow::Result;
use beacon_cluster::ClusterConfig;
use clap::Parser;
use observability::{LogFormat, TracingConfig, init_tracing};
use std::time::Duration;

/// Run a beacon cluster node.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP control plane listening address
    #[arg(long = "http", env = "BEACON_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Raft RPC listening address
    #[arg(long = "raft", env = "BEACON_RAFT_ADDR", default_value = "127.0.0.1:9090")]
    raft_addr: String,

    /// Raft address advertised to peers (defaults to --raft)
    #[arg(long, env = "BEACON_ADVERTISE_ADDR")]
    advertise: Option<String>,

    /// HTTP address of an existing member to join through
    #[arg(long, env = "BEACON_JOIN")]
    join: Option<String>,

    /// Node ID
    #[arg(long, env = "BEACON_NODE_ID")]
    id: String,

    /// Seconds allowed for each membership change
    #[arg(long, env = "BEACON_JOIN_TIMEOUT", default_value_t = 10)]
    join_timeout: u64,

    /// Log format: json, pretty or compact (auto-detected when unset)
    #[arg(long, env = "BEACON_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn cluster_config(&self) -> Result<ClusterConfig> {
        let mut builder = ClusterConfig::builder()
            .node_id(&self.id)
            .http_addr(&self.http_addr)
            .raft_addr(&self.raft_addr)
            .join_timeout(Duration::from_secs(self.join_timeout));
        if let Some(advertise) = &self.advertise {
            builder = builder.advertise_addr(advertise);
        }
        Ok(builder.build()?)
    }
}

fn setup_logging(verbosity: u8, format: Option<LogFormat>) -> Result<()> {
    let filter = match verbosity {
        0 => "info",
        1 => "debug,openraft=info",
        2 => "debug",
        _ => "trace",
    };

    // BEACON_LOG_LEVEL, then RUST_LOG, then -v
    let log_filter = std::env::var("BEACON_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| filter.to_string());

    let config = TracingConfig::builder()
        .log_format(format.unwrap_or_else(LogFormat::detect))
        .log_filter(log_filter)
        .include_location(verbosity >= 3)
        .build();

    init_tracing(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_format)?;

    let config = cli.cluster_config()?;
    serve::run(config, cli.join).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_addresses() {
        let cli = Cli::try_parse_from(["beacon", "--id", "n1"]).unwrap();
        assert_eq!(cli.http_addr, "127.0.0.1:8080");
        assert_eq!(cli.raft_addr, "127.0.0.1:9090");
        assert!(cli.join.is_none());

        let config = cli.cluster_config().unwrap();
        assert_eq!(config.node_id, "n1");
        assert_eq!(config.join_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn join_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "beacon",
            "--id",
            "n2",
            "--http",
            "127.0.0.1:8081",
            "--raft",
            "127.0.0.1:9091",
            "--join",
            "127.0.0.1:8080",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.join.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.cluster_config().unwrap().advertise_addr(), "127.0.0.1:9091");
    }

    #[test]
    fn id_is_required() {
        assert!(Cli::try_parse_from(["beacon"]).is_err());
    }
}
