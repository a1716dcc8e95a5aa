//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "proxmap", about = "beacon proximity tracking client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll the telemetry feed and print lifecycle events as they happen
    Watch(WatchOpts),
    /// Fetch one snapshot and print the flattened observations as JSON
    Peek(PeekOpts),
}

#[derive(clap::Args)]
pub struct WatchOpts {
    /// Snapshot feed URL, e.g. https://host/data
    #[arg(long, env = "PROXMAP_FEED_URL")]
    pub feed_url: String,

    /// Durable event sink URL; omit to keep events local only
    #[arg(long, env = "PROXMAP_SINK_URL")]
    pub sink_url: Option<String>,

    /// Poll period in seconds
    #[arg(long, default_value = "4")]
    pub poll_interval_secs: u64,

    /// Status evaluator period in seconds
    #[arg(long, default_value = "60")]
    pub evaluator_interval_secs: u64,

    /// Device offline threshold in seconds
    #[arg(long, env = "DEVICE_OFFLINE_SECONDS", default_value = "1200")]
    pub offline_after_secs: i64,

    /// Spacing between still-in/still-out pings in seconds
    #[arg(long, env = "STILL_INTERVAL_SECONDS", default_value = "600")]
    pub still_interval_secs: i64,

    /// Beacon time-to-live in seconds before a forced left
    #[arg(long, env = "TTL_SECONDS", default_value = "900")]
    pub beacon_ttl_secs: i64,
}

#[derive(clap::Args)]
pub struct PeekOpts {
    #[arg(long, env = "PROXMAP_FEED_URL")]
    pub feed_url: String,
}
