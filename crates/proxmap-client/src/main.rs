//! proxmap: polling client for the beacon telemetry feed.
//! Derives proximity/availability lifecycle events and forwards the durable
//! ones to the notification sink.

use clap::Parser;

mod cli;
mod dispatch;
mod feed;
mod poll_loop;
mod sink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Watch(opts) => {
            let filter = std::env::var("PROXMAP_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("proxmap watch starting");
            poll_loop::run_watch(opts).await?;
        }
        cli::Command::Peek(opts) => {
            let client = feed::FeedClient::new(&opts.feed_url)?;
            let snapshot = client.fetch_snapshot().await?;
            let observations = proxmap_core::aggregate::flatten_snapshot(&snapshot);
            println!("{}", serde_json::to_string_pretty(&observations)?);
        }
    }

    Ok(())
}
