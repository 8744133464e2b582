use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stumps_proxy::persistence::InMemoryDataAccess;
use stumps_proxy::{net, HostRegistry};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "stumps-proxy")]
struct Args {
    /// Upstream host to mock, e.g. api.example.com or api.example.com:8080
    #[arg(short, long)]
    remote_host: Option<String>,
    /// Local listening port; a random open port in 7000-10000 when omitted
    #[arg(short, long)]
    port: Option<u16>,
    /// Use https towards the upstream host
    #[arg(short, long)]
    secure: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let data_access = Arc::new(InMemoryDataAccess::new());
    let registry = HostRegistry::new(data_access);
    registry.load()?;

    if let Some(remote_host) = args.remote_host.as_deref() {
        let port = match args.port {
            Some(port) => port,
            None => net::find_random_open_port()
                .context("no open port available in 7000-10000")?,
        };
        let config = registry.create(remote_host, port, args.secure, true)?;
        info!("Mocking {} on port {}", remote_host, config.listening_port);
    }

    registry.start_all().await?;
    info!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.ok();
    registry.stop_all().await;
    info!("Shutting down");
    Ok(())
}
