use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use litespeed_exporter::{Collector, Config, config, httpd};
use litespeed_report::registry;
use tokio::{runtime::Builder, signal};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::Error),
    #[error("Telemetry endpoint failed: {0}")]
    Httpd(#[from] httpd::Error),
}

fn exclude_metrics_help() -> String {
    format!(
        "comma separated list of metrics to exclude, available options: [{}]",
        registry::flags_string()
    )
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// path on disk to an optional YAML configuration file, flags given on the
    /// command line take precedence over it
    #[clap(long)]
    config_path: Option<PathBuf>,
    /// address to listen on for telemetry [default: 0.0.0.0:9777]
    #[clap(long)]
    listen_address: Option<SocketAddr>,
    /// path under which to expose metrics [default: /metrics]
    #[clap(long)]
    telemetry_path: Option<String>,
    /// pattern of files to scrape LiteSpeed metrics from [default:
    /// /tmp/lshttpd/.rtreport*]
    #[clap(long)]
    scrape_pattern: Option<String>,
    #[clap(long, help = exclude_metrics_help())]
    exclude_metrics: Option<String>,
    /// export request rates by host
    #[clap(long)]
    req_rates_by_host: bool,
    /// export metrics by core file name
    #[clap(long)]
    metrics_by_core: bool,
    /// exclude EXTAPP metrics altogether
    #[clap(long)]
    exclude_extapp: bool,
}

fn get_config(args: &Args) -> Result<Config, Error> {
    let mut config = match &args.config_path {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    if let Some(listen_address) = args.listen_address {
        config.listen_address = listen_address;
    }
    if let Some(telemetry_path) = &args.telemetry_path {
        config.telemetry_path.clone_from(telemetry_path);
    }
    if let Some(scrape_pattern) = &args.scrape_pattern {
        config.scrape_pattern.clone_from(scrape_pattern);
    }
    if let Some(exclude_metrics) = &args.exclude_metrics {
        config.extend_exclusions(exclude_metrics);
    }
    config.req_rates_by_host |= args.req_rates_by_host;
    config.metrics_by_core |= args.metrics_by_core;
    config.exclude_extapp |= args.exclude_extapp;

    Ok(config)
}

async fn inner_main(config: Config) -> Result<(), Error> {
    let collector = Arc::new(Collector::from_config(&config));
    let server = httpd::Server::bind(
        config.listen_address,
        config.telemetry_path.clone(),
        collector,
    )
    .await?;
    info!(
        "Serving metrics on {}{}",
        server.local_addr()?,
        config.telemetry_path
    );

    server
        .run(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
            }
        })
        .await;
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting litespeed_exporter {version}.");

    let args = Args::parse();
    let config = get_config(&args)?;
    debug!("Configuration: {config:?}");

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(inner_main(config));
    info!("Shutting down.");
    res
}
