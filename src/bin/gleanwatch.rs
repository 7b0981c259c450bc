use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gleanwatch::{
    OutputFormat, PassOptions, config_path, known_sources, render, render_sources, run_pass,
    select_environments, source_breakdown,
};
use gleanwatch_domain::{ServiceType, WatchConfig};

/// Run one health pass over every configured environment and print the report.
#[derive(Debug, Parser)]
#[command(name = "gleanwatch", version)]
struct Cli {
    /// Config file. Falls back to GLEANWATCH_CONFIG_PATH, then ~/.gleanwatch/config.yaml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service to poll (containers, scheduler, object_store, triplestore). Repeatable.
    #[arg(long = "service", value_parser = parse_service)]
    services: Vec<ServiceType>,

    /// Environment key to poll. Repeatable.
    #[arg(long = "env")]
    environments: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log raw backend payloads at debug level.
    #[arg(long)]
    trace_payloads: bool,

    /// Per-call timeout, overriding the config.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print one line per record under each entry.
    #[arg(long)]
    details: bool,

    /// After the report, print per-source job statistics from the scheduler runs.
    #[arg(long)]
    sources: bool,
}

fn parse_service(raw: &str) -> Result<ServiceType, String> {
    ServiceType::parse(raw).ok_or_else(|| format!("unknown service '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = config_path(cli.config.as_deref());
    let config = WatchConfig::load_from_path(&path)?;
    info!(path = %path.display(), environments = config.environments.len(), "config loaded");
    for problem in config.validate() {
        warn!(%problem, "config problem");
    }

    let options = PassOptions {
        services: cli.services,
        environments: cli.environments,
        trace_payloads: cli.trace_payloads,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };
    let report = run_pass(&config, &options).await?;
    println!("{}", render(&report, cli.format, cli.details)?);

    if cli.sources {
        let environments = select_environments(&config, &options.environments)?;
        let known = known_sources(&environments, &config.aggregation).await;
        println!("{}", render_sources(&source_breakdown(&report, &known), cli.format)?);
    }
    Ok(())
}
