use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use athena_monitor::config::{self, Config};
use athena_monitor::health::{Collaborators, FleetReport, InstanceChecker, ReportAggregator};
use athena_monitor::metrics;

/// Exit code when the monitor itself cannot run
const EXIT_STARTUP_FAILURE: u8 = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "athena-monitor", version, about = "Health monitor for mysql-proxy instances")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance list file, overrides `monitor.instances_file`
    #[arg(short, long)]
    instances: Option<PathBuf>,

    /// Report format on stdout
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Also write the report as Prometheus metrics to this file
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Maximum number of instances checked at once
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr, stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => ExitCode::from(report.severity().exit_code() as u8),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Monitor failed to start");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<FleetReport> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_or_default_config(),
    };

    if let Some(path) = cli.instances {
        config.monitor.instances_file = path;
    }
    if let Some(concurrency) = cli.concurrency {
        config.monitor.concurrency = concurrency;
    }

    let instances = config::load_instances(&config.monitor.instances_file).with_context(|| {
        format!(
            "Failed to load instance list {}",
            config.monitor.instances_file.display()
        )
    })?;

    if instances.is_empty() {
        warn!(path = %config.monitor.instances_file.display(), "Instance list is empty");
    }

    info!(
        instances = instances.len(),
        concurrency = config.monitor.concurrency,
        probe_timeout_ms = config.monitor.probe_timeout_ms,
        "Starting fleet check"
    );

    let checker = InstanceChecker::new(&config, Collaborators::local(&config));
    let aggregator = ReportAggregator::new(
        Arc::new(checker),
        config.monitor.title.clone(),
        config.monitor.concurrency,
    );

    let start = Instant::now();
    let report = aggregator.run(&instances).await;
    let elapsed = start.elapsed().as_secs_f64();

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print!("{}", render_text(&report)),
    }

    if let Some(path) = &cli.metrics_file {
        // A broken export never changes the verdict
        if let Err(e) = metrics::write_textfile(&report, elapsed, path) {
            warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to write metrics");
        }
    }

    Ok(report)
}

fn load_or_default_config() -> Config {
    let config_paths = ["config/athena-monitor.toml", "athena-monitor.toml"];

    for path in config_paths {
        match config::load_config(path) {
            Ok(config) => {
                info!(path = path, "Loaded configuration");
                return config;
            }
            Err(e) => {
                warn!(path = path, error = %e, "Failed to load config");
            }
        }
    }

    info!("Using default configuration");
    Config::default()
}

fn render_text(report: &FleetReport) -> String {
    let mut out = format!("{}: {}\n", report.title(), report.severity());

    for instance in report.instances() {
        out.push_str(&format!(
            "\n{} ({}/{}): {}\n",
            instance.name(),
            instance.instance().proxy_port,
            instance.instance().admin_port,
            instance.severity()
        ));
        for verdict in instance.verdicts() {
            out.push_str(&format!(
                "  {:<13} {:<8} {}\n",
                verdict.probe.as_str(),
                verdict.severity.as_str(),
                verdict.message
            ));
        }
    }

    out
}
