//! CyberSafe Agent
//!
//! Reads captured notifications as line-delimited JSON on stdin, scores them
//! on-device and forwards only the scores to a collector.
//!
//! Text is held for at most the configured TTL and never leaves the process.

use anyhow::{Context, Result};
use clap::Parser;
use cybersafe_classifiers::{HashingEncoder, SafeTensorsLoader};
use cybersafe_pipeline::Pipeline;
use cybersafe_telemetry::{HttpReporter, LogReporter, ScoreReporter};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod source;

use config::AgentConfig;

#[derive(Parser, Debug)]
#[command(name = "cybersafe-agent")]
#[command(about = "CyberSafe on-device risk scoring agent", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "cybersafe.yaml")]
    config: String,

    /// Collector URL scores are POSTed to
    #[arg(long, env = "CYBERSAFE_COLLECTOR")]
    collector: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_listen: Option<SocketAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    info!("Starting CyberSafe agent");

    let config = AgentConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("TTL: {}s", config.pipeline.ttl_secs);
    info!("Categories: {}", config.models.len());

    if let Some(addr) = config.metrics_listen {
        init_metrics(addr)?;
    }

    let reporter: Arc<dyn ScoreReporter> = match &config.collector {
        Some(collector) => {
            info!("Collector: {}", collector.url);
            Arc::new(HttpReporter::new(
                collector.url.clone(),
                config.pipeline.report_timeout(),
            )?)
        }
        None => {
            warn!("No collector configured, scores will only be logged");
            Arc::new(LogReporter)
        }
    };

    let encoder = Arc::new(HashingEncoder::from_config(&config.pipeline)?);
    let pipeline = Pipeline::new(config.pipeline.clone(), encoder, reporter)?;

    // Model loading may download from the Hub; keep it off the async workers.
    let loader = SafeTensorsLoader::new(config.device);
    tokio::task::block_in_place(|| pipeline.initialize(&loader, &config.models))
        .context("Refusing to start without every risk model")?;

    let lines = source::spawn_reader(std::io::stdin())?;
    let outcome = tokio::select! {
        result = source::run(&pipeline, lines) => {
            result.map(|stats| info!(lines = stats.lines, queued = stats.queued, "End of input"))
        }
        _ = shutdown_signal() => {
            warn!("Shutdown signal received, draining queue...");
            Ok(())
        }
    };

    pipeline.shutdown().await;

    let snapshot = pipeline.metrics().snapshot();
    info!(
        ingested = snapshot.ingested,
        reported = snapshot.reported,
        dropped = snapshot.dropped(),
        purged = snapshot.purged,
        avg_inference_us = snapshot.avg_inference_latency_us(),
        "Agent shutdown complete"
    );

    outcome.context("Failed reading input")
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("cybersafe=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cybersafe=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Install the Prometheus exporter on `addr`
fn init_metrics(addr: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!("cybersafe_ingested_total", "Total number of ingest calls");
    metrics::describe_counter!(
        "cybersafe_events_total",
        "Events by outcome (queued, skipped, reported, dropped)"
    );
    metrics::describe_counter!("cybersafe_purged_total", "Buffered entries removed by TTL");
    metrics::describe_histogram!(
        "cybersafe_inference_latency_us",
        metrics::Unit::Microseconds,
        "Claim to scores latency in microseconds"
    );
    metrics::describe_gauge!("cybersafe_buffered_texts", "Texts currently alive in memory");

    info!("Metrics exporter listening on http://{}", addr);
    Ok(())
}
