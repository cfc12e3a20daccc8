use anyhow::Result;
use clap::Parser;
use prom_downsampler::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let cli = config::Cli::parse();
    let app_config = config::AppConfig::load(&cli)?;
    tracing::info!(
        source = %app_config.source.url,
        output = %app_config.output.path,
        concurrency = app_config.collection.concurrency,
        interval_secs = app_config.collection.interval_secs,
        query_timeout_secs = app_config.source.query_timeout_secs,
        "prom-downsampler starting"
    );

    let source = Arc::new(
        source::PrometheusSource::new(&app_config.source.url, app_config.query_timeout())
            .map_err(|e| anyhow::anyhow!("prometheus client: {}", e))?,
    );
    let collector = Arc::new(collector::Collector::new(
        source,
        publisher::Publisher::new(&app_config.output.path),
        collector::CollectorConfig {
            collect_interval: app_config.collect_interval(),
            concurrency: app_config.collection.concurrency,
            query_timeout: app_config.query_timeout(),
        },
    ));

    let run_state = Arc::new(scheduler::RunState::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_handle = scheduler::spawn(collector, run_state, shutdown_rx);

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = scheduler_handle.await;

    Ok(())
}
