use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use alert_agent::{
    config::Config,
    context::HostContext,
    server::Server,
    sinks::{ResultSink, StdoutSink},
    store::{FileStore, Store},
    tools::Toolbox,
    AlertCollector, AlertSchedulerHandler,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address for the control API (overrides SERVER_ADDR)
    #[arg(long)]
    addr: Option<String>,

    /// Directory holding definitions.json (overrides ALERT_CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log level (overrides LOG_LEVEL)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Evaluate every enabled definition once, print the results and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.alerts.cache_dir = cache_dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let log_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("alert_agent={},tower_http=info", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    config.validate()?;
    info!("Loaded configuration: {:?}", config);

    let host = Arc::new(HostContext::detect(config.alerts.hostname.clone()));
    let tools = Toolbox::for_platform(host.platform(), config.alerts.python.clone())?;
    let store: Arc<dyn Store> = Arc::new(FileStore::new(&config.alerts.cache_dir));
    let handler = Arc::new(AlertSchedulerHandler::new(&config, store, tools, host.clone()));
    let sink = StdoutSink::from_config(&config.heartbeat);

    if cli.once {
        let ran = handler.collect_all().await;
        info!(alerts = ran, host = %host.hostname(), "evaluated alert definitions once");
        sink.send(&handler.collector().drain().await).await?;
        return Ok(());
    }

    handler.start().await;

    let heartbeat = tokio::spawn(heartbeat(
        handler.collector(),
        sink,
        Duration::from_secs(config.heartbeat.interval_secs),
    ));

    let app = Server::new(&config, handler.clone()).build_router();
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.addr))?;

    info!("Starting server on {}", config.server.addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    heartbeat.abort();
    handler.stop().await;
    info!("alert agent stopped");
    Ok(())
}

/// Periodically drain the collector into the sink.
async fn heartbeat(collector: Arc<AlertCollector>, sink: impl ResultSink, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let results = collector.drain().await;
        if results.is_empty() {
            continue;
        }
        if let Err(e) = sink.send(&results).await {
            error!(sink = sink.name(), error = %e, "failed to deliver alert results");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
