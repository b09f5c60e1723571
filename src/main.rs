use clap::Parser;
use covid_cache::cache::{
    AlertSink, Fetcher, HealthTracker, LogSink, RefreshScheduler, Registry, WebhookSink,
    spawn_notifier,
};
use covid_cache::config::Settings;
use covid_cache::metrics::Metrics;
use covid_cache::server::{AppState, router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = Settings::parse();
    let config = settings.cache_config();
    info!("mirroring {} every {}s", config.origin_url, config.refresh_interval.as_secs());

    let metrics = Metrics::new()?;
    let sink: Arc<dyn AlertSink> = match &settings.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone(), config.request_timeout)?),
        None => Arc::new(LogSink),
    };
    let (notifier, notifier_task) = spawn_notifier(sink);
    let health = Arc::new(HealthTracker::new(notifier, metrics.clone()));
    let registry = Arc::new(Registry::new(&config));

    let fetcher = Fetcher::new(&config, metrics.clone())?;
    let scheduler = RefreshScheduler::new(
        registry.targets().to_vec(),
        fetcher,
        health.clone(),
        config.refresh_interval,
    )
    .start();

    if timeout(config.startup_wait, registry.wait_populated()).await.is_err() {
        warn!(
            "not every resource loaded within {}s, serving what is cached",
            config.startup_wait.as_secs()
        );
    }

    let listener = TcpListener::bind(settings.bind).await?;
    info!("listening on http://{}", settings.bind);

    let app = router(AppState {
        registry,
        metrics,
        health,
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    // the notifier task drains once the last handle is gone
    if timeout(Duration::from_secs(5), notifier_task).await.is_err() {
        warn!("pending alerts were not delivered before exit");
    }
    Ok(())
}
