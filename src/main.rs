use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod extract;
mod fetch;
mod history;
mod reconcile;
mod schedule;
mod server;
mod stats;
mod types;

use fetch::BrowserFetcher;
use history::HistoryStore;
use reconcile::Reconciler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = config::load()?;
    tracing::info!("starting lotto-sync, history at {}", config.history_path);

    let store = HistoryStore::new(&config.history_path);
    let source = Arc::new(BrowserFetcher::new(
        config.result_url.clone(),
        Duration::from_secs(config.nav_timeout_secs),
    ));
    let reconciler = Arc::new(Reconciler::new(store, source));

    // Catch-up pass: pick up any draw published while the process was down.
    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move {
            reconciler.run().await;
        });
    }

    let _sched = schedule::start(&config.sync_cron, Arc::clone(&reconciler)).await?;

    let app = server::router(server::AppState { reconciler });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
