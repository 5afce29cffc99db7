use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use intention_trading_bot::analysis::RandomizedAnalysis;
use intention_trading_bot::config::Config;
use intention_trading_bot::gateway::HttpTradingGateway;
use intention_trading_bot::host::HttpHostClient;
use intention_trading_bot::http::{router, AppState};
use intention_trading_bot::random::ThreadRngSource;
use intention_trading_bot::store::LocalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();

    let store = Arc::new(LocalStore::open(&config.db_path)?);

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("building http client")?;
    let host = Arc::new(HttpHostClient::new(&config.host_api_url, client.clone()));
    let gateway = Arc::new(HttpTradingGateway::new(client));

    let state = Arc::new(AppState::new(
        store,
        host,
        gateway,
        Arc::new(RandomizedAnalysis),
        Arc::new(ThreadRngSource),
    ));

    let app = router(state);

    tracing::info!(bind = %config.bind, host_api = %config.host_api_url, "server starting");

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
