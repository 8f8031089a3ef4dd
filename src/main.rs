use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod auth;
mod config;
mod dashboard;
mod error;
mod live_scores;
mod models;
mod proxy;

use auth::LocalSession;
use config::{Command, Config, ServeArgs, WatchArgs};
use dashboard::AppState;
use live_scores::start_live_scores;
use proxy::{ManagedDatastream, ProxyState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    match config.command {
        Command::Watch(args) => watch(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

async fn watch(args: WatchArgs) -> Result<()> {
    if args.access_token.is_none() {
        info!("🟡 No DASHBOARD_ACCESS_TOKEN set – dashboard is open to everyone");
    }
    if args.reject_stale_updates {
        info!("Stale updates (older lastUpdate) will be dropped");
    }

    let (live, supervisor_task) = start_live_scores(
        &args.function_url,
        args.supervisor_config(),
        args.ordering(),
        args.ping_interval(),
    )?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let state = AppState {
        live: live.clone(),
        auth: Arc::new(LocalSession::new(args.access_token.clone())),
        http,
        function_url: args.function_url.clone(),
    };
    let app = dashboard::router(state);
    let addr: SocketAddr = args.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Run dashboard server until Ctrl-C, then close the live channel
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down live channel");
    live.close().await?;
    drop(live);
    supervisor_task.await?;
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let broker = ManagedDatastream::new(&args.datastream_api_url, args.datastream_api_token.clone())?;
    let app = proxy::router(ProxyState {
        broker: Arc::new(broker),
        channel_id: args.channel_id.clone(),
    });

    let addr: SocketAddr = args.listen_addr.parse()?;
    info!(
        "Companion function listening on http://{} (channel {})",
        addr, args.channel_id
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
