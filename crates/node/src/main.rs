//! Carechain hub node
//!
//! Entry point for the bot-network hub: accepts peer WebSocket connections,
//! relays ledger events and votes among them, and serves the HTTP gateway
//! for external transactions and queries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use carechain_gateway::GatewayServer;
use carechain_hub::{Hub, HubConfig, HubServer};

/// Carechain bot-network hub
#[derive(Parser, Debug)]
#[command(name = "carechain")]
#[command(about = "Connection hub for a simulated ledger bot network", long_about = None)]
struct Args {
    /// WebSocket bind address for peer connections
    #[arg(long, default_value = "127.0.0.1:3000")]
    ws_addr: String,

    /// HTTP gateway bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// External query timeout in seconds
    #[arg(long, default_value = "10")]
    query_timeout_secs: u64,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value = "30")]
    stats_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting carechain hub");
    tracing::info!("  WebSocket: {}", args.ws_addr);
    tracing::info!("  HTTP gateway: {}", args.http_addr);
    tracing::info!("  Query timeout: {}s", args.query_timeout_secs);

    let hub = Arc::new(Hub::new(HubConfig {
        query_timeout: Duration::from_secs(args.query_timeout_secs),
    }));

    // Start the WebSocket server for peers
    let ws_hub = hub.clone();
    let ws_addr = args.ws_addr.clone();
    let ws_server = tokio::spawn(async move {
        if let Err(e) = HubServer::new(ws_hub).run(&ws_addr).await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    // Start the HTTP gateway
    let gateway_hub = hub.clone();
    let http_addr = args.http_addr.clone();
    let http_server = tokio::spawn(async move {
        if let Err(e) = GatewayServer::new(gateway_hub).run(&http_addr).await {
            tracing::error!("HTTP gateway error: {}", e);
        }
    });

    // Log hub stats periodically
    let stats_hub = hub.clone();
    let stats_interval = args.stats_interval_secs;
    let stats_logger = tokio::spawn(async move {
        if stats_interval == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = stats_hub.stats();
            tracing::info!(
                "{} peers ({} bots), leader {:?}, {} frames routed, {} queries pending",
                stats.connected_peers,
                stats.bot_peers,
                stats.current_leader,
                stats.frames_routed,
                stats.pending_queries
            );
        }
    });

    tracing::info!("Hub running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");

    ws_server.abort();
    http_server.abort();
    stats_logger.abort();

    tracing::info!("Hub stopped");

    Ok(())
}
