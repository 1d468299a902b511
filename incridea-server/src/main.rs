//! Incridea page server
//!
//! Prefetches the home page data from the GraphQL API and serves it as a
//! hydration payload.
//!
//! Usage:
//!   incridea-server --port 3000 --graphql-endpoint https://api.incridea.in/graphql

use std::{sync::Arc, time::Duration};
use anyhow::{Context, Result};
use clap::Parser;
use incridea_query::{ExecutorConfig, HttpTransport, Revalidate};
use incridea_server::{build_router, AppState, ServerConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "incridea-server")]
#[command(about = "Serves prefetched Incridea page payloads")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// GraphQL endpoint queried for page data
    #[arg(short, long, default_value = "http://localhost:4000/graphql")]
    graphql_endpoint: String,

    /// Seconds before the static page is rebuilt (0 = every request, omit = never)
    #[arg(short, long)]
    revalidate_secs: Option<u64>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Incridea server starting...");
    let transport = Arc::new(HttpTransport::new(args.graphql_endpoint.clone()));
    let config = ServerConfig {
        revalidate: Revalidate::from_secs(args.revalidate_secs),
        executor: ExecutorConfig {
            request_timeout: Duration::from_secs(args.timeout_secs),
            ..Default::default()
        },
    };
    let state = Arc::new(AppState::new(transport, config));

    if let Err(e) = state.prebuild().await {
        warn!("Static prefetch failed, will retry on first request: {}", e);
    }

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("Failed to bind HTTP port")?;
    info!(
        "Listening on port {} (upstream {}, revalidate {:?})",
        args.port, args.graphql_endpoint, args.revalidate_secs
    );

    axum::serve(listener, build_router(state))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
