mod routes;
mod state;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use calmerge_core::FeedConfig;
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

const DEFAULT_PORT: u16 = 4096;

#[derive(Parser)]
#[command(name = "calmerge")]
#[command(about = "Merge remote iCalendar feeds into one expanded event list")]
struct Cli {
    /// Feed list (JSON: {"calendars": [{"name", "url", "color"}]})
    #[arg(short, long, global = true, default_value_os_t = FeedConfig::default_path())]
    config: PathBuf,

    /// Per-feed fetch timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout_secs: u64,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the merged event list over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: IpAddr,

        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Aggregate once and print the result as JSON
    Events {
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = AppState::new(cli.config, Duration::from_secs(cli.timeout_secs))?;

    match cli.command {
        Commands::Serve { bind, port } => serve(state, SocketAddr::new(bind, port)).await,
        Commands::Events { pretty } => print_events(state, pretty).await,
    }
}

async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    // Fail early on a missing feed list, but keep re-reading it per request
    let feeds = state.feed_config()?.calendars.len();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    tracing::info!(%addr, feeds, "calmerge listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn print_events(state: AppState, pretty: bool) -> Result<()> {
    let config = state.feed_config()?;
    let result = state.aggregator().run(&config.calendars).await;

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    let json = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{json}");

    Ok(())
}
