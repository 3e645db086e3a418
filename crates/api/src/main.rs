//! Bitte API server binary.
//!
//! Usage:
//!   bitte-api --config config.toml
//!   bitte-api --port 8080
//!   bitte-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `BITTE_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `BITTE_CORS_ORIGINS` - CORS allowed origins (comma-separated)
//! - `BITTE_FALLBACK_API_KEY` - Bearer token for the fallback chat backend

use bitte_api::{AppState, serve};
use bitte_coordinator::CoordinatorConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bitte-api", version, about = "Telegram-Bitte agent relay")]
struct Args {
    /// Path to config.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address
    #[arg(short, long, env = "BITTE_BIND_ADDR", default_value = "127.0.0.1")]
    bind: String,

    /// CORS allowed origins (comma-separated, `*` for any)
    #[arg(long, env = "BITTE_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,bitte_api=debug,bitte_coordinator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0. The relay will accept chat requests on all network \
             interfaces; make sure a firewall or reverse proxy is in front of it."
        );
    }

    let config = if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
        CoordinatorConfig::from_file(path)?
    } else {
        tracing::info!("Using default configuration");
        CoordinatorConfig::default()
    };

    let cors_origins = args.cors_origins.map(|origins| {
        origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect::<Vec<_>>()
    });

    let state = AppState::new(config)?;

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    serve(Arc::new(state), addr, cors_origins).await?;

    Ok(())
}
