//! HTTP front end for the Telegram-Bitte agent relay.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/chat` - Route a conversation to an agent and return its reply
//! - `GET /api/agents` - Directory snapshot, optionally `?network=masumi|shade`
//!
//! # Architecture
//!
//! ```text
//! Chat front end
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Gateway   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      Masumi / Shade agents
//! │   Coordinator   │ ───► (availability, input_schema,
//! └─────────────────┘       start_job, status)
//! ```

pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use state::AppState;

fn cors_layer(origins: Option<Vec<String>>) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        Some(origins) if !origins.iter().any(|o| o == "*") => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            base.allow_origin(parsed)
        }
        _ => base.allow_origin(Any),
    }
}

/// Create the API router with all routes configured.
///
/// `cors_origins` of `None` (or containing `*`) allows every origin.
pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/chat", post(routes::chat))
        .route("/api/agents", get(routes::list_agents))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting Bitte API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
