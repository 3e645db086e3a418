//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bitte_common::{AgentDescriptor, AgentNetwork};
use bitte_coordinator::{ChatRequest, ComposedReply};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub registries: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        registries: state.registries,
    })
}

/// API error response. Always a 500; agent failures never reach here.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub details: String,
}

impl ErrorResponse {
    fn internal(details: impl Into<String>) -> Self {
        Self {
            error: "Internal server error",
            details: details.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Route a conversation to an agent and return the composed reply.
///
/// The cancellation token is tied to this handler's future: if the client
/// goes away and the future is dropped, the in-flight job stops polling.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ComposedReply>, ErrorResponse> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected chat request body");
        ErrorResponse::internal(rejection.body_text())
    })?;

    let request_id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let reply = state
        .coordinator
        .process(request, &cancel)
        .instrument(info_span!("chat", %request_id))
        .await
        .map_err(|e| {
            error!(%request_id, error = %e, "Chat request failed");
            ErrorResponse::internal(e.to_string())
        })?;

    debug!(%request_id, agent = %reply.agent, "Chat request answered");
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
pub struct AgentsQuery {
    #[serde(default)]
    pub network: Option<AgentNetwork>,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentDescriptor>,
    pub count: usize,
}

/// Directory snapshot. Unreachable registries are replaced by fallback agents.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgentsQuery>,
) -> Json<AgentsResponse> {
    let directory = state.coordinator.directory();
    let agents = match query.network {
        Some(network) => directory.list_network(network).await,
        None => directory.list_agents().await,
    };

    Json(AgentsResponse {
        count: agents.len(),
        agents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            registries: 2,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains(r#""registries":2"#));
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(ErrorResponse::internal("messages must not be empty")).unwrap();
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["details"], "messages must not be empty");
    }

    #[test]
    fn test_agents_query_network() {
        let query: AgentsQuery = serde_json::from_str(r#"{"network": "shade"}"#).unwrap();
        assert_eq!(query.network, Some(AgentNetwork::Shade));
        let query: AgentsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.network.is_none());
    }
}
