//! Axum handlers for the HTTP transport
//!
//! `POST /mcp` accepts a single JSON-RPC message or a batch; `/health` and
//! `/.well-known/mcp` are unauthenticated metadata endpoints.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::handle_json_rpc_payload;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: String,
    pub version: String,
    pub mcp_endpoint: &'static str,
    pub requires_auth: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: state.server.name().to_string(),
        version: state.server.version().to_string(),
        mcp_endpoint: "/mcp",
        requires_auth: state.api_token.is_some(),
    })
}

/// HTTP carries no session, so requests are served without lifecycle gating.
pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        debug!(bytes = body.len(), "unparseable request body");
        return Json(json_rpc_error(None, PARSE_ERROR, "Parse error")).into_response();
    };

    match handle_json_rpc_payload(&state.server, None, payload).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
