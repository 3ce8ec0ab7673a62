use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod file_server;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod server;
pub mod stdio;

use server::McpServer;

#[derive(Clone)]
pub struct AppState {
    pub api_token: Option<Arc<str>>,
    pub server: Arc<McpServer>,
}

impl AppState {
    pub fn new(api_token: Option<String>, server: Arc<McpServer>) -> Self {
        Self {
            api_token: api_token.map(Arc::<str>::from),
            server,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
