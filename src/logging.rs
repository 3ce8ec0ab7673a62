use std::{io::IsTerminal, time::Instant};

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber on stderr; stdout belongs to the stdio
/// transport. Colours are only emitted when stderr is a terminal.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact()
        .try_init()
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = info_span!("http", method = %method, path = %path);
    let started_at = Instant::now();

    let response = next.run(request).instrument(span).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    match status {
        StatusCode::UNAUTHORIZED => {
            warn!(method = %method, path = %path, duration_ms = elapsed_ms, "authentication failure")
        }
        status if status.is_server_error() => error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = elapsed_ms,
            "request failed"
        ),
        status => info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = elapsed_ms,
            "request summary"
        ),
    }

    response
}
