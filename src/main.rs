use std::sync::Arc;

use mcp_toolbox::{
    build_app,
    config::{Config, Transport},
    file_server::build_file_server,
    logging, stdio, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init_logging()?;

    let config = Config::from_env()?;
    let server = Arc::new(build_file_server(&config.server_name, &config.root_dir).await?);

    match config.transport {
        Transport::Stdio => stdio::serve_stdio(server).await?,
        Transport::Http => {
            let bind_socket = config.bind_socket()?;
            let state = AppState::new(config.api_token.clone(), server);
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}
