use anyhow::Result;
use clap::Parser;

mod api;
mod config;
mod sessions;

use config::{AppState, ServerConfig, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdio mode keeps stdout for protocol frames
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::parse();

    tracing::info!(
        "Starting Marketing Miner MCP server (transport={:?})",
        config.transport
    );

    let server = config.build_mcp_server()?;

    match config.transport {
        Transport::Stdio => server.serve_stdio().await?,
        Transport::Http => {
            let addr = config.addr();
            let path = config.mcp_path();
            tracing::info!("Serving MCP on http://{}{}", addr, path);
            api::serve(&addr, AppState::new(server, path)).await?;
        }
    }

    Ok(())
}
