// Standalone MCP server binary (stdio transport)

use anyhow::{Context, Result};
use marketing_miner_core::{ClientConfig, MarketingMinerClient};
use marketing_miner_mcp::tools::keyword_registry;
use marketing_miner_mcp::McpServer;

async fn run() -> Result<()> {
    let api_base = std::env::var("MARKETING_MINER_API_BASE").ok();
    let config = ClientConfig::from_base(api_base.as_deref()).context("Invalid API base URL")?;
    let client = MarketingMinerClient::from_env(config).context("Failed to create HTTP client")?;

    let server = McpServer::new(keyword_registry(client));
    tracing::info!("Registered {} tools", server.registry().len());

    server.serve_stdio().await
}

#[tokio::main]
async fn main() {
    // stdout carries protocol frames only; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Marketing Miner MCP server starting...");

    if let Err(e) = run().await {
        tracing::error!("Fatal server error: {:#}", e);
        std::process::exit(1);
    }
}
