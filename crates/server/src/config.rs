use crate::sessions::SessionRegistry;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use marketing_miner_core::{ClientConfig, MarketingMinerClient};
use marketing_miner_mcp::tools::keyword_registry;
use marketing_miner_mcp::McpServer;
use std::sync::Arc;

/// Which bridge the process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// HTTP with server-sent events
    Http,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "marketing-miner")]
#[command(about = "MCP server for Marketing Miner keyword research", long_about = None)]
pub struct ServerConfig {
    /// Transport to serve
    #[arg(short, long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Http)]
    pub transport: Transport,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path serving both the SSE stream and message POSTs
    #[arg(long, env = "MCP_HTTP_PATH", default_value = "/mcp")]
    pub path: String,

    /// Override the Marketing Miner API base URL
    #[arg(long, env = "MARKETING_MINER_API_BASE")]
    pub api_base: Option<String>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Route path, always with a leading slash
    pub fn mcp_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }

    /// Build the MCP server with both keyword tools registered
    pub fn build_mcp_server(&self) -> Result<McpServer> {
        let client_config =
            ClientConfig::from_base(self.api_base.as_deref()).context("Invalid API base URL")?;
        let client =
            MarketingMinerClient::from_env(client_config).context("Failed to create HTTP client")?;
        Ok(McpServer::new(keyword_registry(client)))
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub server: McpServer,
    pub sessions: Arc<SessionRegistry>,
    pub mcp_path: String,
}

impl AppState {
    pub fn new(server: McpServer, mcp_path: impl Into<String>) -> Self {
        Self {
            server,
            sessions: Arc::new(SessionRegistry::new()),
            mcp_path: mcp_path.into(),
        }
    }
}
