// MCP (Model Context Protocol) server exposing Marketing Miner keyword tools
// to agent clients over stdio or HTTP/SSE

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
