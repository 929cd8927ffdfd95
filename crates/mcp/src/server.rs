// MCP message handling and the stdio transport

use crate::protocol::{
    methods, CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    DEFAULT_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Longest stdio frame accepted before the rest of the line is skipped
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// One newline-delimited frame read from the transport
#[derive(Debug)]
enum Frame {
    Line(String),
    /// Not UTF-8 or longer than the limit. The codec has already moved past it.
    Unreadable(LinesCodecError),
}

/// `LinesCodec` that yields bad frames as items instead of failing the stream
struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn recover(decoded: Result<Option<String>, LinesCodecError>) -> io::Result<Option<Frame>> {
        match decoded {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(LinesCodecError::Io(e)) => Err(e),
            Err(e) => Ok(Some(Frame::Unreadable(e))),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        Self::recover(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Frame>> {
        Self::recover(self.lines.decode_eof(buf))
    }
}

/// Transport-agnostic MCP server: turns JSON-RPC requests into responses.
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            info: ServerInfo {
                name: "marketing-miner-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            if request.method == methods::INITIALIZED {
                debug!("Client finished initialization");
            } else {
                debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        };

        let response = match request.method.as_str() {
            methods::INITIALIZE => self.initialize(id, request.params),
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::TOOLS_LIST => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.registry.list_schemas(),
                },
            ),
            methods::TOOLS_CALL => self.call_tool(id, request.params).await,
            other => {
                debug!(method = other, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        };

        Some(response)
    }

    /// Handle an already-decoded JSON message.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!(error = %e, "Invalid JSON-RPC request");
                Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()))
            }
        }
    }

    /// Handle one raw frame.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC message");
                Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
            }
        }
    }

    fn initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params {
            Some(params) => match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                    )
                }
            },
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!(client = %client.name, version = %client.version, "Client connected");
        }

        JsonRpcResponse::success(
            id,
            InitializeResult {
                protocol_version: params
                    .protocol_version
                    .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: false,
                    }),
                },
                server_info: self.info.clone(),
            },
        )
    }

    async fn call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                )
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tools/call params"),
                )
            }
        };

        debug!(tool = %params.name, "Tool call");
        match self.registry.call(&params.name, params.arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call rejected");
                JsonRpcResponse::error(id, e.to_rpc_error())
            }
        }
    }

    /// Serve newline-delimited JSON-RPC over a reader/writer pair until EOF.
    ///
    /// A frame that is not UTF-8 or exceeds [`MAX_FRAME_LENGTH`] is answered
    /// with a parse error; only I/O failures end the session.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.serve_with_limit(reader, writer, MAX_FRAME_LENGTH).await
    }

    async fn serve_with_limit<R, W>(&self, reader: R, writer: W, max_frame: usize) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FramedRead::new(reader, FrameCodec::new(max_frame));
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        while let Some(frame) = frames.next().await {
            let response = match frame.context("Failed to read from transport")? {
                Frame::Line(line) if line.trim().is_empty() => continue,
                Frame::Line(line) => self.handle_line(&line).await,
                Frame::Unreadable(e) => {
                    warn!(error = %e, "Discarding unreadable frame");
                    Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
                }
            };

            if let Some(response) = response {
                let json = serde_json::to_string(&response)
                    .context("Failed to serialize response")?;
                sink.send(json).await.context("Failed to write response")?;
            }
        }

        info!("Transport closed");
        Ok(())
    }

    /// Serve a single client on stdin/stdout for the lifetime of the process.
    pub async fn serve_stdio(&self) -> Result<()> {
        info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CallToolResult;
    use crate::tools::{json_schema_object, Tool, ToolError};
    use crate::protocol::ToolSchema;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct FailingTool;

    #[async_trait::async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "strict".to_string(),
                description: "Rejects every call".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<CallToolResult, ToolError> {
            Err(ToolError::InvalidArgument("Unsupported language: de".to_string()))
        }
    }

    struct GreetTool;

    #[async_trait::async_trait]
    impl Tool for GreetTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "greet".to_string(),
                description: "Says hello".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<CallToolResult, ToolError> {
            Ok(CallToolResult::text("hello"))
        }
    }

    fn create_server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        registry.register(Arc::new(GreetTool));
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let server = create_server();
        let resp = server
            .handle_request(JsonRpcRequest::new(
                1,
                methods::INITIALIZE,
                json!({"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "t", "version": "1"}}),
            ))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "marketing-miner-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = create_server();
        assert!(server
            .handle_request(JsonRpcRequest::notification(methods::INITIALIZED))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_null_id_request_is_answered() {
        let server = create_server();
        let resp = server
            .handle_line(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_tools_list_is_sorted() {
        let server = create_server();
        let resp = server
            .handle_request(JsonRpcRequest::new(2, methods::TOOLS_LIST, json!({})))
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].clone();
        assert_eq!(tools[0]["name"], "greet");
        assert_eq!(tools[1]["name"], "strict");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let server = create_server();
        let resp = server
            .handle_request(JsonRpcRequest::new(
                3,
                methods::TOOLS_CALL,
                json!({"name": "get_weather", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert!(resp.result.is_none());
        let error = resp.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INVALID_PARAMS);
        assert_eq!(error.message, "Unknown tool: get_weather");
    }

    #[tokio::test]
    async fn test_invalid_argument_is_protocol_error() {
        let server = create_server();
        let resp = server
            .handle_request(JsonRpcRequest::new(
                4,
                methods::TOOLS_CALL,
                json!({"name": "strict", "arguments": {"lang": "de"}}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().message, "Unsupported language: de");
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_frames() {
        let server = create_server();

        let resp = server
            .handle_request(JsonRpcRequest::new(5, "resources/list", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let resp = server.handle_line("{oops").await.unwrap();
        assert_eq!(resp.id, Value::Null);
        assert_eq!(resp.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        let resp = server.handle_line(r#"{"id": 9, "params": {}}"#).await.unwrap();
        assert_eq!(resp.id, json!(9));
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_over_duplex() {
        let server = create_server();
        let (client, transport) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(transport);

        let handle = tokio::spawn(async move { server.serve(reader, writer).await });

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut responses = BufReader::new(client_read).lines();

        let messages = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "greet", "arguments": {}}}),
        ];
        for message in &messages {
            client_write
                .write_all(format!("{}\n", message).as_bytes())
                .await
                .unwrap();
        }

        let first: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["id"], 1);

        // The notification produced nothing, so the next frame answers request 2
        let second: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second["id"], 2);
        assert_eq!(second["result"]["content"][0]["text"], "hello");

        drop(client_write);
        drop(responses);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_frames_do_not_end_the_session() {
        let server = create_server();
        let (client, transport) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(transport);

        let handle = tokio::spawn(async move { server.serve_with_limit(reader, writer, 64).await });

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut responses = BufReader::new(client_read).lines();

        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"x\":\"\xff\"}\n".to_vec();
        input.extend_from_slice(&[b'a'; 200]);
        input.push(b'\n');
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        client_write.write_all(&input).await.unwrap();

        for _ in 0..2 {
            let rejected: Value =
                serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(rejected["id"], Value::Null);
            assert_eq!(rejected["error"]["code"], JsonRpcError::PARSE_ERROR);
        }

        let answered: Value = serde_json::from_str(&responses.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(answered["id"], 2);
        assert_eq!(answered["result"], json!({}));

        drop(client_write);
        drop(responses);
        handle.await.unwrap().unwrap();
    }
}
