// MCP Server - JSON-RPC handler
use crate::{
    bitbucket::Dialect,
    errors::{McpError, McpResult},
    mcp::types::*,
    tools::ToolManager,
};
use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "bitbucket-mcp-server";

pub struct McpServer {
    tools: ToolManager,
    dialect: Dialect,
}

impl McpServer {
    pub fn new(tools: ToolManager, dialect: Dialect) -> Self {
        Self { tools, dialect }
    }

    pub async fn run(self) -> Result<()> {
        info!("🔗 Bitbucket MCP Server starting on stdio");
        info!(
            "🔌 {} tools enabled against Bitbucket {}",
            self.tools.tool_count(),
            self.dialect.label()
        );

        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Answer newline-delimited requests from `reader` until EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("📨 Received request: {}", line);

            let Some(response) = self.handle_message(line).await else {
                continue;
            };

            let response_str = serde_json::to_string(&response)?;
            debug!("📤 Sending response: {}", response_str);

            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        info!("MCP Server shutting down");
        Ok(())
    }

    /// One request line in, at most one response out.
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(e) => {
                error!("❌ Unparsable request: {}", e);
                let err = McpError::ParseError(e.to_string());
                return Some(JsonRpcResponse::failure(None, err.to_jsonrpc_error()));
            }
        };

        if request.id.is_none() {
            debug!(method = %request.method, "Notification received");
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            _ => Err(McpError::ToolNotFound(format!(
                "Unknown method: {}",
                request.method
            ))),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                warn!(method = %request.method, error = %e, "Request failed");
                JsonRpcResponse::failure(request.id, e.to_jsonrpc_error())
            }
        })
    }

    fn initialize(&self, params: Option<Value>) -> McpResult<Value> {
        info!("🔧 Initializing MCP connection");

        let client_info = params
            .and_then(|p| p.get("clientInfo").cloned())
            .and_then(|c| serde_json::from_value::<ClientInfo>(c).ok());

        if let Some(info) = &client_info {
            info!("👤 Client: {} v{}", info.name, info.version);
        }

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    fn list_tools(&self) -> McpResult<Value> {
        let tools = self.tools.list_all_tools();
        Ok(json!({ "tools": tools }))
    }

    async fn call_tool(&self, params: Option<Value>) -> McpResult<Value> {
        let call_request: ToolCallRequest = serde_json::from_value(
            params.ok_or_else(|| McpError::InvalidArguments("Missing params".to_string()))?,
        )
        .map_err(|e| McpError::InvalidArguments(format!("Invalid tools/call params: {e}")))?;

        info!("🛠️ Calling tool {}", call_request.name);

        let tool_result = match self
            .tools
            .call_tool(&call_request.name, call_request.arguments)
            .await
        {
            Ok(result) => ToolCallResult::success(serde_json::to_string_pretty(&result)?),
            // Bitbucket failures are reported to the model, not as protocol errors
            Err(McpError::ProviderError(message)) => ToolCallResult::error(message),
            Err(e) => return Err(e),
        };

        Ok(serde_json::to_value(tool_result)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bitbucket::{ApiError, DiffSource, NewComment, PostedComment, PullRequestRef};
    use crate::diff::ConfidenceWeights;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl DiffSource for Unreachable {
        fn dialect(&self) -> Dialect {
            Dialect::Cloud
        }

        async fn fetch_diff(&self, _: &PullRequestRef, _: u32) -> Result<String, ApiError> {
            Err(ApiError::Status {
                status: 404,
                message: "gone".to_string(),
            })
        }

        async fn post_comment(
            &self,
            _: &PullRequestRef,
            _: &NewComment,
        ) -> Result<PostedComment, ApiError> {
            Err(ApiError::Status {
                status: 500,
                message: "down".to_string(),
            })
        }
    }

    fn server() -> McpServer {
        let tools = ToolManager::new(Arc::new(Unreachable), ConfidenceWeights::default());
        McpServer::new(tools, Dialect::Cloud)
    }

    async fn call(server: &McpServer, message: Value) -> Value {
        let response = server.handle_message(&message.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server() {
        let response = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"clientInfo": {"name": "test", "version": "0.1"}}}),
        )
        .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn lists_both_tools_with_schemas() {
        let response = call(&server(), json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).await;

        let tools = response["result"]["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["get_pull_request_diff", "add_comment"]);
        assert_eq!(tools[1]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();

        let unknown = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
        assert_eq!(unknown["error"]["code"], -32601);

        let garbage = server.handle_message("{not json").await.unwrap();
        assert_eq!(garbage.error.unwrap().code, -32700);

        let missing = call(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call"})).await;
        assert_eq!(missing["error"]["code"], -32602);

        let no_tool = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "merge", "arguments": {}}}),
        )
        .await;
        assert_eq!(no_tool["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let reply = server()
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn api_failures_become_tool_errors() {
        let response = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {
                "name": "get_pull_request_diff",
                "arguments": {"workspace": "ws", "repository": "repo", "pull_request_id": 3}
            }}),
        )
        .await;

        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(
            response["result"]["content"][0]["text"],
            "Not found: getting diff for pull request 3 in ws/repo"
        );
    }

    #[tokio::test]
    async fn serve_writes_one_line_per_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n"
        );
        let mut output = Vec::new();

        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["id"], 2);
        assert_eq!(lines[1]["result"], json!({}));
    }
}
