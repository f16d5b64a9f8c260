//! MCP server implementation.
//!
//! The server handles the MCP protocol lifecycle:
//! 1. Initialize - exchange capabilities
//! 2. Handle tool calls - forward them to the HTTP API
//! 3. Shutdown - stop at EOF on stdin

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::handlers::ToolHandler;
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability, ToolsListResult, MCP_VERSION,
    SERVER_NAME,
};
use crate::transport::{IncomingMessage, StdioTransport};

/// MCP server for TicketBuddy.
pub struct McpServer {
    handler: ToolHandler,
    initialized: bool,
}

impl McpServer {
    /// Create a server whose tools call the API behind `api`.
    pub fn new(api: ApiClient) -> Self {
        Self {
            handler: ToolHandler::new(api),
            initialized: false,
        }
    }

    /// Run the MCP server over stdin/stdout until EOF.
    pub async fn run(&mut self) -> ticketbuddy_core::Result<()> {
        self.serve(StdioTransport::stdio()).await
    }

    /// Run the main loop over an arbitrary transport.
    pub async fn serve(&mut self, mut transport: StdioTransport) -> ticketbuddy_core::Result<()> {
        info!(api = self.handler.api().base_url(), "Starting MCP server");

        loop {
            match transport.read_message() {
                Ok(Some(msg)) => {
                    if let Some(resp) = self.handle_message(msg).await {
                        if let Err(e) = transport.write_response(&resp) {
                            error!("Failed to write response: {}", e);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    info!("EOF received, shutting down");
                    break;
                }
                Err(e) => {
                    warn!("Transport error: {}", e);
                    let error_resp = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(&e.to_string()),
                    );
                    if transport.write_response(&error_resp).is_err() {
                        break;
                    }
                }
            }
        }

        info!("MCP server stopped");
        Ok(())
    }

    async fn handle_message(&mut self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(&notif.method);
                None
            }
        }
    }

    async fn handle_request(&mut self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %req.method, id = ?req.id, "Handling request");

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id, req.params),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            "ping" => JsonRpcResponse::success(req.id, serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(method))
            }
        }
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => debug!("Request cancelled by client"),
            other => debug!("Ignoring notification: {}", other),
        }
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if self.initialized {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Server already initialized"),
            );
        }

        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init) => info!(
                    client = %init.client_info.name,
                    version = %init.client_info.version,
                    protocol = %init.protocol_version,
                    "Client connected"
                ),
                Err(e) => warn!("Failed to parse initialize params: {}", e),
            }
        }

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        JsonRpcResponse::from_result(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.handler.available_tools(),
        };
        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(&e.to_string()),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
            }
        };

        info!(tool = %params.name, "Calling tool");

        let result = self.handler.execute(&params.name, params.arguments).await;
        JsonRpcResponse::from_result(id, &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JSONRPC_VERSION;
    use crate::transport::tests::SharedWriter;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::Cursor;

    fn server() -> McpServer {
        McpServer::new(ApiClient::new("http://127.0.0.1:1"))
    }

    fn request(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(id),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize_once() {
        let mut server = server();

        let resp = server
            .handle_request(request(
                1,
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "1.0.0"}
                })),
            ))
            .await;

        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "ticketbuddy");
        assert_eq!(result["protocolVersion"], MCP_VERSION);
        assert!(server.initialized);

        let again = server.handle_request(request(2, "initialize", None)).await;
        assert_eq!(again.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let mut server = server();

        let pong = server.handle_request(request(1, "ping", None)).await;
        assert_eq!(pong.result, Some(json!({})));

        let resp = server.handle_request(request(2, "resources/list", None)).await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_call_requires_params() {
        let mut server = server();
        let resp = server.handle_request(request(1, "tools/call", None)).await;
        assert_eq!(resp.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_failure_is_a_result_not_an_rpc_error() {
        let mut server = server();

        let resp = server
            .handle_request(request(
                1,
                "tools/call",
                Some(json!({"name": "list_tickets", "arguments": {}})),
            ))
            .await;

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: API request failed"));
    }

    #[tokio::test]
    async fn test_stdio_session_round_trip() {
        let api = MockServer::start();
        api.mock(|when, then| {
            when.method(GET).path("/github/summary");
            then.status(200)
                .json_body(json!({"connected": true, "repo": {"id": "octo/shop"}}));
        });

        let input = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "inspector", "version": "0.1.0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
                "name": "github_summary"
            }}),
        ]
        .iter()
        .map(|m| format!("{}\n", m))
        .collect::<String>()
            + "this is not json\n";

        let output = SharedWriter::default();
        let transport = StdioTransport::new(Box::new(Cursor::new(input)), Box::new(output.clone()));

        let mut server = McpServer::new(ApiClient::new(api.base_url()));
        server.serve(transport).await.unwrap();

        let written = String::from_utf8(output.0.lock().unwrap().clone()).unwrap();
        let responses: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        // One response per request; the notification gets none.
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 13);

        let text = responses[2]["result"]["content"][0]["text"].as_str().unwrap();
        let summary: Value = serde_json::from_str(text).unwrap();
        assert_eq!(summary["repo"]["id"], "octo/shop");

        assert_eq!(responses[3]["id"], Value::Null);
        assert_eq!(responses[3]["error"]["code"], JsonRpcError::PARSE_ERROR);
    }
}
