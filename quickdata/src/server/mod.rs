//! MCP server over newline-delimited JSON-RPC 2.0.
//!
//! One request per line on the reader, one response per line on the writer.
//! Notifications get no reply. Tool results are returned as a single text
//! block; soft analysis failures are ordinary results whose JSON carries an
//! `error` field, while unknown methods, malformed parameters and hard
//! lookups become JSON-RPC errors.

pub mod catalog;
pub mod dispatch;
pub mod protocol;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::logging::{truncate_field, LogConfig};
use crate::registry::DatasetRegistry;
use crate::resources::{self, ResourceUri, RESOURCES};

use catalog::{PROMPTS, TOOLS};
use dispatch::{call_tool, get_prompt};
use protocol::{Request, Response, RpcError, INVALID_REQUEST, PARSE_ERROR, PROTOCOL_VERSION};

const JSON_MIME: &str = "application/json";

/// Tools that change what is loaded.
const DATA_OPERATIONS: [&str; 4] = [
    "load_dataset",
    "clear_dataset",
    "clear_all_datasets",
    "merge_datasets",
];

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct ReadParams {
    uri: String,
}

#[derive(Deserialize)]
struct PromptParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

fn parse_params<T: for<'de> Deserialize<'de>>(value: Value) -> std::result::Result<T, RpcError> {
    serde_json::from_value(value).map_err(|err| RpcError::invalid_params(format!("Invalid params: {err}")))
}

/// Serves analytics tools, resources and prompts over one registry.
#[derive(Debug, Clone)]
pub struct McpServer {
    registry: DatasetRegistry,
    config: ServerConfig,
    log: LogConfig,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: DatasetRegistry::with_config(config.analytics.clone()),
            config,
            log: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handles one raw line. Returns the response line, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(err) => Some(Response::failure(
                None,
                RpcError::new(PARSE_ERROR, format!("Parse error: {err}")),
            )),
            Ok(value) => match serde_json::from_value::<Request>(value) {
                Err(err) => Some(Response::failure(
                    None,
                    RpcError::new(INVALID_REQUEST, format!("Invalid Request: {err}")),
                )),
                Ok(request) => self.handle_request(request).await,
            },
        };
        let response = response?;
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %err, "Failed to serialize response");
                None
            }
        }
    }

    /// Handles a parsed request. Notifications produce no response.
    pub async fn handle_request(&self, request: Request) -> Option<Response> {
        if request.jsonrpc.as_deref().is_some_and(|v| v != protocol::JSONRPC_VERSION) {
            warn!(version = ?request.jsonrpc, "Unexpected JSON-RPC version");
        }
        debug!(method = %request.method, "Handling request");
        let notification = request.is_notification();
        let id = request.id.clone();
        let result = self.dispatch(&request.method, request.params).await;
        if notification {
            if let Err(err) = &result {
                debug!(method = %request.method, error = %err.message, "Notification failed");
            }
            return None;
        }
        Some(match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize()),
            "notifications/initialized" | "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": &*TOOLS })),
            "tools/call" => self.call(parse_params::<ToolCallParams>(params)?).await,
            "resources/list" => Ok(json!({
                "resources": RESOURCES
                    .iter()
                    .filter(|r| !r.is_template())
                    .map(|r| json!({
                        "uri": r.uri,
                        "name": r.name,
                        "description": r.description,
                        "mimeType": JSON_MIME,
                    }))
                    .collect::<Vec<_>>(),
            })),
            "resources/templates/list" => Ok(json!({
                "resourceTemplates": RESOURCES
                    .iter()
                    .filter(|r| r.is_template())
                    .map(|r| json!({
                        "uriTemplate": r.uri,
                        "name": r.name,
                        "description": r.description,
                        "mimeType": JSON_MIME,
                    }))
                    .collect::<Vec<_>>(),
            })),
            "resources/read" => self.read(parse_params::<ReadParams>(params)?).await,
            "prompts/list" => Ok(json!({ "prompts": &*PROMPTS })),
            "prompts/get" => self.prompt(parse_params::<PromptParams>(params)?).await,
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {"listChanged": false},
                "resources": {"subscribe": false, "listChanged": false},
                "prompts": {"listChanged": false},
            },
            "serverInfo": {
                "name": self.config.settings.server_name,
                "version": self.config.settings.version,
            },
        })
    }

    #[instrument(skip(self, call), fields(tool = %call.name))]
    async fn call(&self, call: ToolCallParams) -> std::result::Result<Value, RpcError> {
        if self.log.log_tool_calls
            || (self.log.log_data_operations && DATA_OPERATIONS.contains(&call.name.as_str()))
        {
            info!(
                arguments = %truncate_field(&call.arguments.to_string(), self.log.max_field_length),
                "Tool call"
            );
        }
        let output = call_tool(&self.registry, &self.config, &call.name, call.arguments).await?;
        let text = output.into_text()?;
        Ok(json!({
            "content": [{"type": "text", "text": text}],
            "isError": false,
        }))
    }

    async fn read(&self, read: ReadParams) -> std::result::Result<Value, RpcError> {
        let uri: ResourceUri = read.uri.parse()?;
        let document = resources::read_resource(&self.registry, &self.config.settings, &uri).await?;
        Ok(json!({
            "contents": [{
                "uri": read.uri,
                "mimeType": JSON_MIME,
                "text": serde_json::to_string_pretty(&document).map_err(crate::error::AnalyticsError::from)?,
            }],
        }))
    }

    async fn prompt(&self, prompt: PromptParams) -> std::result::Result<Value, RpcError> {
        let text = get_prompt(&self.registry, &prompt.name, &prompt.arguments).await?;
        let description = PROMPTS
            .iter()
            .find(|p| p.name == prompt.name)
            .map(|p| p.description)
            .unwrap_or_default();
        Ok(json!({
            "description": description,
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": text},
            }],
        }))
    }

    /// Reads requests until EOF, writing one response line per request.
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
            if let Some(response) = self.handle_line(line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        info!("Input closed, shutting down");
        Ok(())
    }

    /// Serves on the process's stdin and stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        info!(
            server = %self.config.settings.server_name,
            version = %self.config.settings.version,
            "MCP server listening on stdio"
        );
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::sales_table;

    async fn call(server: &McpServer, request: Value) -> Value {
        let line = server.handle_line(&request.to_string()).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_notification() {
        let server = McpServer::new(ServerConfig::default());
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "Modular MCP Server");

        let none = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_error_codes() {
        let server = McpServer::new(ServerConfig::default());
        let response = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "bogus"})).await;
        assert_eq!(response["error"]["code"], -32601);

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"arguments": {}}}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32602);

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read",
                   "params": {"uri": "datasets://ghost/summary"}}),
        )
        .await;
        assert_eq!(response["error"]["code"], -32603);

        let line = server.handle_line("{not json").await.unwrap();
        assert!(line.contains("-32700"));
    }

    #[tokio::test]
    async fn test_tool_call_wraps_text() {
        let server = McpServer::new(ServerConfig::default());
        server.registry().load_table(sales_table(), "sales").await.unwrap();
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                   "params": {"name": "validate_data_quality", "arguments": {"dataset_name": "sales"}}}),
        )
        .await;
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let report: Value = serde_json::from_str(text).unwrap();
        assert_eq!(report["total_rows"], 5);
        assert_eq!(response["result"]["isError"], false);
    }

    #[tokio::test]
    async fn test_serve_over_buffers() {
        let server = McpServer::new(ServerConfig::default());
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"], json!({}));
        assert_eq!(lines[1]["result"]["resources"].as_array().unwrap().len(), 8);
    }
}
