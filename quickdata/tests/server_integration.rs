//! A scripted JSON-RPC session against the MCP server.

mod common;

use common::data_dir;
use quickdata::config::{OutputConfig, ServerConfig};
use quickdata::server::McpServer;
use serde_json::{json, Value};

fn request(id: u64, method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
}

fn tool(id: u64, name: &str, arguments: Value) -> String {
    request(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

/// Text payload of a `tools/call` result, parsed as JSON.
fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

async fn run_session(server: &McpServer, lines: &[String]) -> Vec<Value> {
    let input = lines.join("\n") + "\n";
    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_session() {
    let dir = data_dir();
    let config = ServerConfig::default().with_output(OutputConfig::under(dir.path().join("out")));
    let server = McpServer::new(config);
    let sales = dir.path().join("sales.csv");

    let lines = vec![
        request(1, "initialize", json!({"protocolVersion": "2024-11-05", "capabilities": {}})),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
        request(2, "tools/list", json!({})),
        tool(3, "load_dataset", json!({"file_path": sales, "dataset_name": "sales"})),
        tool(4, "segment_by_column", json!({"dataset_name": "sales", "column_name": "category"})),
        request(5, "resources/read", json!({"uri": "analytics://current_dataset"})),
        request(6, "resources/read", json!({"uri": "datasets://sales/schema"})),
        request(7, "prompts/get", json!({"name": "dataset_first_look", "arguments": {"dataset_name": "sales"}})),
        tool(8, "find_correlations", json!({"dataset_name": "sales", "columns": ["value"]})),
        tool(9, "clear_all_datasets", json!({})),
        request(10, "resources/read", json!({"uri": "datasets://loaded"})),
    ];
    let responses = run_session(&server, &lines).await;
    assert_eq!(responses.len(), 10);
    let by_id = |id: u64| {
        responses
            .iter()
            .find(|r| r["id"] == json!(id))
            .unwrap_or_else(|| panic!("no response for id {id}"))
    };

    assert_eq!(by_id(1)["result"]["capabilities"]["tools"]["listChanged"], false);

    let tools = by_id(2)["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "load_dataset"));
    assert!(tools.iter().any(|t| t["name"] == "resource_datasets_loaded"));

    let loaded = tool_payload(by_id(3));
    assert_eq!(loaded["status"], "loaded");
    assert_eq!(loaded["rows"], 5);

    let segments = tool_payload(by_id(4));
    assert_eq!(segments["segment_count"], 3);

    let current: Value =
        serde_json::from_str(by_id(5)["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(current["current_dataset"], "sales");

    let schema: Value =
        serde_json::from_str(by_id(6)["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(schema["row_count"], 5);

    let prompt = &by_id(7)["result"]["messages"][0];
    assert_eq!(prompt["role"], "user");
    assert!(prompt["content"]["text"].as_str().unwrap().contains("sales"));

    let correlation = tool_payload(by_id(8));
    assert!(correlation["error"].as_str().unwrap().contains("two"));
    assert_eq!(by_id(8)["result"]["isError"], false);

    let cleared = tool_payload(by_id(9));
    assert_eq!(cleared["status"], "success");

    let listing: Value =
        serde_json::from_str(by_id(10)["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(listing["total_datasets"], 0);
}

#[tokio::test]
async fn test_tool_mirrors_match_resources() {
    let dir = data_dir();
    let server = McpServer::new(ServerConfig::default());
    let orders = dir.path().join("orders.json");

    let lines = vec![
        tool(1, "load_dataset", json!({"file_path": orders, "dataset_name": "orders"})),
        tool(2, "resource_datasets_sample", json!({"dataset_name": "orders", "n_rows": 2})),
        request(3, "resources/read", json!({"uri": "datasets://orders/sample"})),
        tool(4, "resource_analytics_column_types", json!({})),
        request(5, "resources/read", json!({"uri": "unknown://thing"})),
        tool(6, "no_such_tool", json!({})),
    ];
    let responses = run_session(&server, &lines).await;

    let mirrored = tool_payload(&responses[1]);
    assert_eq!(mirrored.as_array().unwrap().len(), 2);
    let read: Value =
        serde_json::from_str(responses[2]["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(read.as_array().unwrap().len(), 5);

    let types = tool_payload(&responses[3]);
    assert_eq!(types["column_types"]["amount"], "numerical");

    assert_eq!(responses[4]["error"]["code"], -32602);
    assert_eq!(responses[5]["error"]["code"], -32602);
}
