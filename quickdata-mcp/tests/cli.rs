//! Runs the server binary over pipes.

use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn run(input: &str, extra_args: &[&str]) -> (Vec<Value>, std::process::ExitStatus) {
    let output_dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_quickdata-mcp"))
        .arg("--output-dir")
        .arg(output_dir.path())
        .args(extra_args)
        .env_remove("LOG_LEVEL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn server");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let responses = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout carries only JSON-RPC"))
        .collect();
    (responses, output.status)
}

#[test]
fn test_ping_and_initialize() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{}}"#,
        "\n",
    );
    let (responses, status) = run(input, &[]);
    assert!(status.success());
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["result"]["protocolVersion"], "2024-11-05");
}

#[test]
fn test_logs_stay_off_stdout() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"list_loaded_datasets","arguments":{}}}"#,
        "\n",
    );
    let (responses, status) = run(input, &["--log-level", "debug", "--log-tool-calls"]);
    assert!(status.success());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"]["isError"], false);
}

#[test]
fn test_rejects_unknown_log_level() {
    let (responses, status) = run("", &["--log-level", "chatty"]);
    assert!(!status.success());
    assert!(responses.is_empty());
}
