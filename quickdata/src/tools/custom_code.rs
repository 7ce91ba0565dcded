//! Runs caller-supplied code against a dataset in a child process.
//!
//! The child gets the dataset as newline-delimited JSON on stdin, an empty
//! environment apart from `PATH`, a private temporary working directory and
//! a wall-clock limit. It is killed when the limit expires or the call is
//! dropped. Isolation beyond that (network, filesystem) is left to the host.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::SandboxConfig;
use crate::error::{AnalyticsError, Result};
use crate::registry::DatasetRegistry;
use crate::security::CodeSecurity;
use crate::table::Table;

const USER_CODE_PLACEHOLDER: &str = "{user_code}";

pub struct CodeExecutor {
    config: SandboxConfig,
}

impl CodeExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Embeds the fragment into the preamble, indented one level.
    pub fn render_script(&self, code: &str) -> String {
        match &self.config.preamble {
            None => code.to_string(),
            Some(preamble) => {
                let indented = code
                    .lines()
                    .map(|line| {
                        if line.trim().is_empty() {
                            String::new()
                        } else {
                            format!("    {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                preamble.replace(USER_CODE_PLACEHOLDER, &indented)
            }
        }
    }

    fn timeout_message(&self) -> String {
        format!(
            "TIMEOUT ERROR: Code execution exceeded the {}-second limit.",
            self.config.timeout.as_secs()
        )
    }

    /// Executes `code` with `table` piped to stdin.
    ///
    /// Returns stdout followed by stderr, or the timeout message. Errors are
    /// failures to start the child.
    pub async fn run(&self, table: &Table, code: &str) -> Result<String> {
        CodeSecurity::validate_fragment(code, self.config.max_code_length)?;
        let payload = table.to_ndjson()?;
        let script = self.render_script(code);
        let workdir = tempfile::tempdir()?;

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(script)
            .env_clear()
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AnalyticsError::Internal("child stdin was not captured".to_string()))?;
        // the child may exit without reading its input
        let writer = tokio::spawn(async move {
            if let Err(err) = stdin.write_all(&payload).await {
                debug!(error = %err, "Child closed stdin early");
            }
            let _ = stdin.shutdown().await;
        });

        let result = tokio::time::timeout(self.config.timeout, child.wait_with_output()).await;
        writer.abort();
        match result {
            Ok(output) => {
                let output = output?;
                debug!(status = ?output.status, "Custom code finished");
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(text)
            }
            Err(_) => {
                warn!(timeout = ?self.config.timeout, "Custom code timed out");
                Ok(self.timeout_message())
            }
        }
    }
}

/// Runs `code` against a loaded dataset and returns the combined output.
///
/// Never fails: setup problems (unknown dataset, rejected fragment, missing
/// interpreter) come back as `EXECUTION SETUP ERROR: …`.
#[instrument(skip(registry, sandbox, code), fields(code_len = code.len()))]
pub async fn execute_custom_analytics_code(
    registry: &DatasetRegistry,
    sandbox: &SandboxConfig,
    dataset_name: &str,
    code: &str,
) -> String {
    let executor = CodeExecutor::new(sandbox.clone());
    let result = match registry.get(dataset_name).await {
        Ok(table) => executor.run(&table, code).await,
        Err(err) => Err(err),
    };
    result.unwrap_or_else(|err| format!("EXECUTION SETUP ERROR: {err}"))
}
