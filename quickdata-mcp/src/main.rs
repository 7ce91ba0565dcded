//! quickdata MCP server
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout. Logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use quickdata::config::{OutputConfig, SandboxConfig, ServerConfig};
use quickdata::logging::{parse_level, setup, LogConfig};
use quickdata::server::McpServer;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level for quickdata (overrides LOG_LEVEL)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Log every tool call with its arguments
    #[arg(long)]
    log_tool_calls: bool,

    /// Root directory for generated charts and reports
    #[arg(long, env = "QUICKDATA_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Interpreter used by execute_custom_analytics_code
    #[arg(long, default_value = "python3")]
    python: String,

    /// Wall-clock limit for custom code, in seconds
    #[arg(long, default_value_t = 30)]
    code_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = ServerConfig::from_env();

    let level_name = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    let level = parse_level(&level_name).ok_or_else(|| anyhow!("unknown log level '{level_name}'"))?;
    setup::init_logging(
        setup::LoggingConfig::default()
            .with_quickdata_level(level)
            .with_json_format(args.json_logs),
    )
    .map_err(|err| anyhow!("failed to initialise logging: {err}"))?;

    if let Some(root) = &args.output_dir {
        config = config.with_output(OutputConfig::under(root));
    }
    config = config.with_sandbox(SandboxConfig {
        program: args.python.clone(),
        timeout: Duration::from_secs(args.code_timeout),
        ..SandboxConfig::default()
    });
    config.analytics.validate().context("invalid analytics configuration")?;

    let mut log = if level == Level::TRACE || level == Level::DEBUG {
        LogConfig::verbose()
    } else if args.json_logs {
        LogConfig::production()
    } else {
        LogConfig::default()
    };
    log.base_level = level;
    log.log_tool_calls |= args.log_tool_calls;
    info!(
        charts = %config.output.charts_dir.display(),
        reports = %config.output.reports_dir.display(),
        "Starting quickdata MCP server"
    );

    McpServer::new(config)
        .with_log_config(log)
        .serve_stdio()
        .await
        .context("MCP server stopped with an error")?;
    Ok(())
}
