use clap::Parser;
use receipt_points::{CliArgs, LoggingConfig, ServerConfig, init_logging, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = ServerConfig::from_args(cli)?;

    // Fail fast on settings the server cannot run with.
    config.validate()?;

    // Spans are flushed by the server's shutdown handlers.
    run_server(config).await
}
