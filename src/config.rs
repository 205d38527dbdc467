use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_HTTP_BIND: &str = "0.0.0.0:3000";
const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024;
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub max_body_bytes: usize,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: default_bind_address(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            graceful_shutdown_timeout_secs: DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            port: cli_port,
            max_body_bytes: cli_max_body_bytes,
            graceful_shutdown_timeout_secs: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            port: file_port,
            max_body_bytes: file_max_body_bytes,
            graceful_shutdown_timeout_secs: file_shutdown_timeout,
        } = file_config;

        let mut http_bind_address = cli_http_bind
            .or(file_http_bind)
            .unwrap_or_else(default_bind_address);
        if let Some(port) = cli_port.or(file_port) {
            http_bind_address.set_port(port);
        }

        let max_body_bytes = cli_max_body_bytes
            .or(file_max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let graceful_shutdown_timeout_secs = cli_shutdown_timeout
            .or(file_shutdown_timeout)
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECS);

        Ok(Self {
            http_bind_address,
            max_body_bytes,
            graceful_shutdown_timeout_secs,
        })
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_body_bytes > 0,
            "max body size must be greater than zero"
        );
        anyhow::ensure!(
            self.graceful_shutdown_timeout_secs > 0,
            "graceful shutdown timeout must be greater than zero"
        );
        Ok(())
    }
}

fn default_bind_address() -> SocketAddr {
    DEFAULT_HTTP_BIND
        .parse()
        .expect("default bind address valid")
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "receipt-points",
    about = "Receipt validation and reward points service",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "RECEIPT_POINTS_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "PORT",
        value_name = "PORT",
        help = "Override the port of the bind address",
        value_parser = clap::value_parser!(u16)
    )]
    pub port: Option<u16>,

    #[arg(
        long,
        env = "RECEIPT_POINTS_MAX_BODY_BYTES",
        value_name = "BYTES",
        help = "Largest accepted request body",
        value_parser = clap::value_parser!(usize)
    )]
    pub max_body_bytes: Option<usize>,

    #[arg(
        long,
        env = "RECEIPT_POINTS_SHUTDOWN_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Upper bound on graceful shutdown",
        value_parser = clap::value_parser!(u64)
    )]
    pub graceful_shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    port: Option<u16>,
    max_body_bytes: Option<usize>,
    graceful_shutdown_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
