//! Chama daemon: entry point for running a chama node.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chama_node::{check_database, init_logging, ChamaConfig, ChamaNode, LogFormat};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chama-daemon", about = "Chama governance and ledger node")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "CHAMA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, env = "CHAMA_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log level filter, e.g. "info" or "debug,chama_meetings=trace".
    #[arg(long, env = "CHAMA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CHAMA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Seconds between scheduler ticks.
    #[arg(long, env = "CHAMA_TICK_INTERVAL_SECS")]
    tick_interval_secs: Option<u64>,

    /// Conferencing server URL (ws:// or wss://).
    #[arg(long, env = "CHAMA_CONFERENCING_WS_URL")]
    conferencing_url: Option<String>,

    #[arg(long, env = "CHAMA_CONFERENCING_API_KEY")]
    conferencing_api_key: Option<String>,

    #[arg(long, env = "CHAMA_CONFERENCING_API_SECRET", hide_env_values = true)]
    conferencing_api_secret: Option<String>,

    /// Endpoint receiving notifications as JSON POSTs.
    #[arg(long, env = "CHAMA_WEBHOOK_URL")]
    webhook_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT or SIGTERM.
    Run,
    /// Verify the ledger invariants and exit non-zero on violations.
    Check,
    /// Print the effective configuration as TOML.
    PrintConfig,
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<ChamaConfig> {
        let mut config = match &self.config {
            Some(path) => ChamaConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ChamaConfig::default(),
        };
        if let Some(path) = &self.db_path {
            config.store.path = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(secs) = self.tick_interval_secs {
            config.scheduler.tick_interval_secs = secs;
        }
        if let Some(url) = &self.conferencing_url {
            config.conferencing.ws_url = url.clone();
        }
        if let Some(key) = &self.conferencing_api_key {
            config.conferencing.api_key = key.clone();
        }
        if let Some(secret) = &self.conferencing_api_secret {
            config.conferencing.api_secret = secret.clone();
        }
        if let Some(url) = &self.webhook_url {
            config.notifications.webhook_url = Some(url.clone());
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    if let Command::PrintConfig = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;

    match cli.command {
        Command::Run => {
            tracing::info!(
                db = %config.store.path.display(),
                tick_secs = config.scheduler.tick_interval_secs,
                "starting chama node"
            );
            let mut node = ChamaNode::open(config)?;
            node.run_until_signal().await?;
            tracing::info!("chama daemon exited cleanly");
        }
        Command::Check => {
            let report = check_database(&config)?;
            tracing::info!(
                tables = report.tables_checked,
                rows = report.total_rows,
                "integrity check finished"
            );
            if !report.is_healthy() {
                for error in &report.errors {
                    tracing::error!("{error}");
                }
                bail!("{} integrity violation(s)", report.errors.len());
            }
        }
        Command::PrintConfig => {}
    }

    Ok(())
}
