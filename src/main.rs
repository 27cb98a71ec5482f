use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobwatch::cli::{Cli, Command};
use jobwatch::config::{DEFAULT_CONFIG_PATH, WatchConfig};
use jobwatch::jobs;
use jobwatch::observer::{Monitor, MonitorState};
use jobwatch::remote::JulesClient;
use jobwatch::tailer::{CommandHandler, EventTailer, WatcherState};
use jobwatch::ui::StatusView;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("JOBWATCH_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = WatchConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    match &cli.command {
        Command::Monitor { once, .. } => {
            let (settings, api_base) = config.monitor_settings(cli.command.monitor_overrides())?;
            let client =
                JulesClient::with_base_url(api_base, config.api_token.clone(), config.request_timeout())?;
            let mut monitor = Monitor::new(client, settings)?;
            monitor.run(*once).await;
        }
        Command::Watch { once, .. } => {
            let (settings, command) = config.watcher_settings(cli.command.watcher_overrides())?;
            info!(handler = %command, "Using handler command");
            let mut tailer = EventTailer::new(CommandHandler::new(command), settings)?;
            tailer.run(*once).await;
        }
        Command::Register {
            job_id,
            jobs: jobs_path,
            metadata,
        } => {
            let path = jobs_path
                .clone()
                .or_else(|| config.jobs_path.clone())
                .context("jobs_path must be provided via --jobs or config")?;
            let metadata = match metadata {
                Some(raw) => {
                    let value: serde_json::Value =
                        serde_json::from_str(raw).context("--metadata must be valid JSON")?;
                    if !value.is_object() {
                        bail!("--metadata must be a JSON object");
                    }
                    Some(value)
                }
                None => None,
            };
            let entry = jobs::register_job(&path, job_id, metadata)?;
            println!("Registered {} in {}", entry.job_id, path.display());
        }
        Command::Status {
            state,
            watcher_state,
        } => {
            let monitor_path = state.clone().unwrap_or_else(|| config.monitor_state_path.clone());
            let watcher_path = watcher_state
                .clone()
                .unwrap_or_else(|| config.watcher_state_path.clone());
            let monitor = MonitorState::load(&monitor_path)?;
            let watcher = WatcherState::load(&watcher_path)?;
            StatusView::default().print(&monitor, &watcher);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
