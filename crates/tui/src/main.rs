mod app;

use anyhow::{bail, Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use gtanext_core::{
    api::METHODS,
    config::{self, AppConfig},
    Backend,
};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "gtanext",
    version,
    about = "Game library and launcher for GTA III, Vice City and San Andreas"
)]
struct Cli {
    /// Settings file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open the terminal launcher (default).
    Tui,
    /// Invoke a backend method and print its JSON result.
    Call {
        /// Method name, e.g. `get_games` or `add_game`.
        method: String,
        /// Arguments as JSON.
        params: Option<String>,
    },
    /// Probe for the runtimes the launcher depends on.
    CheckEnv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Tui);
    init_logging(&config.log_dir, !matches!(command, Command::Tui))?;
    info!(
        data_dir = %config.data_dir.display(),
        registry = %config.registry_path().display(),
        "Configuration loaded"
    );

    let backend = Backend::from_config(&config);
    backend
        .initialize()
        .context("failed to prepare data documents")?;

    match command {
        Command::Tui => {
            let warning = backend.check_environment().warning();
            if let Some(message) = &warning {
                warn!(%message, "Environment check failed");
                if config.check_environment {
                    bail!("{message}");
                }
            }
            let mut app = app::LauncherApp::new(backend, warning);
            app.run().await
        }
        Command::Call { method, params } => {
            if !METHODS.contains(&method.as_str()) {
                warn!(%method, "Unknown method requested");
            }
            let params = match params {
                Some(raw) => serde_json::from_str(&raw)
                    .with_context(|| format!("arguments for {method} are not valid JSON"))?,
                None => Value::Null,
            };
            let result = backend.call(&method, params);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::CheckEnv => {
            let report = backend.check_environment();
            println!("{}", serde_json::to_string_pretty(&report)?);
            match report.warning() {
                Some(message) => bail!("{message}"),
                None => Ok(()),
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => {
            config::ensure_config_at(path)?;
            path.to_path_buf()
        }
        None => config::ensure_default_config()?,
    };
    AppConfig::load_from(&path)
}

fn init_logging(log_dir: &Path, to_stderr: bool) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("gtanext.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
