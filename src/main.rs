use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use wallet_engine::config::{AppConfig, ConfigError};
use wallet_engine::csv::{CsvError, read_commands, write_wallets};
use wallet_engine::settings::{SharedSettings, watch_file};
use wallet_engine::store::MemoryStore;
use wallet_engine::{Collaborators, Engine, LedgerError};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(script) = args.next() else {
        eprintln!("usage: wallet-engine <commands.csv> [config.yaml]");
        return ExitCode::from(2);
    };
    let config_path = args.next().map(PathBuf::from);
    let config = match &config_path {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    if !script.ends_with(".csv") {
        warn!(path = %script, "input file seems to not be a csv file");
    }

    match run(&script, config, config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    script: &str,
    config: AppConfig,
    config_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let commands = read_commands(PathBuf::from(script))?;

    let settings = Arc::new(SharedSettings::new(config.fees.clone()));
    let collab = Collaborators {
        settings: settings.clone(),
        ..Collaborators::default()
    };
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        collab,
        config.platform_wallet()?,
        config.platform_account(),
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    let sweeper = tokio::spawn(engine.sweeper(interval).run(shutdown_rx.clone()));
    let watcher = config_path.map(|path| {
        let every = Duration::from_secs(config.reload_interval_secs.max(1));
        tokio::spawn(watch_file(settings, path, every, shutdown_rx))
    });

    let (cmd_sender, cmd_receiver) = mpsc::channel(16);
    let reader = tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if cmd_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let outcome = engine.run(ReceiverStream::new(cmd_receiver)).await;

    if let Err(e) = reader.await {
        error!(reason = %e, "command reader failed");
    }
    // background tasks only exit on shutdown, so a send error means they are gone already
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        error!(reason = %e, "expiry sweeper failed");
    }
    if let Some(watcher) = watcher {
        if let Err(e) = watcher.await {
            error!(reason = %e, "settings watcher failed");
        }
    }
    outcome?;

    let wallets = engine.wallets().all()?;
    write_wallets(io::stdout().lock(), &wallets)?;
    Ok(())
}
