//! plugfetch - fetch, verify and install signed plugin host releases
//!
//! Thin CLI over the install coordinator: it loads configuration, wires the
//! HTTP transport and the event channel together, renders events, and turns
//! Ctrl-C into a cancellation request.

mod cli;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use plugfetch_config::Config;
use plugfetch_events::EventReceiver;
use plugfetch_install::{AttemptOutcome, BatchCoordinator, CoordinatorConfig};
use plugfetch_types::ReleaseVersion;
use std::future::Future;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    logging::init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting plugfetch v{}", env!("CARGO_PKG_VERSION"));

    // 1. Start with file config (or defaults)
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;

    // 2. Merge environment variables
    config.merge_env()?;

    // 3. Apply CLI flags (highest precedence)
    apply_cli_config(&mut config, &cli.global, &cli.command);
    config.validate()?;

    match cli.command {
        Commands::Install { version, .. } => install(&config, &version, cli.global.json).await,
        Commands::Urls { version } => print_urls(&config, &version),
    }
}

async fn install(config: &Config, version: &str, json: bool) -> Result<(), CliError> {
    let version = ReleaseVersion::new(version)?;
    let destination = config.destination()?;
    let transport = plugfetch_net::transport_from_config(config)?;
    let (event_sender, event_receiver) = plugfetch_events::channel();

    let mut coordinator = BatchCoordinator::new(transport, CoordinatorConfig::from_config(config)?)
        .with_event_sender(event_sender);

    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut event_handler = EventHandler::new(json);
    let outcome = execute_with_events(
        coordinator.install(version, destination),
        event_receiver,
        &mut event_handler,
    )
    .await;

    match outcome {
        AttemptOutcome::Succeeded { installed } => {
            info!(count = installed.len(), "Install completed successfully");
            Ok(())
        }
        AttemptOutcome::Failed(e) => Err(CliError::Install(e)),
        AttemptOutcome::Cancelled => Err(CliError::Cancelled),
    }
}

/// Drive the attempt while rendering its events as they arrive
async fn execute_with_events<F>(
    attempt: F,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> AttemptOutcome
where
    F: Future<Output = AttemptOutcome>,
{
    let mut attempt = Box::pin(attempt);

    loop {
        select! {
            outcome = &mut attempt => {
                // Drain any remaining events
                while let Ok(message) = event_receiver.try_recv() {
                    event_handler.handle_event(message);
                }
                return outcome;
            }

            message = event_receiver.recv() => {
                match message {
                    Some(message) => event_handler.handle_event(message),
                    None => { /* Channel closed: keep waiting for the attempt to finish */ }
                }
            }
        }
    }
}

fn print_urls(config: &Config, version: &str) -> Result<(), CliError> {
    let version = ReleaseVersion::new(version)?;
    let base = config.source.normalized_base_url();
    for artifact in &config.artifact_set()? {
        let url = plugfetch_net::artifact_url(&base, &version, &artifact.name)
            .map_err(plugfetch_errors::Error::from)?;
        println!("{url}");
    }
    Ok(())
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if let Some(base_url) = &global.base_url {
        config.source.base_url.clone_from(base_url);
    }

    if let Commands::Install {
        dest, staging_dir, ..
    } = command
    {
        if let Some(dest) = dest {
            config.paths.destination = Some(dest.clone());
        }
        if let Some(staging_dir) = staging_dir {
            config.paths.staging_dir = Some(staging_dir.clone());
        }
    }
}
