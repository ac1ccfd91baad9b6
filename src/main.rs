//! obs-preset-helper
//!
//! Watches the attached displays and keeps OBS on the matching preset
//! (profile + scene collection), restarting the recording safely around
//! every switch. Tray/UI frontends attach through the engine's command
//! and status channels.

mod actions;
mod config;
mod engine;
mod logging;
mod obs;
mod preset;
mod system;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use config::Settings;
use engine::{create_engine_channels, Command, Engine};
use obs::api::ObwsFactory;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let _guard = logging::init_logging()?;
    info!("obs-preset-helper starting...");

    let settings = Settings::load()?;
    info!("Configuration loaded from {:?}", settings.config_path()?);

    let (cmd_tx, cmd_rx, status_tx, _status_rx) = create_engine_channels();
    let (display_tx, display_rx) = mpsc::unbounded_channel();
    // Lock/unlock edges come from external platform hooks; the channel
    // stays open for them even when none are wired up.
    let (_lock_tx, lock_rx) = mpsc::unbounded_channel();

    system::display_list::spawn(display_tx);

    let mut engine = Engine::new(
        settings,
        Arc::new(ObwsFactory),
        cmd_rx,
        display_rx,
        lock_rx,
        status_tx,
    );
    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!("Engine error: {e:#}");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down...");

    let _ = cmd_tx.send(Command::Shutdown).await;
    engine_handle.await.context("Engine task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

fn print_help() {
    println!("obs-preset-helper - display-aware OBS preset switching");
    println!();
    println!("USAGE:");
    println!("    obs-preset-helper [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help    Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                    Set log level (e.g., debug, info, warn)");
    println!("    OBS_PRESET_HELPER_LOG_PATH  Override the log directory");
}
