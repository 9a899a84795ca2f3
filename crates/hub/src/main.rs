// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polychat hub daemon (polychatd)
//!
//! Accepts agent connections from Minecraft servers and relays between them
//! and Discord. Discord-bound traffic goes to the hub log; embedders that
//! run a Discord gateway use the library with their own relay adapter.

use polychat_adapters::{LogRelayAdapter, TracedRelay};
use polychat_hub::{Config, Hub, LifecycleError, Paths};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before touching config or the state directory
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("polychatd {VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("polychatd {VERSION}");
                println!("Polychat hub - relays chat and moderation commands between Minecraft servers and Discord");
                println!();
                println!("USAGE:");
                println!("    polychatd");
                println!();
                println!("Configuration is read from $POLYCHAT_CONFIG, then");
                println!("$XDG_CONFIG_HOME/polychat/hub.toml, then ~/.config/polychat/hub.toml.");
                println!("POLYCHAT_LISTEN overrides the listen address.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: polychatd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let paths = Paths::load()?;

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&paths)?;
    let log_guard = setup_logging(&paths)?;

    let config = match Config::load_default() {
        Ok(config) => config,
        Err(e) => {
            write_startup_error(&paths, &e);
            eprintln!("error: {e}");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    info!(listen = %config.hub.listen, "starting polychat hub");
    let hub = match Hub::start(&config, TracedRelay::new(LogRelayAdapter::new())).await {
        Ok(hub) => hub,
        Err(e) => {
            write_startup_error(&paths, &e);
            error!("Failed to start hub: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(addr = %hub.local_addr(), "hub ready");
    // Signal ready for a supervising parent process
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }

    hub.shutdown().await;
    drop(log_guard);
    Ok(())
}

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- polychatd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- polychatd: starting (pid: ";

fn write_startup_marker(paths: &Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously; tracing may not flush before exit.
fn write_startup_error(paths: &Paths, error: &dyn std::fmt::Display) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start hub: {}", error);
}

fn setup_logging(
    paths: &Paths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = paths.log_path.parent().ok_or(LifecycleError::NoStateDir)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(
        dir,
        paths.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
