//! cellframe - a character-cell terminal rendering engine
//!
//! cellframe composites a brightness-mapped pixel grid with declarative text and
//! button overlays into ANSI output, and keeps it live under keyboard input and
//! terminal resizes.
//!
//! # Features
//!
//! - **Pixel Grid**: each logical pixel is two glyph columns with a 24-bit grey background
//! - **Overlays**: static, aligned and dynamic text, bordered buttons, text input
//! - **Navigation**: arrow-key focus over an overlay's buttons, Enter to activate
//! - **Settings**: target FPS, tick rate and logging flags, persisted to `~/.cellframe/config.toml`
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Up/Down | Move focus |
//! | Enter | Activate focused button |
//! | F1 | Toggle debug readout |
//! | F2 | Open settings |
//! | F3 | Toggle detailed debug readout |
//! | q | Toggle help |
//! | Esc | Back / quit |
//! | Ctrl+C | Quit |

mod app;
mod config;
mod core;
mod engine;
mod logging;
mod ui;

use std::env;
use std::sync::{Arc, PoisonError};

use tracing::{error, info, warn};

use crate::app::{App, MAIN_MENU};
use crate::config::Settings;
use crate::engine::orchestrator::Orchestrator;
use crate::ui::renderer::{install_panic_hook, Terminal};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("cellframe {}", VERSION);
}

fn print_help() {
    eprintln!("cellframe {} - A terminal rendering engine", VERSION);
    eprintln!();
    eprintln!("Usage: cellframe [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Up/Down               Move focus between buttons");
    eprintln!("  Enter                 Activate the focused button");
    eprintln!("  F1                    Toggle debug readout");
    eprintln!("  F2                    Open settings");
    eprintln!("  F3                    Toggle detailed debug readout");
    eprintln!("  q                     Toggle help");
    eprintln!("  Esc                   Back (quits from the main menu)");
    eprintln!("  Ctrl+C                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.cellframe/config.toml");
    eprintln!("Log file:      ~/.cellframe/latest.log (RUST_LOG overrides the level)");
    eprintln!("Log archive:   ~/.cellframe/logs/MM-dd-yyyy.log");
}

fn parse_args() -> Result<(), String> {
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {}. Use -h for help.", other)),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = parse_args() {
        eprintln!("Error: {}", e);
        eprintln!("Use --help for usage information");
        std::process::exit(1);
    }

    let settings = Settings::load();
    logging::init(&settings);

    let banner = format!(
        "cellframe {} starting (refresh={}fps tick={} level={})",
        VERSION,
        settings.refresh_rate,
        settings.tick_rate,
        logging::max_level(&settings)
    );
    eprintln!("{}", banner);
    info!("{}", banner);

    let settings = settings.into_shared();
    let app = App::new(settings.clone());

    install_panic_hook();
    let terminal = Arc::new(Terminal::new());
    terminal.init()?;

    let result = Orchestrator::new(
        terminal.clone(),
        app.overlays(),
        MAIN_MENU,
        app.input(),
        settings.clone(),
    )
    .map_err(anyhow::Error::from)
    .and_then(|orchestrator| orchestrator.run());

    if let Err(e) = terminal.cleanup() {
        warn!("Failed to restore terminal: {}", e);
    }

    let snapshot = settings
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Err(e) = snapshot.save() {
        warn!("Failed to save settings: {}", e);
    }

    match &result {
        Ok(()) => info!("cellframe exiting"),
        Err(e) => error!(fatal = true, "Engine stopped: {:#}", e),
    }

    if let Err(e) = logging::archive() {
        eprintln!("Failed to archive log: {}", e);
    }

    result
}
