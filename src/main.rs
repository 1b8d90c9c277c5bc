//! preview-sync - Live preview synchronization engine for pattern-based
//! design tools.

#![allow(dead_code)]

mod actor;
mod bundle;
mod cli;
mod config;
mod content;
mod core;
mod document;
mod embed;
mod logger;
mod pattern;
mod protocol;
mod reload;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{PreviewConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Serve { .. } => {
            init_config(PreviewConfig::load(&cli)?);
            cli::serve::serve()
        }
        Commands::Render { args } => cli::render::render_document(args),
    }
}
