//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Live preview synchronization engine
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: preview.toml, optional)
    #[arg(short = 'C', long, global = true, default_value = "preview.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the preview server and editor bridge
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Styleguide to select at startup
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        styleguide: Option<PathBuf>,

        /// Pattern directory, relative to the styleguide
        #[arg(short = 'P', long, value_hint = clap::ValueHint::DirPath)]
        patterns: Option<PathBuf>,

        /// Minify the generated pattern bundle
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        minify: Option<bool>,
    },

    /// Print a preview document to stdout
    #[command(visible_alias = "r")]
    Render {
        #[command(flatten)]
        args: RenderArgs,
    },
}

/// Render command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// Document mode
    #[arg(short, long, value_enum, default_value = "live")]
    pub mode: RenderMode,

    /// JSON file embedded as the document data (default: null)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    /// Pre-rendered markup for static documents
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub content: Option<PathBuf>,

    /// Script inclusion markup (e.g. an exported script bundle); live
    /// modes default to the components bundle of the running server
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub scripts: Option<PathBuf>,

    /// Write the document to a file instead of stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Static,
    Live,
    LiveMirror,
}

impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
}
