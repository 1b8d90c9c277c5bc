//! Configuration management for `preview.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── bundle     # [bundle]
//! │   ├── serve      # [serve]
//! │   └── styleguide # [styleguide]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError
//! │   └── handle     # Global config handle
//! └── mod.rs         # PreviewConfig (this file)
//! ```
//!
//! The config file is optional: without one every section uses its defaults
//! and CLI flags are applied on top.

pub mod section;
pub mod types;

pub use section::{BundleConfig, DEFAULT_WS_PORT, ServeConfig, StyleguideConfig};
pub use types::{ConfigError, cfg, init_config};

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing preview.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Absolute path to the config file, whether or not it exists
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub bundle: BundleConfig,

    #[serde(default)]
    pub styleguide: StyleguideConfig,
}

impl PreviewConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file; a missing file means
    /// defaults rooted at cwd.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
                config.config_path = path;
                config
            }
            None => {
                crate::debug!("config"; "{} not found, using defaults", cli.config.display());
                Self {
                    config_path: cwd.join(&cli.config),
                    root: cwd.clone(),
                    ..Self::default()
                }
            }
        };

        config.apply_command_options(cli, &cwd);
        config.normalize_paths();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Join a path with the root directory, expanding `~`.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let expanded = match path.to_str() {
            Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
            None => path.to_path_buf(),
        };
        self.root.join(expanded)
    }

    /// Styleguide selected at startup, absolute.
    pub fn startup_styleguide(&self) -> Option<&Path> {
        self.styleguide.path.as_deref()
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_command_options(&mut self, cli: &Cli, cwd: &Path) {
        match &cli.command {
            Commands::Serve {
                interface,
                port,
                styleguide,
                patterns,
                minify,
            } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.bundle.minify, minify.as_ref());
                Self::update_option(&mut self.styleguide.patterns, patterns.as_ref());
                // CLI paths are relative to where the command ran
                if let Some(path) = styleguide {
                    self.styleguide.path = Some(cwd.join(path));
                }
            }
            Commands::Render { .. } => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    fn normalize_paths(&mut self) {
        if let Some(path) = self.styleguide.path.take() {
            self.styleguide.path = Some(self.root_join(path));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bundle.entry.trim().is_empty() {
            return Err(ConfigError::validation("bundle.entry", "must not be empty"));
        }
        if self.bundle.extensions.is_empty() {
            return Err(ConfigError::validation(
                "bundle.extensions",
                "at least one extension is required",
            ));
        }
        if let Some(ext) = self.bundle.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(ConfigError::validation(
                "bundle.extensions",
                format!("`{ext}` must be given without the leading dot"),
            ));
        }
        if self.serve.ready_timeout_ms == 0 {
            return Err(ConfigError::validation("serve.ready_timeout_ms", "must be positive"));
        }
        if self.serve.port != 0 && self.serve.port == self.serve.ws_port {
            return Err(ConfigError::validation(
                "serve.ws_port",
                format!("conflicts with serve.port ({})", self.serve.port),
            ));
        }
        Ok(())
    }
}

/// Find config file by searching upward from current directory
///
/// ```text
/// /home/user/sg/patterns/button/  ← cwd
/// /home/user/sg/preview.toml      ← found!
/// ```
fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.is_file().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> PreviewConfig {
    let (parsed, ignored) = PreviewConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
