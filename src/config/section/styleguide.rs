//! `[styleguide]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [styleguide]
//! path = "~/work/styleguide"  # Selected at startup (optional)
//! patterns = "patterns"       # Pattern directory, relative to the styleguide
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleguideConfig {
    pub path: Option<PathBuf>,
    pub patterns: PathBuf,
}

impl Default for StyleguideConfig {
    fn default() -> Self {
        Self {
            path: None,
            patterns: PathBuf::from("patterns"),
        }
    }
}
