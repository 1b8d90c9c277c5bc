//! `[bundle]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [bundle]
//! debounce_ms = 300           # Quiet period before a rebuild
//! cooldown_ms = 800           # Minimum gap between rebuilds
//! minify = false              # Minify components.js
//! extensions = ["js", "cjs"]  # Implementation extensions, in preference order
//! entry = "index"             # Implementation file stem
//! ```

use serde::{Deserialize, Serialize};

/// Pattern bundle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
    pub minify: bool,
    pub extensions: Vec<String>,
    pub entry: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            cooldown_ms: 800,
            minify: false,
            extensions: vec!["js".into(), "cjs".into()],
            entry: "index".into(),
        }
    }
}
