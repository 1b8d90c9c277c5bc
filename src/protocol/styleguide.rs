//! `styleguide-change` payload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Editor selected (or re-selected) a styleguide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleguideChange {
    /// Styleguide root; the build context for every pattern.
    #[serde(alias = "targetPath")]
    pub styleguide_path: PathBuf,

    /// Pattern directory, relative to the styleguide root unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_path: Option<PathBuf>,

    /// Name of the source analyzer that produced the pattern set. Carried for
    /// the editor's benefit; the engine does not interpret it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_name: Option<String>,
}

impl StyleguideChange {
    pub fn new(styleguide_path: impl Into<PathBuf>) -> Self {
        Self {
            styleguide_path: styleguide_path.into(),
            patterns_path: None,
            analyzer_name: None,
        }
    }

    pub fn with_patterns(mut self, patterns_path: impl Into<PathBuf>) -> Self {
        self.patterns_path = Some(patterns_path.into());
        self
    }

    /// Absolute pattern directory, falling back to `default_patterns`.
    pub fn patterns_dir(&self, default_patterns: &std::path::Path) -> PathBuf {
        let patterns = self.patterns_path.as_deref().unwrap_or(default_patterns);
        self.styleguide_path.join(patterns)
    }
}
