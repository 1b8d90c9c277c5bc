//! Pattern discovery.
//!
//! The engine does not analyze pattern sources; it only needs the ordered
//! `(id, implementation path)` pairs that feed the generated entry module.
//! [`PatternProvider`] is the seam; [`DirectoryPatternProvider`] is the
//! default, convention-based implementation:
//!
//! ```text
//! patterns/
//! ├── button/
//! │   ├── index.js        → pattern "button", bundled
//! │   └── index.d.ts
//! ├── forms/input/
//! │   └── index.js        → pattern "forms/input", bundled
//! └── icon/
//!     └── index.d.ts      → pattern "icon", no implementation, excluded
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::protocol::StyleguideChange;

/// A pattern as seen by the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub id: String,
    /// Absent when the pattern only has declarations; such patterns are
    /// left out of the bundle.
    pub implementation: Option<PathBuf>,
}

impl Pattern {
    pub fn new(id: impl Into<String>, implementation: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            implementation,
        }
    }
}

/// Supplies the pattern set for a styleguide, once per selection.
pub trait PatternProvider: Send + Sync {
    fn patterns(&self, change: &StyleguideChange) -> Result<Vec<Pattern>>;
}

/// Scans `<styleguide>/<patterns>` for pattern directories.
#[derive(Debug, Clone)]
pub struct DirectoryPatternProvider {
    /// Pattern directory used when the editor does not name one
    default_patterns: PathBuf,
    /// Implementation file stem (`index`)
    entry: String,
    /// Implementation extensions, in preference order
    extensions: Vec<String>,
}

impl DirectoryPatternProvider {
    pub fn new(default_patterns: impl Into<PathBuf>, entry: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            default_patterns: default_patterns.into(),
            entry: entry.into(),
            extensions,
        }
    }

    pub fn from_config(config: &crate::config::PreviewConfig) -> Self {
        Self::new(
            config.styleguide.patterns.clone(),
            config.bundle.entry.clone(),
            config.bundle.extensions.clone(),
        )
    }

    fn declaration_name(&self) -> String {
        format!("{}.d.ts", self.entry)
    }

    /// Implementation file of a directory, first matching extension wins.
    fn implementation_in(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions
            .iter()
            .map(|ext| dir.join(format!("{}.{}", self.entry, ext)))
            .find(|candidate| candidate.is_file())
    }

    fn scan(&self, root: &Path) -> Vec<Pattern> {
        let declaration = self.declaration_name();
        let mut patterns = Vec::new();

        for entry in jwalk::WalkDir::new(root).skip_hidden(true).sort(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    crate::debug!("patterns"; "skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.path();
            let implementation = self.implementation_in(&dir);
            if implementation.is_none() && !dir.join(&declaration).is_file() {
                continue;
            }

            let Some(id) = pattern_id(root, &dir) else {
                continue;
            };
            patterns.push(Pattern::new(id, implementation));
        }

        patterns.sort_by(|a, b| a.id.cmp(&b.id));
        patterns
    }
}

impl PatternProvider for DirectoryPatternProvider {
    fn patterns(&self, change: &StyleguideChange) -> Result<Vec<Pattern>> {
        let root = change.patterns_dir(&self.default_patterns);
        if !root.is_dir() {
            return Err(anyhow::anyhow!("pattern directory not found"))
                .with_context(|| format!("scanning {}", root.display()));
        }

        let patterns = self.scan(&root);
        crate::debug!("patterns"; "{} patterns in {}", patterns.len(), root.display());
        Ok(patterns)
    }
}

/// `/`-joined directory path relative to the pattern root.
fn pattern_id(root: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn provider() -> DirectoryPatternProvider {
        DirectoryPatternProvider::new("patterns", "index", vec!["js".into(), "cjs".into()])
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_scan_conventions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("patterns/button/index.js"));
        touch(&root.join("patterns/button/index.d.ts"));
        touch(&root.join("patterns/forms/input/index.cjs"));
        touch(&root.join("patterns/icon/index.d.ts"));
        touch(&root.join("patterns/notes/readme.md"));
        touch(&root.join("patterns/.cache/index.js"));

        let change = StyleguideChange::new(root);
        let patterns = provider().patterns(&change).unwrap();

        assert_eq!(
            patterns,
            vec![
                Pattern::new("button", Some(root.join("patterns/button/index.js"))),
                Pattern::new("forms/input", Some(root.join("patterns/forms/input/index.cjs"))),
                Pattern::new("icon", None),
            ]
        );
    }

    #[test]
    fn test_extension_preference() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("patterns/card/index.js"));
        touch(&root.join("patterns/card/index.cjs"));

        let patterns = provider().patterns(&StyleguideChange::new(root)).unwrap();
        assert_eq!(patterns[0].implementation, Some(root.join("patterns/card/index.js")));
    }

    #[test]
    fn test_custom_patterns_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("lib/patterns/link/index.js"));

        let change = StyleguideChange::new(root).with_patterns("lib/patterns");
        let patterns = provider().patterns(&change).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].id, "link");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let change = StyleguideChange::new(temp.path());
        assert!(provider().patterns(&change).is_err());
    }
}
