//! Entry map for the generated pattern module.

use std::path::{Path, PathBuf};

use crate::pattern::Pattern;

/// One pattern implementation included in `components.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    /// Identifier-safe bundle name (`forms/input` → `forms_input`)
    pub name: String,
    /// `./`-relative, `/`-separated path from the build context
    pub request: String,
    /// Absolute implementation path, read on every rebuild
    pub source: PathBuf,
}

/// Identifier-safe name of a pattern inside the bundle.
pub fn bundle_name(pattern_id: &str) -> String {
    let mut name: String = pattern_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) || name.is_empty() {
        name.insert(0, '_');
    }
    name
}

/// Build the ordered entry map; patterns without implementation are skipped.
///
/// A later pattern whose bundle name collides with an earlier one replaces it
/// in place, keeping the earlier position.
pub fn entry_map(context: &Path, patterns: &[Pattern]) -> Vec<PatternEntry> {
    let mut entries: Vec<PatternEntry> = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        let Some(source) = &pattern.implementation else {
            crate::debug!("bundle"; "no implementation for {}, skipped", pattern.id);
            continue;
        };

        let entry = PatternEntry {
            name: bundle_name(&pattern.id),
            request: request_path(context, source),
            source: source.clone(),
        };

        match entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                crate::debug!("bundle"; "{} shadows an earlier pattern", pattern.id);
                *existing = entry;
            }
            None => entries.push(entry),
        }
    }

    entries
}

/// `./a/b.js` when `source` is inside `context`, the absolute path otherwise.
pub(super) fn request_path(context: &Path, source: &Path) -> String {
    match source.strip_prefix(context) {
        Ok(rel) => {
            let parts: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            format!("./{}", parts.join("/"))
        }
        Err(_) => source.to_string_lossy().replace('\\', "/"),
    }
}
