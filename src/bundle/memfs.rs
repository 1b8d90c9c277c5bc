//! In-memory output filesystem.
//!
//! The build pipeline writes a complete `MemoryFs` per rebuild and hands it
//! over in one piece; readers only ever see a finished build. Paths are
//! absolute, `/`-separated (`/components.js`).

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Immutable-after-build artifact store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or overwrite) a file. Only the pipeline calls this, before the
    /// filesystem is published.
    pub fn write(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<(), FsError> {
        let path = normalize(path)?;
        let bytes: Vec<u8> = content.into();
        self.files.insert(path, Arc::from(bytes));
        Ok(())
    }

    /// Read a file.
    pub fn read(&self, path: &str) -> Result<Arc<[u8]>, FsError> {
        let path = normalize(path)?;
        if let Some(content) = self.files.get(&path) {
            return Ok(Arc::clone(content));
        }
        if self.is_dir(&path) {
            return Err(FsError::IsDirectory(path));
        }
        Err(FsError::NotFound(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|p| self.files.contains_key(&p))
    }

    /// File paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_dir(&self, path: &str) -> bool {
        if path == "/" {
            return true;
        }
        let prefix = format!("{path}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }
}

/// Normalize to `/a/b` form. Rejects traversal and NUL bytes.
fn normalize(path: &str) -> Result<String, FsError> {
    if path.contains('\0') {
        return Err(FsError::InvalidPath(path.to_owned()));
    }

    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(FsError::InvalidPath(path.to_owned())),
            s => parts.push(s),
        }
    }

    Ok(format!("/{}", parts.join("/")))
}
