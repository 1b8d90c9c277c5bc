//! Build lifecycle events and diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildEventKind {
    Start,
    Done,
    Error,
}

/// One entry of a compilation context's event log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    #[serde(rename = "type")]
    pub kind: BuildEventKind,
    pub id: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Diagnostics>,
}

impl BuildEvent {
    pub fn start() -> Self {
        Self {
            kind: BuildEventKind::Start,
            id: Token::generate(),
            payload: None,
        }
    }

    pub fn done() -> Self {
        Self {
            kind: BuildEventKind::Done,
            id: Token::generate(),
            payload: None,
        }
    }

    pub fn error(diagnostics: Diagnostics) -> Self {
        Self {
            kind: BuildEventKind::Error,
            id: Token::generate(),
            payload: Some(diagnostics),
        }
    }

    pub fn is_start(&self) -> bool {
        self.kind == BuildEventKind::Start
    }
}

/// A single build problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source file the problem was found in, relative to the build context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            file: None,
            message: message.into(),
        }
    }

    pub fn in_file(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors-only diagnostics of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// JSON payload relayed to preview surfaces.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
