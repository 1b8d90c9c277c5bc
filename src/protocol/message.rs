//! Message envelope shared by the editor, the engine and preview surfaces.
//!
//! Every frame on the wire is a JSON object:
//!
//! ```json
//! { "id": "…", "type": "page-change", "payload": { … } }
//! ```
//!
//! Unknown `type` strings are preserved as [`MessageType::Unknown`] so the
//! hub can log and skip them instead of rejecting the frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Token;

/// Kind of a [`Message`], serialized as a kebab-case string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    // Editor -> engine
    StyleguideChange,
    PageChange,
    ElementChange,
    BundleChange,
    AppLoaded,
    CreateScriptBundleRequest,
    ExportHtml,
    WindowFocused,
    WindowBlured,

    // Editor -> preview (relayed)
    SketchExportRequest,
    ContentRequest,

    // Preview/engine -> editor
    SketchExportResponse,
    ContentResponse,
    CreateScriptBundleResponse,

    // Engine -> preview
    Reload,
    State,
    Update,
    BuildError,

    Unknown(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::StyleguideChange => "styleguide-change",
            Self::PageChange => "page-change",
            Self::ElementChange => "element-change",
            Self::BundleChange => "bundle-change",
            Self::AppLoaded => "app-loaded",
            Self::CreateScriptBundleRequest => "create-script-bundle-request",
            Self::ExportHtml => "export-html",
            Self::WindowFocused => "window-focused",
            Self::WindowBlured => "window-blured",
            Self::SketchExportRequest => "sketch-export-request",
            Self::ContentRequest => "content-request",
            Self::SketchExportResponse => "sketch-export-response",
            Self::ContentResponse => "content-response",
            Self::CreateScriptBundleResponse => "create-script-bundle-response",
            Self::Reload => "reload",
            Self::State => "state",
            Self::Update => "update",
            Self::BuildError => "build-error",
            Self::Unknown(other) => other,
        }
    }

    /// Types the hub forwards to preview surfaces without looking inside.
    pub fn is_relayed(&self) -> bool {
        matches!(self, Self::SketchExportRequest | Self::ContentRequest)
    }

    /// Types only the engine originates; an editor sending them is a bug.
    pub fn is_engine_only(&self) -> bool {
        matches!(
            self,
            Self::Reload
                | Self::State
                | Self::Update
                | Self::BuildError
                | Self::CreateScriptBundleResponse
                | Self::SketchExportResponse
                | Self::ContentResponse
        )
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "styleguide-change" => Self::StyleguideChange,
            "page-change" => Self::PageChange,
            "element-change" => Self::ElementChange,
            "bundle-change" => Self::BundleChange,
            "app-loaded" => Self::AppLoaded,
            "create-script-bundle-request" => Self::CreateScriptBundleRequest,
            "export-html" => Self::ExportHtml,
            "window-focused" => Self::WindowFocused,
            "window-blured" => Self::WindowBlured,
            "sketch-export-request" => Self::SketchExportRequest,
            "content-request" => Self::ContentRequest,
            "sketch-export-response" => Self::SketchExportResponse,
            "content-response" => Self::ContentResponse,
            "create-script-bundle-response" => Self::CreateScriptBundleResponse,
            "reload" => Self::Reload,
            "state" => Self::State,
            "update" => Self::Update,
            "build-error" => Self::BuildError,
            _ => Self::Unknown(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Unknown(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire unit for all editor, engine and preview communication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Token,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Create a message with a fresh id.
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self {
            id: Token::generate(),
            kind,
            payload,
        }
    }

    /// Create a reply carrying the id of the message it answers.
    pub fn reply(to: &Token, kind: MessageType, payload: Value) -> Self {
        Self {
            id: to.clone(),
            kind,
            payload,
        }
    }

    /// Hard reload instruction for preview surfaces.
    pub fn reload() -> Self {
        Self::new(MessageType::Reload, empty_payload())
    }

    /// Rebuild started.
    pub fn update() -> Self {
        Self::new(MessageType::Update, empty_payload())
    }

    /// Rebuild failed; payload carries errors-only diagnostics.
    pub fn build_error(diagnostics: Value) -> Self {
        Self::new(MessageType::BuildError, diagnostics)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"id":"{}","type":"reload","payload":{{}}}}"#, self.id)
        })
    }

    /// Parse from JSON text.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}
