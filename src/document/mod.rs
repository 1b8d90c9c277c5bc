//! Preview document rendering.
//!
//! [`render`] is a pure function: identical configs produce identical
//! documents. Every mode embeds the serialized state inside a hidden
//! `<textarea data-data>` (URL-escaped with `encodeURIComponent` semantics)
//! so client bootstrap code recovers it without a network round trip.
//!
//! | Mode         | `#preview` body     | live scripts |
//! |--------------|---------------------|--------------|
//! | `Static`     | pre-rendered markup | no           |
//! | `Live`       | preloader           | yes          |
//! | `LiveMirror` | empty               | yes          |

use std::fmt::Write;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embed::document::{PRELOADER_CSS, PREVIEW_CSS};
use crate::embed::serve::BRIDGE_URL;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Renderer and preview bootstrap, loaded from the current build output.
pub const LIVE_SCRIPTS: &str = concat!(
    "<script src=\"/scripts/renderer.js\" data-script=\"renderer\"></script>\n",
    "\t<script src=\"/scripts/preview.js\" data-script=\"preview\"></script>"
);

const PRELOADER: &str = concat!(
    "<div class=\"outer\">",
    "<div class=\"circle_outer\"></div>",
    "<div class=\"circle_lblue\"></div>",
    "<div class=\"circle_blue\"></div>",
    "</div>"
);

/// Document mode, also embedded in the data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentMode {
    Static,
    Live,
    LiveMirror,
}

/// Input of [`render`].
#[derive(Debug, Clone, Copy)]
pub enum DocumentConfig<'a> {
    /// Pre-rendered export: markup and inline bundles, no live connection.
    Static {
        content: &'a str,
        data: &'a Value,
        scripts: &'a str,
    },
    /// Interactive preview: preloader until the first state arrives.
    Live { data: &'a Value, scripts: &'a str },
    /// Read-only observer surface.
    LiveMirror { data: &'a Value, scripts: &'a str },
}

impl DocumentConfig<'_> {
    pub fn mode(&self) -> DocumentMode {
        match self {
            Self::Static { .. } => DocumentMode::Static,
            Self::Live { .. } => DocumentMode::Live,
            Self::LiveMirror { .. } => DocumentMode::LiveMirror,
        }
    }

    fn data(&self) -> &Value {
        match self {
            Self::Static { data, .. } | Self::Live { data, .. } | Self::LiveMirror { data, .. } => {
                data
            }
        }
    }

    fn scripts(&self) -> &str {
        match self {
            Self::Static { scripts, .. }
            | Self::Live { scripts, .. }
            | Self::LiveMirror { scripts, .. } => scripts,
        }
    }
}

#[derive(Serialize)]
struct EmbeddedData<'a> {
    data: &'a Value,
    mode: DocumentMode,
}

/// Render the preview document.
pub fn render(config: &DocumentConfig<'_>) -> String {
    let mode = config.mode();
    let embedded = encode_data(config.data(), mode);

    let (body, preloader_style) = match config {
        DocumentConfig::Static { content, .. } => (*content, String::new()),
        DocumentConfig::Live { .. } => (PRELOADER, format!("\n\t<style>{PRELOADER_CSS}</style>")),
        DocumentConfig::LiveMirror { .. } => ("", String::new()),
    };

    let live_scripts = match mode {
        DocumentMode::Static => "",
        DocumentMode::Live | DocumentMode::LiveMirror => LIVE_SCRIPTS,
    };

    let mut out = String::with_capacity(2048 + body.len() + embedded.len());
    let _ = write!(
        out,
        "<!doctype html>
<html>
<head>
\t<meta charset=\"utf-8\"/>
\t<title></title>
\t<style>{PREVIEW_CSS}</style>{preloader_style}
</head>
<body>
\t<div id=\"preview\">{body}</div>
\t<div id=\"preview-selection\"></div>
\t<div id=\"preview-highlight\"></div>
\t<textarea data-data=\"preview\" style=\"display: none\">{embedded}</textarea>
\t<script src=\"{BRIDGE_URL}\" data-script=\"bridge\"></script>
\t{scripts}
\t{live_scripts}
</body>
</html>
",
        scripts = config.scripts(),
    );
    out
}

/// `encodeURIComponent(JSON.stringify({data, mode}))`
fn encode_data(data: &Value, mode: DocumentMode) -> String {
    let json = serde_json::to_string(&EmbeddedData { data, mode }).unwrap_or_else(|_| {
        crate::debug!("document"; "embedded data not serializable, using null");
        String::from("null")
    });
    utf8_percent_encode(&json, URI_COMPONENT).to_string()
}

/// Script tag loading a bundle artifact from the live build output.
pub fn script_tag(name: &str) -> String {
    format!("<script src=\"/scripts/{name}.js\" data-script=\"{name}\"></script>")
}

/// Inline script element carrying an artifact's source (static export).
///
/// `</script` inside the source is escaped so the element cannot be closed
/// early by string literals in pattern code.
pub fn inline_script(name: &str, source: &str) -> String {
    let source = source.replace("</script", "<\\/script");
    format!("<script data-script=\"{name}\">{source}</script>")
}
