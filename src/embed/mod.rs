//! Embedded client resources.
//!
//! Everything a preview surface needs before the first bundle is built lives
//! here, minified at compile time by `build.rs`:
//!
//! - `serve` - the connection-state bridge (`/bridge.js`), templated with the
//!   WebSocket port
//! - `bundle` - the renderer and preview bootstrap bundles emitted next to the
//!   generated pattern entry module on every rebuild
//! - `document` - stylesheets inlined into the preview document
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{BRIDGE_JS, BridgeVars};
//!
//! let js = BRIDGE_JS.render(&BridgeVars { ws_port: 35729 });
//! ```

use std::marker::PhantomData;

/// Variable set injected into a [`Template`].
pub trait TemplateVars {
    fn apply(&self, content: &str) -> String;
}

/// Static text with typed placeholder substitution.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _vars: PhantomData<V>,
}

impl<V: TemplateVars> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _vars: PhantomData,
        }
    }

    pub fn render(&self, vars: &V) -> String {
        vars.apply(self.content)
    }
}

/// A script bundle compiled into the binary and emitted on every rebuild.
#[derive(Debug, Clone, Copy)]
pub struct BundleAsset {
    /// Artifact name without extension (`renderer` -> `/renderer.js`)
    pub name: &'static str,
    pub source: &'static str,
}

impl BundleAsset {
    /// Path of the artifact inside the build output filesystem.
    pub fn output_path(&self) -> String {
        format!("/{}.js", self.name)
    }
}

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for bridge.js.
    pub struct BridgeVars {
        pub ws_port: u16,
    }

    impl TemplateVars for BridgeVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__PREVIEW_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// URL the document loads the bridge from.
    pub const BRIDGE_URL: &str = "/bridge.js";

    /// Connection-state bridge with WebSocket port injection.
    pub const BRIDGE_JS: Template<BridgeVars> =
        Template::new(include_str!(concat!(env!("OUT_DIR"), "/bridge.min.js")));
}

pub mod bundle {
    use super::BundleAsset;

    /// Renderer bundle: embedded state decoding and overlay placement.
    pub const RENDERER: BundleAsset = BundleAsset {
        name: "renderer",
        source: include_str!(concat!(env!("OUT_DIR"), "/renderer.min.js")),
    };

    /// Preview bootstrap bundle: wires bridge messages to the renderer.
    pub const PREVIEW: BundleAsset = BundleAsset {
        name: "preview",
        source: include_str!(concat!(env!("OUT_DIR"), "/preview.min.js")),
    };
}

pub mod document {
    /// Base document stylesheet (overlay containers).
    pub const PREVIEW_CSS: &str = include_str!(concat!(env!("OUT_DIR"), "/preview.min.css"));

    /// Loading placeholder stylesheet for live documents.
    pub const PRELOADER_CSS: &str = include_str!(concat!(env!("OUT_DIR"), "/preloader.min.css"));
}

#[cfg(test)]
mod tests {
    use super::serve::{BRIDGE_JS, BridgeVars};
    use super::bundle::{PREVIEW, RENDERER};

    #[test]
    fn test_bridge_port_injection() {
        let js = BRIDGE_JS.render(&BridgeVars { ws_port: 41234 });
        assert!(js.contains("41234"));
        assert!(!js.contains("__PREVIEW_WS_PORT__"));
    }

    #[test]
    fn test_bundle_output_paths() {
        assert_eq!(RENDERER.output_path(), "/renderer.js");
        assert_eq!(PREVIEW.output_path(), "/preview.js");
        assert!(!RENDERER.source.is_empty());
    }
}
