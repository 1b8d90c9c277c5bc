//! Content Server.
//!
//! Transport-independent request handling for the preview surface: the HTTP
//! layer maps [`ScriptResponse`] outcomes to status codes.
//!
//! A script request waits for the current rebuild, so a client never sees a
//! half-written or stale bundle because it asked mid-rebuild.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::bundle::{BuildQueue, MemoryFs, ReadyError, ReadyTicket};
use crate::document::{DocumentConfig, render, script_tag};
use crate::protocol::SessionState;

/// URL prefix of build artifacts.
pub const SCRIPTS_PREFIX: &str = "/scripts";

/// Outcome of a script request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptResponse {
    Found(Arc<[u8]>),
    /// Artifact was never produced (404).
    NotFound,
    /// Any other read failure (500).
    ServerError(String),
    /// The build was replaced, closed or did not finish in time (503).
    Interrupted,
}

/// A script request, split at the point where it would wait.
#[derive(Debug)]
pub enum ScriptRequest {
    Ready(ScriptResponse),
    /// A rebuild is in flight; [`PendingScript::wait`] blocks until it ends.
    Pending(PendingScript),
}

/// Script request parked on the current rebuild.
#[derive(Debug)]
pub struct PendingScript {
    path: String,
    ticket: ReadyTicket,
    timeout: Duration,
}

impl PendingScript {
    pub fn wait(self) -> ScriptResponse {
        match self.ticket.wait(self.timeout) {
            Ok(fs) => read_artifact(&fs, &self.path),
            Err(e) => interrupted(&self.path, e),
        }
    }
}

pub struct ContentServer {
    queue: Arc<BuildQueue>,
    session: Arc<ArcSwap<SessionState>>,
    ready_timeout: Duration,
}

impl ContentServer {
    pub fn new(
        queue: Arc<BuildQueue>,
        session: Arc<ArcSwap<SessionState>>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            session,
            ready_timeout,
        }
    }

    /// Live preview document.
    pub fn serve_document(&self) -> String {
        let data = self.session_data();
        let scripts = script_tag("components");
        render(&DocumentConfig::Live {
            data: &data,
            scripts: &scripts,
        })
    }

    /// Read-only observer document.
    pub fn serve_mirror(&self) -> String {
        let data = self.session_data();
        let scripts = script_tag("components");
        render(&DocumentConfig::LiveMirror {
            data: &data,
            scripts: &scripts,
        })
    }

    /// Serve a build artifact, waiting for an in-flight rebuild first.
    ///
    /// `request_path` may carry the `/scripts` prefix and a query string.
    pub fn serve_script(&self, request_path: &str) -> ScriptResponse {
        match self.script(request_path) {
            ScriptRequest::Ready(response) => response,
            ScriptRequest::Pending(pending) => pending.wait(),
        }
    }

    /// Answer a script request now if no rebuild is in flight, otherwise
    /// hand back the wait so the caller can park it off its request thread.
    pub fn script(&self, request_path: &str) -> ScriptRequest {
        let path = artifact_path(request_path);

        match self.queue.await_ready() {
            ReadyTicket::Immediate(fs) => ScriptRequest::Ready(read_artifact(&fs, path)),
            ticket => ScriptRequest::Pending(PendingScript {
                path: path.to_owned(),
                ticket,
                timeout: self.ready_timeout,
            }),
        }
    }

    fn session_data(&self) -> Value {
        let state = self.session.load();
        serde_json::to_value(state.to_message()).unwrap_or(Value::Null)
    }
}

fn read_artifact(fs: &MemoryFs, path: &str) -> ScriptResponse {
    match fs.read(path) {
        Ok(bytes) => ScriptResponse::Found(bytes),
        Err(e) if e.is_not_found() => ScriptResponse::NotFound,
        Err(e) => ScriptResponse::ServerError(e.to_string()),
    }
}

fn interrupted(path: &str, e: ReadyError) -> ScriptResponse {
    crate::debug!("serve"; "{}: {}", path, e);
    ScriptResponse::Interrupted
}

/// `/scripts/components.js?v=2` → `/components.js`
fn artifact_path(request_path: &str) -> &str {
    let path = request_path
        .split_once(['?', '#'])
        .map_or(request_path, |(path, _)| path);
    match path.strip_prefix(SCRIPTS_PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}
