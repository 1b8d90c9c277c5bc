//! Broadcast Hub - Editor/Preview Synchronization
//!
//! This actor is responsible for:
//! - Owning the Session State and publishing snapshots of it
//! - Reacting to editor messages (styleguide switch, selection, relays)
//! - Replaying the snapshot to newly connected previews
//! - Fanning out build events as `update` / `build-error` messages
//!
//! # Architecture
//!
//! ```text
//! Editor --[msg]--> HubActor --[broadcast]--> Preview clients
//!                    ^    |                        |
//!    BuildQueue -----+    +--<--[relay upstream]---+
//!   (build events)
//! ```
//!
//! [`Hub`] is the synchronous state machine; [`HubActor`] drives it from a
//! tokio task, one reaction at a time.

mod client_io;
mod connection;
mod delivery;

#[cfg(test)]
mod tests;

pub use client_io::WsConnection;
pub use connection::{Connection, ReadyState, Role, TransportError};

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use self::connection::Client;
use super::messages::HubMsg;
use crate::bundle::{BuildEvent, BuildEventKind, BuildQueue, MemoryFs, ReadyError};
use crate::core::Token;
use crate::document::inline_script;
use crate::embed::bundle::{PREVIEW, RENDERER};
use crate::logger::{status_error, status_success, status_warning};
use crate::pattern::PatternProvider;
use crate::protocol::{Message, MessageType, SessionState, StyleguideChange};
use crate::{debug, log};

/// Connections shared by the actor and the reader thread.
pub(crate) type Registry = Arc<Mutex<Vec<Client>>>;

/// Follow-up work a reaction needs outside the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEffect {
    None,
    /// Answer a script bundle request once the current build is ready.
    AwaitBundle(Token),
}

/// Session State plus the connection registry.
pub struct Hub {
    state: SessionState,
    /// Published copy for newly rendered documents and the reader thread.
    session: Arc<ArcSwap<SessionState>>,
    queue: Arc<BuildQueue>,
    patterns: Arc<dyn PatternProvider>,
    clients: Registry,
    next_client: u64,
    last_build_failed: bool,
}

impl Hub {
    pub fn new(
        queue: Arc<BuildQueue>,
        patterns: Arc<dyn PatternProvider>,
        session: Arc<ArcSwap<SessionState>>,
    ) -> Self {
        let state = SessionState::clone(&session.load());
        Self {
            state,
            session,
            queue,
            patterns,
            clients: Arc::new(Mutex::new(Vec::new())),
            next_client: 0,
            last_build_failed: false,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.state
    }

    pub fn queue(&self) -> &Arc<BuildQueue> {
        &self.queue
    }

    pub(crate) fn registry(&self) -> Registry {
        Arc::clone(&self.clients)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// React to one editor message.
    pub fn handle_editor(&mut self, msg: Message) -> HubEffect {
        match &msg.kind {
            MessageType::StyleguideChange => {
                match serde_json::from_value::<StyleguideChange>(msg.payload) {
                    Ok(change) => self.select_styleguide(&change),
                    Err(e) => log!("hub"; "invalid styleguide-change payload: {}", e),
                }
            }
            MessageType::PageChange => {
                self.state.set_active_page(msg.payload);
                self.publish();
                let snapshot = self.state.to_message();
                self.broadcast(&snapshot);
            }
            MessageType::ElementChange => {
                self.state.set_active_element(msg.payload.clone());
                self.publish();
                self.broadcast(&msg);
            }
            MessageType::BundleChange => self.broadcast(&Message::reload()),
            MessageType::AppLoaded
            | MessageType::ExportHtml
            | MessageType::WindowFocused
            | MessageType::WindowBlured => {
                debug!("hub"; "{} acknowledged", msg.kind);
            }
            MessageType::CreateScriptBundleRequest => return HubEffect::AwaitBundle(msg.id),
            kind if kind.is_relayed() => self.broadcast(&msg),
            kind if kind.is_engine_only() => {
                log!("hub"; "unexpected {} from editor, ignoring", kind);
            }
            kind => log!("warning"; "unknown message type `{}`, ignoring", kind),
        }
        HubEffect::None
    }

    /// Switch the build to another styleguide. Re-selecting the current one
    /// is a no-op.
    pub fn select_styleguide(&mut self, change: &StyleguideChange) {
        let target = change.styleguide_path.as_path();
        if self.queue.current_target().as_deref() == Some(target) {
            debug!("hub"; "styleguide unchanged: {}", target.display());
            return;
        }

        let patterns = self.patterns.patterns(change).unwrap_or_else(|e| {
            status_warning(&format!("pattern discovery failed: {e:#}"));
            Vec::new()
        });
        log!("hub"; "styleguide {} ({} patterns)", target.display(), patterns.len());

        // Closes the previous pipeline; reloading previews wait on the new one.
        self.queue.start(target, &patterns);
        self.broadcast(&Message::reload());
        self.state.reset();
        self.publish();
    }

    /// Relay a preview message to the editors, unmodified.
    pub fn handle_preview(&mut self, msg: Message) {
        debug!("hub"; "relaying {} upstream", msg.kind);
        self.send_to_editors(&msg);
    }

    pub fn handle_build_event(&mut self, event: &BuildEvent) {
        match event.kind {
            BuildEventKind::Start => {
                debug!("bundle"; "rebuilding");
                self.broadcast(&Message::update());
            }
            BuildEventKind::Error => {
                self.last_build_failed = true;
                let diagnostics = event.payload.clone().unwrap_or_default();
                status_error("bundle failed", &diagnostics.to_string());
                self.broadcast(&Message::build_error(diagnostics.to_value()));
            }
            BuildEventKind::Done => {
                if !std::mem::take(&mut self.last_build_failed) {
                    status_success("bundle ready");
                }
            }
        }
    }

    /// Register a handshaken connection; previews get the snapshot first.
    pub fn attach(&mut self, conn: Box<dyn Connection>, role: Role) {
        self.next_client += 1;
        let mut client = Client::new(self.next_client, role, conn);

        if let Err(e) = client.greet(&self.state) {
            log!("hub"; "failed to send state to new client: {}", e);
            return;
        }

        let mut clients = self.clients.lock();
        clients.push(client);
        debug!("hub"; "{:?} connected (total: {})", role, clients.len());
    }

    /// Answer a script bundle request to every editor.
    pub fn finish_bundle(&mut self, id: &Token, scripts: Result<String, ReadyError>) {
        let scripts = scripts.unwrap_or_else(|e| {
            log!("hub"; "script bundle unavailable: {}", e);
            String::new()
        });
        let reply = Message::reply(id, MessageType::CreateScriptBundleResponse, scripts.into());
        self.send_to_editors(&reply);
    }

    /// Close every connection and the running pipeline.
    pub fn shutdown(&mut self) {
        let mut clients = self.clients.lock();
        debug!("hub"; "closing {} connections", clients.len());
        for mut client in clients.drain(..) {
            client.conn.close();
        }
        drop(clients);
        self.queue.close();
    }

    fn publish(&self) {
        self.session.store(Arc::new(self.state.clone()));
    }
}

/// Inline `<script>` elements of a finished build, in load order.
pub fn bundle_scripts(fs: &MemoryFs) -> String {
    let components = crate::bundle::COMPONENTS_PATH;
    [
        ("components", components.to_owned()),
        (RENDERER.name, RENDERER.output_path()),
        (PREVIEW.name, PREVIEW.output_path()),
    ]
    .into_iter()
    .filter_map(|(name, path)| {
        let bytes = fs.read(&path).ok()?;
        Some(inline_script(name, &String::from_utf8_lossy(&bytes)))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Drives a [`Hub`] from its inbox and the build event stream.
pub struct HubActor {
    hub: Hub,
    rx: mpsc::Receiver<HubMsg>,
    /// Own inbox, for reader thread and bundle waits
    tx: mpsc::Sender<HubMsg>,
    build_rx: broadcast::Receiver<BuildEvent>,
    ready_timeout: Duration,
}

impl HubActor {
    pub fn new(
        hub: Hub,
        rx: mpsc::Receiver<HubMsg>,
        tx: mpsc::Sender<HubMsg>,
        ready_timeout: Duration,
    ) -> Self {
        let build_rx = hub.queue.subscribe();
        Self {
            hub,
            rx,
            tx,
            build_rx,
            ready_timeout,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let reader = client_io::spawn_reader(
            self.hub.registry(),
            Arc::clone(&self.hub.session),
            self.tx.clone(),
        );
        if let Err(e) = reader {
            log!("hub"; "failed to start client reader: {}", e);
        }

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(HubMsg::Shutdown) | None => break,
                    Some(msg) => self.handle(msg),
                },
                event = self.build_rx.recv() => match event {
                    Ok(event) => self.hub.handle_build_event(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("hub"; "skipped {} build events", n);
                    }
                    // The queue owns the sender for the whole run
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        debug!("hub"; "shutting down");
        self.hub.shutdown();
    }

    fn handle(&mut self, msg: HubMsg) {
        match msg {
            HubMsg::Editor(msg) => {
                if let HubEffect::AwaitBundle(id) = self.hub.handle_editor(msg) {
                    self.await_bundle(id);
                }
            }
            HubMsg::Preview(msg) => self.hub.handle_preview(msg),
            HubMsg::Attach { conn, role } => self.hub.attach(conn, role),
            HubMsg::BundleReady { id, scripts } => self.hub.finish_bundle(&id, scripts),
            HubMsg::Shutdown => {}
        }
    }

    /// Wait for the build off the actor task, then report back.
    fn await_bundle(&self, id: Token) {
        let ticket = self.hub.queue.await_ready();
        let timeout = self.ready_timeout;
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let scripts = ticket.wait(timeout).map(|fs| bundle_scripts(&fs));
            if tx.blocking_send(HubMsg::BundleReady { id, scripts }).is_err() {
                debug!("hub"; "bundle ready after shutdown, dropping");
            }
        });
    }
}
