//! Actor Coordinator - Wires up the Preview Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Creates the hub inbox
//! - Starts the WebSocket acceptor feeding it
//! - Selects the startup styleguide
//! - Runs the hub until shutdown

mod runtime;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::hub::{Hub, HubActor};
use super::messages::HubMsg;
use crate::bundle::BuildQueue;
use crate::config::PreviewConfig;
use crate::pattern::PatternProvider;
use crate::protocol::{Message, MessageType, SessionState, StyleguideChange};

const CHANNEL_BUFFER: usize = 32;

/// In-process editor: submits messages exactly like an `/editor` connection.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<HubMsg>,
}

impl EngineHandle {
    pub async fn submit(&self, msg: Message) -> Result<()> {
        self.tx
            .send(HubMsg::Editor(msg))
            .await
            .map_err(|_| anyhow!("hub is not running"))
    }

    pub async fn select_styleguide(&self, change: &StyleguideChange) -> Result<()> {
        let payload = serde_json::to_value(change)?;
        self.submit(Message::new(MessageType::StyleguideChange, payload))
            .await
    }
}

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    config: Arc<PreviewConfig>,
    queue: Arc<BuildQueue>,
    session: Arc<ArcSwap<SessionState>>,
    patterns: Arc<dyn PatternProvider>,
    hub_tx: mpsc::Sender<HubMsg>,
    hub_rx: mpsc::Receiver<HubMsg>,
    ws_port: Option<u16>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(
        config: Arc<PreviewConfig>,
        queue: Arc<BuildQueue>,
        session: Arc<ArcSwap<SessionState>>,
        patterns: Arc<dyn PatternProvider>,
    ) -> Self {
        let (hub_tx, hub_rx) = mpsc::channel(CHANNEL_BUFFER);
        Self {
            config,
            queue,
            session,
            patterns,
            hub_tx,
            hub_rx,
            ws_port: None,
            shutdown_rx: None,
        }
    }

    /// Set WebSocket port.
    pub fn with_ws_port(mut self, port: u16) -> Self {
        self.ws_port = Some(port);
        self
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.hub_tx.clone(),
        }
    }

    /// Run the actor system.
    pub async fn run(self) -> Result<()> {
        if let Some(port) = self.ws_port {
            match crate::reload::server::start_ws_server(port, self.hub_tx.clone()) {
                Ok(actual_port) => crate::cli::serve::set_actual_ws_port(actual_port),
                Err(e) => crate::log!("ws"; "websocket server failed: {:#}", e),
            }
        }

        let handle = self.handle();
        let hub = Hub::new(self.queue, self.patterns, self.session);
        let actor = HubActor::new(
            hub,
            self.hub_rx,
            self.hub_tx.clone(),
            self.config.serve.ready_timeout(),
        );

        if let Some(path) = self.config.startup_styleguide() {
            handle.select_styleguide(&StyleguideChange::new(path)).await?;
        }

        crate::debug!("actor"; "start");
        runtime::run_hub(actor, self.hub_tx, self.shutdown_rx).await;
        crate::debug!("actor"; "stopped");
        Ok(())
    }
}
