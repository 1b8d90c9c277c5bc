use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message as WsMessage;

use super::Registry;
use super::connection::{Connection, ReadyState, Role, TransportError};
use crate::actor::messages::HubMsg;
use crate::protocol::{Message, SessionState};
use crate::{debug, log};

/// How often the reader thread polls idle clients.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handshaken WebSocket on a non-blocking stream.
pub struct WsConnection {
    ws: WebSocket<TcpStream>,
}

impl WsConnection {
    /// Wrap a socket after the handshake; reads become non-blocking.
    pub fn new(ws: WebSocket<TcpStream>) -> std::io::Result<Self> {
        ws.get_ref().set_nonblocking(true)?;
        Ok(Self { ws })
    }
}

fn would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if io.kind() == ErrorKind::WouldBlock)
}

impl Connection for WsConnection {
    fn ready_state(&self) -> ReadyState {
        match (self.ws.can_read(), self.ws.can_write()) {
            (_, true) => ReadyState::Open,
            (true, false) => ReadyState::Closing,
            (false, false) => ReadyState::Closed,
        }
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        match self.ws.send(WsMessage::Text(text.to_owned().into())) {
            Ok(()) => Ok(()),
            // Frame is buffered; the next read or send flushes it
            Err(e) if would_block(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn poll(&mut self) -> Result<Option<String>, TransportError> {
        match self.ws.read() {
            Ok(WsMessage::Text(text)) => Ok(Some(text.as_str().to_owned())),
            Ok(WsMessage::Close(_)) => Err(TransportError::Closed),
            Ok(_) => Ok(None),
            Err(e) if would_block(&e) => Ok(None),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(TransportError::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}

/// Background thread reading client frames (non-blocking poll).
///
/// Parsed messages are forwarded to the hub inbox by role. Previews that
/// became open since attaching are greeted here, so they never wait for the
/// next broadcast to see the current state.
pub(super) fn spawn_reader(
    clients: Registry,
    session: Arc<ArcSwap<SessionState>>,
    hub_tx: mpsc::Sender<HubMsg>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("preview-ws-reader".into())
        .spawn(move || {
            while !hub_tx.is_closed() {
                std::thread::sleep(POLL_INTERVAL);

                // Collected under the lock, forwarded after releasing it:
                // the hub takes the same lock while handling them.
                let inbound = poll_clients(&clients, &session.load());
                for msg in inbound {
                    if hub_tx.blocking_send(msg).is_err() {
                        return;
                    }
                }
            }
            debug!("ws"; "reader stopped");
        })
}

pub(super) fn poll_clients(clients: &Registry, state: &SessionState) -> Vec<HubMsg> {
    let mut inbound = Vec::new();
    let mut clients = clients.lock();

    clients.retain_mut(|client| {
        if let Err(e) = client.greet(state) {
            debug!("ws"; "client {} disconnected: {}", client.id, e);
            return false;
        }

        loop {
            match client.conn.poll() {
                Ok(Some(text)) => match Message::from_json(&text) {
                    Ok(msg) => inbound.push(match client.role {
                        Role::Editor => HubMsg::Editor(msg),
                        Role::Preview => HubMsg::Preview(msg),
                    }),
                    Err(e) => log!("ws"; "malformed message from client {}: {}", client.id, e),
                },
                Ok(None) => return client.conn.ready_state() != ReadyState::Closed,
                Err(e) => {
                    debug!("ws"; "client {} disconnected: {}", client.id, e);
                    return false;
                }
            }
        }
    });

    inbound
}
