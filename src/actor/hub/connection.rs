//! Client connections as seen by the hub.
//!
//! The hub only needs four things from a transport: its ready state, sending
//! a text frame, polling for an inbound frame and closing. WebSocket clients
//! implement [`Connection`] in `client_io`; tests use a recording double.

use thiserror::Error;

use crate::protocol::SessionState;

/// WebSocket-style connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Which side of the protocol a client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Preview surface: receives broadcasts, its messages go upstream.
    Preview,
    /// Editor: its messages drive the hub.
    Editor,
}

impl Role {
    /// Role selected by the WebSocket request path.
    pub fn from_path(path: &str) -> Self {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        match path.trim_end_matches('/') {
            "/editor" => Self::Editor,
            _ => Self::Preview,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// A live bidirectional channel to one client.
pub trait Connection: Send {
    fn ready_state(&self) -> ReadyState;

    /// Queue a text frame.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Next inbound text frame, if one is available without blocking.
    fn poll(&mut self) -> Result<Option<String>, TransportError>;

    fn close(&mut self);

    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }
}

/// Registry entry.
pub(crate) struct Client {
    pub(crate) id: u64,
    pub(crate) role: Role,
    pub(crate) conn: Box<dyn Connection>,
    /// Session snapshot already delivered.
    pub(crate) greeted: bool,
}

impl Client {
    pub(crate) fn new(id: u64, role: Role, conn: Box<dyn Connection>) -> Self {
        Self {
            id,
            role,
            conn,
            greeted: false,
        }
    }

    /// Preview clients get exactly one snapshot, as soon as they are open.
    pub(crate) fn greet(&mut self, state: &SessionState) -> Result<(), TransportError> {
        if self.greeted || self.role != Role::Preview || !self.conn.is_open() {
            return Ok(());
        }
        self.conn.send(&state.to_message().to_json())?;
        self.greeted = true;
        Ok(())
    }
}
