//! WebSocket Server for Preview and Editor Connections
//!
//! Accepts TCP clients on a dedicated port, performs the WebSocket handshake
//! and hands the connection to the hub. The request path picks the role:
//! `/editor` for the editor, anything else for a preview surface.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};

use crate::actor::hub::{Role, WsConnection};
use crate::actor::messages::HubMsg;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Idle wait between non-blocking accepts
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Upper bound for a client to finish its handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the acceptor thread. Returns the port actually bound.
pub fn start_ws_server(base_port: u16, hub_tx: mpsc::Sender<HubMsg>) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    if base_port != 0 && actual_port != base_port {
        crate::log!("ws"; "port {} in use, using {} instead", base_port, actual_port);
    }
    crate::debug!("ws"; "ws://127.0.0.1:{}", actual_port);

    std::thread::Builder::new()
        .name("preview-ws-accept".into())
        .spawn(move || accept_loop(&listener, &hub_tx))?;

    Ok(actual_port)
}

fn accept_loop(listener: &TcpListener, hub_tx: &mpsc::Sender<HubMsg>) {
    while !hub_tx.is_closed() {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("ws"; "client connected: {}", addr);
                let Some((conn, role)) = handshake(stream) else {
                    continue;
                };
                let msg = HubMsg::Attach {
                    conn: Box::new(conn),
                    role,
                };
                if hub_tx.blocking_send(msg).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                crate::log!("ws"; "accept error: {}", e);
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
    crate::debug!("ws"; "acceptor stopped");
}

/// Blocking handshake; the connection switches to non-blocking afterwards.
fn handshake(stream: TcpStream) -> Option<(WsConnection, Role)> {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT));

    let mut role = Role::Preview;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        role = Role::from_path(request.uri().path());
        Ok(response)
    };

    let ws = match tungstenite::accept_hdr(stream, callback) {
        Ok(ws) => ws,
        Err(e) => {
            crate::log!("ws"; "handshake failed: {}", e);
            return None;
        }
    };

    let _ = ws.get_ref().set_read_timeout(None);
    match WsConnection::new(ws) {
        Ok(conn) => Some((conn, role)),
        Err(e) => {
            crate::log!("ws"; "failed to configure connection: {}", e);
            None
        }
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
