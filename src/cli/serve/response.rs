//! HTTP response handlers.

use crate::content::ScriptResponse;
use crate::embed::serve::{BRIDGE_JS, BridgeVars};
use crate::log;
use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

const HTML: &str = "text/html; charset=utf-8";
const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
const PLAIN: &str = "text/plain; charset=utf-8";

/// Respond with a rendered document.
pub fn respond_html(request: Request, body: String) -> Result<()> {
    send_body(request, 200, HTML, body.into_bytes())
}

/// Respond with the outcome of a deferred script request.
pub fn respond_script(request: Request, outcome: ScriptResponse) -> Result<()> {
    match outcome {
        ScriptResponse::Found(bytes) => send_body(request, 200, JAVASCRIPT, bytes.to_vec()),
        ScriptResponse::NotFound => send_body(request, 404, PLAIN, b"404 Not Found".to_vec()),
        ScriptResponse::ServerError(message) => {
            log!("serve"; "{}: {}", request.url(), message);
            send_body(request, 500, PLAIN, b"500 Internal Server Error".to_vec())
        }
        ScriptResponse::Interrupted => respond_unavailable(request),
    }
}

/// Respond with bridge.js from memory.
pub fn respond_bridge_js(request: Request, ws_port: u16) -> Result<()> {
    let body = BRIDGE_JS.render(&BridgeVars { ws_port });
    send_body(request, 200, JAVASCRIPT, body.into_bytes())
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (shutting down, or the build was
/// replaced while the request waited).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, PLAIN, b"405 Method Not Allowed".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let body = if is_head_request(&request) {
        Vec::new()
    } else {
        body
    };

    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for header in [
        make_header("Content-Type", content_type),
        // Artifacts change on every rebuild
        make_header("Cache-Control", "no-cache"),
    ]
    .into_iter()
    .flatten()
    {
        response.add_header(header);
    }

    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Option<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).ok()
}
