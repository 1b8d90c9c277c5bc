//! Preview server with editor synchronization.
//!
//! | Route                  | Response                                   |
//! |------------------------|--------------------------------------------|
//! | `/`, `/preview.html`   | live preview document                      |
//! | `/mirror.html`         | read-only observer document                |
//! | `/bridge.js`           | connection bridge, WebSocket port injected |
//! | `/scripts/<artifact>`  | build output, deferred until ready         |

mod lifecycle;
mod response;

use crate::{
    actor::Coordinator,
    bundle::{BuildQueue, WatchPipeline},
    config::{DEFAULT_WS_PORT, PreviewConfig, cfg},
    content::{ContentServer, SCRIPTS_PREFIX, ScriptRequest},
    embed::serve::BRIDGE_URL,
    log,
    pattern::{DirectoryPatternProvider, PatternProvider},
    protocol::SessionState,
};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use rayon::ThreadPool;
use crossbeam::channel;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use tiny_http::{Method, Request, Server};

/// Request worker threads. They never wait on a rebuild.
const REQUEST_THREADS: usize = 8;

/// Threads parked on deferred script requests until their rebuild ends.
const WAIT_THREADS: usize = 64;

/// Actual WebSocket port (may differ from the configured one if it was in use)
/// Updated by coordinator after WebSocket server binds successfully
static ACTUAL_WS_PORT: AtomicU16 = AtomicU16::new(DEFAULT_WS_PORT);

/// Update the actual WebSocket port (called by coordinator after binding)
pub fn set_actual_ws_port(port: u16) {
    ACTUAL_WS_PORT.store(port, Ordering::Relaxed);
}

fn actual_ws_port() -> u16 {
    ACTUAL_WS_PORT.load(Ordering::Relaxed)
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop
pub fn bind_server(config: &PreviewConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    set_actual_ws_port(config.serve.ws_port);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server_for_shutdown(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}/preview.html", addr);

    Ok(BoundServer {
        server,
        addr,
        shutdown_rx,
    })
}

/// Bind, start the hub and serve until Ctrl+C.
pub fn serve() -> Result<()> {
    let config = cfg();
    let bound = bind_server(&config)?;

    let queue = Arc::new(BuildQueue::new(Arc::new(WatchPipeline::from_config(&config))));
    let session = Arc::new(ArcSwap::from_pointee(SessionState::new()));
    let patterns: Arc<dyn PatternProvider> = Arc::new(DirectoryPatternProvider::from_config(&config));

    let content = Arc::new(ContentServer::new(
        Arc::clone(&queue),
        Arc::clone(&session),
        config.serve.ready_timeout(),
    ));
    let coordinator = Coordinator::new(Arc::clone(&config), queue, session, patterns)
        .with_ws_port(config.serve.ws_port);

    bound.run(coordinator, content)
}

impl BoundServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the actor system and the request loop (blocking).
    pub fn run(self, coordinator: Coordinator, content: Arc<ContentServer>) -> Result<()> {
        let coordinator = coordinator.with_shutdown_signal(self.shutdown_rx);
        let actor_handle = lifecycle::spawn_actors(coordinator)?;
        let result = run_request_loop(&self.server, content);
        lifecycle::wait_for_shutdown(actor_handle);
        result
    }
}

fn run_request_loop(server: &Server, content: Arc<ContentServer>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("preview-http-{i}"))
        .build()
        .context("failed to create request thread pool")?;
    let waiters = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(WAIT_THREADS)
            .thread_name(|i| format!("preview-wait-{i}"))
            .build()
            .context("failed to create script wait pool")?,
    );

    for request in server.incoming_requests() {
        let content = Arc::clone(&content);
        let waiters = Arc::clone(&waiters);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &content, &waiters) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, content: &ContentServer, waiters: &ThreadPool) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_owned();
    match route(&url) {
        Route::Document => response::respond_html(request, content.serve_document()),
        Route::Mirror => response::respond_html(request, content.serve_mirror()),
        Route::Bridge => response::respond_bridge_js(request, actual_ws_port()),
        Route::Script => match content.script(&url) {
            ScriptRequest::Ready(outcome) => response::respond_script(request, outcome),
            ScriptRequest::Pending(pending) => {
                waiters.spawn(move || {
                    if let Err(e) = response::respond_script(request, pending.wait()) {
                        log!("serve"; "request error: {e}");
                    }
                });
                Ok(())
            }
        },
        Route::NotFound => response::respond_not_found(request),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Document,
    Mirror,
    Bridge,
    Script,
    NotFound,
}

fn route(url: &str) -> Route {
    let path = url.split_once(['?', '#']).map_or(url, |(path, _)| path);
    match path {
        "/" | "/preview.html" => Route::Document,
        "/mirror.html" => Route::Mirror,
        BRIDGE_URL => Route::Bridge,
        _ if path.starts_with(&format!("{SCRIPTS_PREFIX}/")) => Route::Script,
        _ => Route::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::testing::{ScriptedPipeline, fs_with};
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::path::Path;
    use std::time::Duration;

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_document_served_while_scripts_wait() {
        let pipeline = ScriptedPipeline::new();
        let queue = Arc::new(BuildQueue::new(Arc::new(pipeline.clone())));
        queue.start(Path::new("/sg"), &[]);
        pipeline.begin();
        let session = Arc::new(ArcSwap::from_pointee(SessionState::new()));
        let content = Arc::new(ContentServer::new(
            Arc::clone(&queue),
            session,
            Duration::from_secs(10),
        ));

        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        {
            let server = Arc::clone(&server);
            std::thread::spawn(move || run_request_loop(&server, content));
        }

        // More waiting scripts than request threads
        let scripts: Vec<_> = (0..REQUEST_THREADS * 2)
            .map(|_| std::thread::spawn(move || get(addr, "/scripts/components.js")))
            .collect();
        std::thread::sleep(Duration::from_millis(200));

        let document = get(addr, "/preview.html");
        assert!(document.starts_with("HTTP/1.1 200"), "{document}");

        pipeline.finish(fs_with("/components.js", "window.components = {};"));
        for script in scripts {
            let response = script.join().unwrap();
            assert!(response.starts_with("HTTP/1.1 200"), "{response}");
            assert!(response.ends_with("window.components = {};"));
        }
        server.unblock();
    }

    #[test]
    fn test_routes() {
        assert_eq!(route("/"), Route::Document);
        assert_eq!(route("/preview.html?t=1"), Route::Document);
        assert_eq!(route("/mirror.html"), Route::Mirror);
        assert_eq!(route("/bridge.js"), Route::Bridge);
        assert_eq!(route("/scripts/components.js?v=2"), Route::Script);
        assert_eq!(route("/scripts"), Route::NotFound);
        assert_eq!(route("/favicon.ico"), Route::NotFound);
    }

    #[test]
    fn test_ws_port_update() {
        set_actual_ws_port(40001);
        assert_eq!(actual_ws_port(), 40001);
        set_actual_ws_port(DEFAULT_WS_PORT);
    }
}
