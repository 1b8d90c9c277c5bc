use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::client_io::poll_clients;
use super::*;
use crate::bundle::ReadyTicket;
use crate::bundle::testing::{ScriptedPipeline, fs_with};
use crate::pattern::Pattern;

// =============================================================================
// Test doubles
// =============================================================================

struct Wire {
    sent: Vec<String>,
    inbound: VecDeque<String>,
    state: ReadyState,
    fail_sends: bool,
    closed: bool,
}

/// Test side of a [`RecordingConnection`].
#[derive(Clone)]
struct Recorder(Arc<Mutex<Wire>>);

impl Recorder {
    fn new(state: ReadyState) -> Self {
        Self(Arc::new(Mutex::new(Wire {
            sent: Vec::new(),
            inbound: VecDeque::new(),
            state,
            fail_sends: false,
            closed: false,
        })))
    }

    fn connection(&self) -> Box<dyn Connection> {
        Box::new(RecordingConnection(self.clone()))
    }

    fn messages(&self) -> Vec<Message> {
        let wire = self.0.lock();
        wire.sent.iter().map(|text| Message::from_json(text).unwrap()).collect()
    }

    fn kinds(&self) -> Vec<MessageType> {
        self.messages().into_iter().map(|m| m.kind).collect()
    }

    fn set_state(&self, state: ReadyState) {
        self.0.lock().state = state;
    }

    fn fail_sends(&self) {
        self.0.lock().fail_sends = true;
    }

    fn push_inbound(&self, text: &str) {
        self.0.lock().inbound.push_back(text.to_owned());
    }

    fn is_closed(&self) -> bool {
        self.0.lock().closed
    }
}

struct RecordingConnection(Recorder);

impl Connection for RecordingConnection {
    fn ready_state(&self) -> ReadyState {
        self.0.0.lock().state
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut wire = self.0.0.lock();
        if wire.fail_sends {
            return Err(TransportError::Closed);
        }
        wire.sent.push(text.to_owned());
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<String>, TransportError> {
        let mut wire = self.0.0.lock();
        if wire.state == ReadyState::Closed {
            return Err(TransportError::Closed);
        }
        Ok(wire.inbound.pop_front())
    }

    fn close(&mut self) {
        let mut wire = self.0.0.lock();
        wire.closed = true;
        wire.state = ReadyState::Closed;
    }
}

/// Preview that asks for its scripts as soon as it is told to reload.
struct ReloadingPreview {
    queue: Arc<BuildQueue>,
    tickets: Arc<Mutex<Vec<ReadyTicket>>>,
}

impl Connection for ReloadingPreview {
    fn ready_state(&self) -> ReadyState {
        ReadyState::Open
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if Message::from_json(text).is_ok_and(|m| m.kind == MessageType::Reload) {
            self.tickets.lock().push(self.queue.await_ready());
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<String>, TransportError> {
        Ok(None)
    }

    fn close(&mut self) {}
}

/// `None` fails discovery.
struct StaticPatterns(Option<Vec<Pattern>>);

impl PatternProvider for StaticPatterns {
    fn patterns(&self, _change: &StyleguideChange) -> anyhow::Result<Vec<Pattern>> {
        self.0.clone().ok_or_else(|| anyhow::anyhow!("pattern directory not found"))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Fixture {
    hub: Hub,
    pipeline: ScriptedPipeline,
    session: Arc<ArcSwap<SessionState>>,
}

fn fixture_with(patterns: StaticPatterns) -> Fixture {
    let pipeline = ScriptedPipeline::new();
    let queue = Arc::new(BuildQueue::new(Arc::new(pipeline.clone())));
    let session = Arc::new(ArcSwap::from_pointee(SessionState::new()));
    let hub = Hub::new(queue, Arc::new(patterns), Arc::clone(&session));
    Fixture {
        hub,
        pipeline,
        session,
    }
}

fn fixture() -> Fixture {
    fixture_with(StaticPatterns(Some(vec![Pattern::new(
        "button",
        Some(PathBuf::from("/a/patterns/button/index.js")),
    )])))
}

fn connect(hub: &mut Hub, role: Role) -> Recorder {
    let recorder = Recorder::new(ReadyState::Open);
    hub.attach(recorder.connection(), role);
    recorder
}

fn styleguide(path: &str) -> Message {
    Message::new(MessageType::StyleguideChange, json!({ "styleguidePath": path }))
}

fn editor(kind: MessageType, payload: Value) -> Message {
    Message::new(kind, payload)
}

// =============================================================================
// Styleguide selection
// =============================================================================

#[test]
fn test_reselecting_same_styleguide_is_noop() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    let initial_id = f.hub.session().id.clone();

    f.hub.handle_editor(styleguide("/a"));
    let first_id = f.hub.session().id.clone();
    assert_ne!(first_id, initial_id);
    assert_eq!(f.pipeline.starts(), 1);
    assert_eq!(preview.kinds(), [MessageType::State, MessageType::Reload]);

    f.hub.handle_editor(styleguide("/a"));
    assert_eq!(f.pipeline.starts(), 1);
    assert_eq!(f.hub.session().id, first_id);
    assert_eq!(preview.kinds().len(), 2);

    f.hub.handle_editor(styleguide("/b"));
    assert_eq!(f.pipeline.starts(), 2);
    assert_eq!(f.pipeline.closes(), 1);
    assert_ne!(f.hub.session().id, first_id);
    assert_eq!(
        preview.kinds(),
        [MessageType::State, MessageType::Reload, MessageType::Reload]
    );
}

#[test]
fn test_switch_resets_published_session() {
    let mut f = fixture();
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p1"})));
    f.hub.handle_editor(styleguide("/a"));

    let published = f.session.load();
    assert_eq!(published.id, f.hub.session().id);
    assert!(published.payload.active_page.is_none());
}

#[test]
fn test_switch_starts_build_with_discovered_patterns() {
    let mut f = fixture();
    f.hub.handle_editor(styleguide("/a"));

    let request = f.pipeline.last_request().unwrap();
    assert_eq!(request.context, PathBuf::from("/a"));
    assert_eq!(request.entries.len(), 1);
    assert_eq!(request.entries[0].name, "button");
}

#[test]
fn test_failed_discovery_still_switches() {
    let mut f = fixture_with(StaticPatterns(None));
    f.hub.handle_editor(styleguide("/a"));

    assert_eq!(f.pipeline.starts(), 1);
    assert!(f.pipeline.last_request().unwrap().entries.is_empty());
    assert_eq!(f.hub.queue().current_target(), Some(PathBuf::from("/a")));
}

#[test]
fn test_reload_after_switch_waits_for_new_build() {
    let pipeline = ScriptedPipeline::announcing();
    let queue = Arc::new(BuildQueue::new(Arc::new(pipeline.clone())));
    let session = Arc::new(ArcSwap::from_pointee(SessionState::new()));
    let mut hub = Hub::new(Arc::clone(&queue), Arc::new(StaticPatterns(Some(Vec::new()))), session);
    let tickets = Arc::new(Mutex::new(Vec::new()));
    hub.attach(
        Box::new(ReloadingPreview {
            queue: Arc::clone(&queue),
            tickets: Arc::clone(&tickets),
        }),
        Role::Preview,
    );

    hub.handle_editor(styleguide("/a"));
    pipeline.finish(fs_with("/components.js", "a"));
    hub.handle_editor(styleguide("/b"));

    let mut taken = std::mem::take(&mut *tickets.lock());
    assert_eq!(taken.len(), 2);
    let after_switch = taken.pop().unwrap();
    assert!(after_switch.is_deferred());
    assert!(after_switch.try_ready().is_none());

    pipeline.finish(fs_with("/components.js", "b"));
    let fs = after_switch.wait(Duration::from_secs(5)).unwrap();
    assert_eq!(&*fs.read("/components.js").unwrap(), b"b");
}

#[test]
fn test_invalid_styleguide_payload_is_ignored() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    f.hub
        .handle_editor(editor(MessageType::StyleguideChange, json!({"path": 3})));

    assert_eq!(f.pipeline.starts(), 0);
    assert_eq!(preview.kinds(), [MessageType::State]);
}

// =============================================================================
// Session state
// =============================================================================

#[test]
fn test_late_joiner_receives_latest_state() {
    let mut f = fixture();
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p1"})));
    f.hub.handle_editor(editor(MessageType::ElementChange, json!("el-1")));
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p2"})));
    f.hub.handle_editor(editor(MessageType::ElementChange, json!("el-2")));

    let preview = connect(&mut f.hub, Role::Preview);
    let messages = preview.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageType::State);
    assert_eq!(messages[0].id, f.hub.session().id);
    assert_eq!(
        messages[0].payload,
        json!({"activePage": {"id": "p2"}, "activeElementId": "el-2"})
    );
}

#[test]
fn test_element_change_broadcasts_only_the_message() {
    let mut f = fixture();
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p1"})));
    let preview = connect(&mut f.hub, Role::Preview);

    let element = editor(MessageType::ElementChange, json!("el-1"));
    f.hub.handle_editor(element.clone());

    let last = preview.messages().pop().unwrap();
    assert_eq!(last, element);
    assert!(last.payload.get("activePage").is_none());
}

#[test]
fn test_page_change_broadcasts_full_state() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    f.hub.handle_editor(editor(MessageType::ElementChange, json!("el-1")));
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p1"})));

    let last = preview.messages().pop().unwrap();
    assert_eq!(last.kind, MessageType::State);
    assert_eq!(last.payload["activeElementId"], json!("el-1"));
    assert_eq!(last.payload["activePage"], json!({"id": "p1"}));
    assert_eq!(f.session.load().payload.active_element_id, Some(json!("el-1")));
}

#[test]
fn test_page_change_without_payload_clears_page() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    f.hub.handle_editor(editor(MessageType::PageChange, json!({"id": "p1"})));
    let bare = Message::from_json(r#"{"id": "m1", "type": "page-change"}"#).unwrap();
    f.hub.handle_editor(bare);

    let last = preview.messages().pop().unwrap();
    assert_eq!(last.kind, MessageType::State);
    assert!(last.payload.get("activePage").is_none());
    assert!(f.session.load().payload.active_page.is_none());
}

#[test]
fn test_unknown_and_acknowledged_types_do_not_broadcast() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    let before = f.hub.session().clone();

    for kind in [
        MessageType::Unknown("telemetry".into()),
        MessageType::AppLoaded,
        MessageType::ExportHtml,
        MessageType::WindowFocused,
        MessageType::WindowBlured,
        MessageType::State,
        MessageType::Reload,
    ] {
        assert_eq!(f.hub.handle_editor(editor(kind, json!({}))), HubEffect::None);
    }

    assert_eq!(preview.kinds(), [MessageType::State]);
    assert_eq!(f.hub.session(), &before);
}

#[test]
fn test_bundle_change_broadcasts_reload() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    f.hub.handle_editor(editor(MessageType::BundleChange, Value::Null));
    assert_eq!(preview.kinds(), [MessageType::State, MessageType::Reload]);
}

// =============================================================================
// Connections
// =============================================================================

#[test]
fn test_broadcast_skips_connections_that_are_not_open() {
    let mut f = fixture();
    let connecting = Recorder::new(ReadyState::Connecting);
    let closing = Recorder::new(ReadyState::Closing);
    f.hub.attach(connecting.connection(), Role::Preview);
    f.hub.attach(closing.connection(), Role::Preview);

    f.hub.handle_editor(editor(MessageType::BundleChange, Value::Null));
    assert!(connecting.kinds().is_empty());
    assert!(closing.kinds().is_empty());
    assert_eq!(f.hub.client_count(), 2);

    // Opened late: snapshot still comes before the first broadcast
    connecting.set_state(ReadyState::Open);
    f.hub.handle_editor(editor(MessageType::BundleChange, Value::Null));
    assert_eq!(connecting.kinds(), [MessageType::State, MessageType::Reload]);

    closing.set_state(ReadyState::Closed);
    f.hub.handle_editor(editor(MessageType::BundleChange, Value::Null));
    assert_eq!(f.hub.client_count(), 1);
}

#[test]
fn test_send_failure_drops_only_that_client() {
    let mut f = fixture();
    let healthy = connect(&mut f.hub, Role::Preview);
    let broken = connect(&mut f.hub, Role::Preview);
    broken.fail_sends();

    f.hub.handle_editor(editor(MessageType::BundleChange, Value::Null));

    assert_eq!(f.hub.client_count(), 1);
    assert_eq!(healthy.kinds(), [MessageType::State, MessageType::Reload]);
}

#[test]
fn test_failed_greeting_is_not_registered() {
    let mut f = fixture();
    let recorder = Recorder::new(ReadyState::Open);
    recorder.fail_sends();
    f.hub.attach(recorder.connection(), Role::Preview);
    assert_eq!(f.hub.client_count(), 0);
}

#[test]
fn test_editors_are_not_previews() {
    let mut f = fixture();
    let editor_conn = connect(&mut f.hub, Role::Editor);
    let preview = connect(&mut f.hub, Role::Preview);

    let request = editor(MessageType::ContentRequest, json!({"selector": "#a"}));
    f.hub.handle_editor(request.clone());
    assert!(editor_conn.messages().is_empty());
    assert_eq!(preview.messages().last(), Some(&request));

    let response = Message::reply(&request.id, MessageType::ContentResponse, json!("<a/>"));
    f.hub.handle_preview(response.clone());
    assert_eq!(editor_conn.messages(), [response]);
}

#[test]
fn test_reader_routes_by_role() {
    let mut f = fixture();
    let editor_conn = connect(&mut f.hub, Role::Editor);
    let preview = connect(&mut f.hub, Role::Preview);
    let gone = connect(&mut f.hub, Role::Preview);

    editor_conn.push_inbound(&styleguide("/a").to_json());
    editor_conn.push_inbound("not json");
    preview.push_inbound(r#"{"id":"1","type":"sketch-export-response","payload":{}}"#);
    gone.set_state(ReadyState::Closed);

    let inbound = poll_clients(&f.hub.registry(), f.hub.session());

    assert_eq!(inbound.len(), 2);
    assert!(matches!(&inbound[0], HubMsg::Editor(m) if m.kind == MessageType::StyleguideChange));
    assert!(matches!(&inbound[1], HubMsg::Preview(m) if m.kind == MessageType::SketchExportResponse));
    assert_eq!(f.hub.client_count(), 2);
}

#[test]
fn test_shutdown_closes_everything() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    let editor_conn = connect(&mut f.hub, Role::Editor);
    f.hub.handle_editor(styleguide("/a"));

    f.hub.shutdown();

    assert!(preview.is_closed());
    assert!(editor_conn.is_closed());
    assert_eq!(f.hub.client_count(), 0);
    assert_eq!(f.pipeline.closes(), 1);
}

// =============================================================================
// Build events and bundle export
// =============================================================================

#[test]
fn test_build_events_become_messages() {
    let mut f = fixture();
    let preview = connect(&mut f.hub, Role::Preview);
    let mut diagnostics = crate::bundle::Diagnostics::new();
    diagnostics.push(crate::bundle::Diagnostic::in_file("./a/index.js", "Unexpected token"));

    f.hub.handle_build_event(&BuildEvent::start());
    f.hub.handle_build_event(&BuildEvent::error(diagnostics));
    f.hub.handle_build_event(&BuildEvent::done());

    let messages = preview.messages();
    let kinds: Vec<_> = messages.iter().map(|m| m.kind.clone()).collect();
    assert_eq!(kinds, [MessageType::State, MessageType::Update, MessageType::BuildError]);
    assert_eq!(
        messages[2].payload,
        json!({"errors": [{"file": "./a/index.js", "message": "Unexpected token"}]})
    );
}

#[test]
fn test_script_bundle_request_answers_editors() {
    let mut f = fixture();
    let editor_conn = connect(&mut f.hub, Role::Editor);
    let preview = connect(&mut f.hub, Role::Preview);

    let request = editor(MessageType::CreateScriptBundleRequest, Value::Null);
    let effect = f.hub.handle_editor(request.clone());
    assert_eq!(effect, HubEffect::AwaitBundle(request.id.clone()));

    f.hub.finish_bundle(&request.id, Ok("<script>x</script>".into()));
    f.hub.finish_bundle(&request.id, Err(ReadyError::Interrupted));

    let replies = editor_conn.messages();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.id == request.id));
    assert!(replies.iter().all(|r| r.kind == MessageType::CreateScriptBundleResponse));
    assert_eq!(replies[0].payload, json!("<script>x</script>"));
    assert_eq!(replies[1].payload, json!(""));
    assert_eq!(preview.kinds(), [MessageType::State]);
}

#[test]
fn test_bundle_scripts_inline_in_load_order() {
    let mut fs = fs_with("/components.js", "var a = '</script>';");
    fs.write("/renderer.js", "render()").unwrap();
    fs.write("/preview.js", "boot()").unwrap();

    let scripts = bundle_scripts(&fs);
    let components = scripts.find("data-script=\"components\"").unwrap();
    let renderer = scripts.find("data-script=\"renderer\"").unwrap();
    let preview = scripts.find("data-script=\"preview\"").unwrap();
    assert!(components < renderer && renderer < preview);
    assert!(scripts.contains("<\\/script>"));

    assert_eq!(bundle_scripts(&crate::bundle::MemoryFs::new()), "");
}

// =============================================================================
// Actor
// =============================================================================

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_actor_round_trip() {
    let f = fixture();
    let (tx, rx) = mpsc::channel(32);
    let actor = HubActor::new(f.hub, rx, tx.clone(), Duration::from_secs(5));
    let handle = tokio::spawn(actor.run());

    let editor_conn = Recorder::new(ReadyState::Open);
    let preview = Recorder::new(ReadyState::Open);
    tx.send(HubMsg::Attach { conn: editor_conn.connection(), role: Role::Editor })
        .await
        .unwrap();
    tx.send(HubMsg::Attach { conn: preview.connection(), role: Role::Preview })
        .await
        .unwrap();
    tx.send(HubMsg::Editor(styleguide("/a"))).await.unwrap();

    let pipeline = f.pipeline.clone();
    wait_until(|| pipeline.starts() == 1).await;

    // Build events reach previews through the actor
    f.pipeline.begin();
    wait_until(|| preview.kinds().contains(&MessageType::Update)).await;

    let request = editor(MessageType::CreateScriptBundleRequest, Value::Null);
    tx.send(HubMsg::Editor(request.clone())).await.unwrap();
    f.pipeline.finish(fs_with("/components.js", "window.components = {};"));

    wait_until(|| !editor_conn.messages().is_empty()).await;
    let reply = editor_conn.messages().remove(0);
    assert_eq!(reply.id, request.id);
    assert!(reply.payload.as_str().unwrap().contains("window.components = {};"));

    tx.send(HubMsg::Shutdown).await.unwrap();
    handle.await.unwrap();
    assert!(preview.is_closed());
    assert!(editor_conn.is_closed());
}
