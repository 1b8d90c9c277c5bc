//! Build queue and compilation contexts.
//!
//! ```text
//! BuildQueue
//!   └── ArcSwapOption<CompilationContext>   (exactly one live context)
//!         ├── events     newest first: Done, Error, Start, ...
//!         ├── output     Arc<MemoryFs> of the last successful rebuild
//!         ├── listeners  one-shot senders waiting for the next Done
//!         └── handle     the running pipeline
//! ```
//!
//! The "rebuild in flight? → register listener" check in [`BuildQueue::await_ready`]
//! and the "flush listeners" step in `compile_done` take the same lock, so a
//! listener is always fired by the rebuild it was registered during.
//!
//! A new context counts as building from the moment it is installed until its
//! pipeline has launched. A styleguide switch therefore never leaves the queue
//! empty, and waits that arrive mid-switch follow the new pipeline.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

use super::entry::{PatternEntry, entry_map};
use super::event::{BuildEvent, Diagnostic, Diagnostics};
use super::memfs::MemoryFs;
use super::pipeline::{BuildOutput, BuildPipeline, BuildRequest, PipelineHandle, PipelineHooks};
use crate::core::Token;
use crate::pattern::Pattern;

/// Events kept per context. Only the newest one drives readiness.
const EVENT_HISTORY: usize = 32;

/// Capacity of the build event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why a deferred readiness wait ended without a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadyError {
    /// The context was replaced or closed before its rebuild finished.
    #[error("build was interrupted")]
    Interrupted,

    #[error("timed out waiting for build")]
    TimedOut,
}

/// Readiness of the current build.
#[derive(Debug)]
pub enum ReadyTicket {
    /// No rebuild in flight.
    Immediate(Arc<MemoryFs>),
    /// Resolved by the next `Done` of the same context.
    Deferred(Receiver<Arc<MemoryFs>>),
}

impl ReadyTicket {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Block until the build is ready.
    pub fn wait(self, timeout: Duration) -> Result<Arc<MemoryFs>, ReadyError> {
        match self {
            Self::Immediate(fs) => Ok(fs),
            Self::Deferred(rx) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ReadyError::TimedOut,
                RecvTimeoutError::Disconnected => ReadyError::Interrupted,
            }),
        }
    }

    /// Non-blocking check, `None` while still pending.
    pub fn try_ready(&self) -> Option<Result<Arc<MemoryFs>, ReadyError>> {
        match self {
            Self::Immediate(fs) => Some(Ok(Arc::clone(fs))),
            Self::Deferred(rx) => match rx.try_recv() {
                Ok(fs) => Some(Ok(fs)),
                Err(channel::TryRecvError::Empty) => None,
                Err(channel::TryRecvError::Disconnected) => Some(Err(ReadyError::Interrupted)),
            },
        }
    }
}

struct ContextState {
    events: VecDeque<BuildEvent>,
    output: Arc<MemoryFs>,
    listeners: Vec<Sender<Arc<MemoryFs>>>,
    handle: Option<Box<dyn PipelineHandle>>,
    /// Installed, pipeline not launched yet
    pending: bool,
    closed: bool,
}

impl ContextState {
    fn record(&mut self, event: BuildEvent, publish: &broadcast::Sender<BuildEvent>) {
        // No receivers is normal before the hub subscribes.
        let _ = publish.send(event.clone());
        self.events.push_front(event);
        self.events.truncate(EVENT_HISTORY);
    }
}

/// One styleguide selection and its running pipeline.
pub struct CompilationContext {
    id: Token,
    target: PathBuf,
    state: Mutex<ContextState>,
    publish: broadcast::Sender<BuildEvent>,
}

impl CompilationContext {
    fn new(target: PathBuf, publish: broadcast::Sender<BuildEvent>) -> Self {
        Self {
            id: Token::generate(),
            target,
            state: Mutex::new(ContextState {
                events: VecDeque::new(),
                output: Arc::new(MemoryFs::new()),
                listeners: Vec::new(),
                handle: None,
                pending: true,
                closed: false,
            }),
            publish,
        }
    }

    pub fn id(&self) -> &Token {
        &self.id
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Most recent event, if any rebuild has started.
    pub fn latest_event(&self) -> Option<BuildEvent> {
        self.state.lock().events.front().cloned()
    }

    /// Event log, newest first.
    pub fn events(&self) -> Vec<BuildEvent> {
        self.state.lock().events.iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Output of the last successful rebuild.
    pub fn output(&self) -> Arc<MemoryFs> {
        Arc::clone(&self.state.lock().output)
    }

    fn await_ready(&self) -> ReadyTicket {
        let mut state = self.state.lock();
        let building = state.pending || state.events.front().is_some_and(BuildEvent::is_start);
        if !building || state.closed {
            return ReadyTicket::Immediate(Arc::clone(&state.output));
        }

        let (tx, rx) = channel::bounded(1);
        state.listeners.push(tx);
        ReadyTicket::Deferred(rx)
    }

    fn compile_started(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.record(BuildEvent::start(), &self.publish);
    }

    fn compile_done(&self, output: BuildOutput) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        if output.diagnostics.has_errors() {
            state.record(BuildEvent::error(output.diagnostics), &self.publish);
        } else {
            state.output = Arc::new(output.fs);
        }
        state.record(BuildEvent::done(), &self.publish);

        let fs = Arc::clone(&state.output);
        for listener in state.listeners.drain(..) {
            let _ = listener.send(Arc::clone(&fs));
        }
    }

    /// Pipeline could not be started: record the failure as a finished,
    /// failed rebuild so waiters are never left hanging.
    fn start_failed(&self, diagnostics: Diagnostics) {
        let mut state = self.state.lock();
        state.pending = false;
        state.record(BuildEvent::error(diagnostics), &self.publish);
        state.record(BuildEvent::done(), &self.publish);

        let fs = Arc::clone(&state.output);
        for listener in state.listeners.drain(..) {
            let _ = listener.send(Arc::clone(&fs));
        }
    }

    fn attach(&self, mut handle: Box<dyn PipelineHandle>) {
        let mut state = self.state.lock();
        state.pending = false;
        if state.closed {
            drop(state);
            handle.close();
            return;
        }
        state.handle = Some(handle);

        // A pipeline that did not announce a rebuild while starting has
        // nothing in flight; waits taken during the launch resolve now.
        if !state.events.front().is_some_and(BuildEvent::is_start) {
            let fs = Arc::clone(&state.output);
            for listener in state.listeners.drain(..) {
                let _ = listener.send(Arc::clone(&fs));
            }
        }
    }

    /// Close the pipeline. Pending listeners are dropped, which resolves
    /// their tickets as [`ReadyError::Interrupted`].
    fn close(&self) {
        let handle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.listeners.clear();
            state.handle.take()
        };

        // Outside the lock: the pipeline thread may be inside a hook.
        if let Some(mut handle) = handle {
            handle.close();
        }
        crate::debug!("bundle"; "closed context for {}", self.target.display());
    }
}

/// Hooks bound to one context. Weak, so a closed context is freed even if
/// a pipeline thread lingers.
struct ContextHooks {
    context: Weak<CompilationContext>,
}

impl PipelineHooks for ContextHooks {
    fn compile_started(&self) {
        if let Some(context) = self.context.upgrade() {
            context.compile_started();
        }
    }

    fn compile_done(&self, output: BuildOutput) {
        if let Some(context) = self.context.upgrade() {
            context.compile_done(output);
        }
    }
}

/// Owns the single live [`CompilationContext`].
pub struct BuildQueue {
    pipeline: Arc<dyn BuildPipeline>,
    current: ArcSwapOption<CompilationContext>,
    events: broadcast::Sender<BuildEvent>,
}

impl BuildQueue {
    pub fn new(pipeline: Arc<dyn BuildPipeline>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pipeline,
            current: ArcSwapOption::empty(),
            events,
        }
    }

    /// Replace the current context with a new one building `patterns`
    /// relative to `target`.
    ///
    /// The new context replaces the current one in a single swap; the previous
    /// pipeline is closed before the new one starts. A start failure still
    /// installs the new context, with an `Error` and a `Done` event recorded.
    pub fn start(&self, target: &Path, patterns: &[Pattern]) -> Arc<CompilationContext> {
        let entries: Vec<PatternEntry> = entry_map(target, patterns);
        let context = Arc::new(CompilationContext::new(target.to_path_buf(), self.events.clone()));
        if let Some(previous) = self.current.swap(Some(Arc::clone(&context))) {
            previous.close();
        }

        let hooks: Arc<dyn PipelineHooks> = Arc::new(ContextHooks {
            context: Arc::downgrade(&context),
        });

        crate::debug!("bundle"; "starting build of {} entries in {}", entries.len(), target.display());
        let request = BuildRequest {
            context: target.to_path_buf(),
            entries,
        };

        match self.pipeline.start(request, hooks) {
            Ok(handle) => context.attach(handle),
            Err(e) => {
                crate::log!("bundle"; "failed to start build: {}", e);
                let mut diagnostics = Diagnostics::new();
                diagnostics.push(Diagnostic::new(e.to_string()));
                context.start_failed(diagnostics);
            }
        }

        context
    }

    /// Readiness of the current context. Resolves immediately with an empty
    /// filesystem when nothing was ever started.
    pub fn await_ready(&self) -> ReadyTicket {
        match self.current.load_full() {
            Some(context) => context.await_ready(),
            None => ReadyTicket::Immediate(Arc::new(MemoryFs::new())),
        }
    }

    pub fn current(&self) -> Option<Arc<CompilationContext>> {
        self.current.load_full()
    }

    pub fn current_target(&self) -> Option<PathBuf> {
        self.current.load().as_ref().map(|c| c.target.clone())
    }

    /// Build events of every context installed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    /// Close the current context, if any.
    pub fn close(&self) {
        if let Some(previous) = self.current.swap(None) {
            previous.close();
        }
    }
}
