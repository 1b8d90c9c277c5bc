//! Watch-mode build pipeline.
//!
//! ```text
//! notify → crossbeam channel → Debouncer (pure timing) → Bundler → hooks
//!                                    ↑
//!                          stop channel (handle close)
//! ```
//!
//! The watcher is attached before the initial build, so edits made while
//! it runs are buffered and picked up by the next cycle. The initial build's
//! compile-start fires inside [`BuildPipeline::start`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use super::bundler::Bundler;
use super::debouncer::Debouncer;
use super::pipeline::{BuildError, BuildPipeline, BuildRequest, PipelineHandle, PipelineHooks};
use crate::config::PreviewConfig;

/// Rebuilds the entry set whenever one of its implementation files changes.
#[derive(Debug, Clone)]
pub struct WatchPipeline {
    bundler: Bundler,
    debounce: Duration,
    cooldown: Duration,
}

impl WatchPipeline {
    pub fn new(bundler: Bundler, debounce: Duration, cooldown: Duration) -> Self {
        Self {
            bundler,
            debounce,
            cooldown,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(
            Bundler::new(config.bundle.minify),
            Duration::from_millis(config.bundle.debounce_ms),
            Duration::from_millis(config.bundle.cooldown_ms),
        )
    }
}

impl BuildPipeline for WatchPipeline {
    fn start(
        &self,
        request: BuildRequest,
        hooks: Arc<dyn PipelineHooks>,
    ) -> Result<Box<dyn PipelineHandle>, BuildError> {
        if !request.context.is_dir() {
            return Err(BuildError::MissingContext(request.context));
        }

        // Watcher first: events buffer in notify_rx during the initial build
        let (notify_tx, notify_rx) = channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .map_err(|source| BuildError::Watch {
            path: request.context.clone(),
            source,
        })?;

        let sources: FxHashSet<PathBuf> = request.entries.iter().map(|e| e.source.clone()).collect();
        let dirs: FxHashSet<PathBuf> = sources
            .iter()
            .filter_map(|s| s.parent().map(PathBuf::from))
            .collect();
        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| BuildError::Watch {
                    path: dir.clone(),
                    source,
                })?;
        }

        // Announced before returning, so readiness waits started right after
        // a styleguide switch are deferred to the initial build.
        hooks.compile_started();

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let worker = WatchWorker {
            bundler: self.bundler,
            request,
            sources,
            hooks,
            debouncer: Debouncer::new(self.debounce, self.cooldown),
        };
        std::thread::Builder::new()
            .name("preview-watch".into())
            .spawn(move || worker.run(notify_rx, stop_rx))?;

        Ok(Box::new(WatchHandle {
            stop: Some(stop_tx),
            watcher: Some(watcher),
        }))
    }
}

struct WatchWorker {
    bundler: Bundler,
    request: BuildRequest,
    /// Implementation files of the entry set
    sources: FxHashSet<PathBuf>,
    hooks: Arc<dyn PipelineHooks>,
    debouncer: Debouncer,
}

impl WatchWorker {
    fn run(
        mut self,
        notify_rx: Receiver<notify::Result<notify::Event>>,
        stop_rx: Receiver<()>,
    ) {
        self.finish_rebuild();
        self.debouncer.mark_compiled();

        loop {
            crossbeam::channel::select! {
                // Disconnect of the stop sender is the stop signal
                recv(stop_rx) -> _ => break,
                recv(notify_rx) -> msg => match msg {
                    Ok(Ok(event)) => {
                        if event.paths.iter().any(|p| self.sources.contains(p)) {
                            self.debouncer.add_event(&event);
                        }
                    }
                    Ok(Err(e)) => crate::log!("watch"; "notify error: {}", e),
                    Err(_) => break,
                },
                default(self.debouncer.sleep_duration()) => {
                    if let Some(changes) = self.debouncer.take_if_ready() {
                        crate::debug!("watch"; "{} changed file(s), rebuilding", changes.len());
                        self.rebuild();
                    }
                }
            }
        }

        crate::debug!("watch"; "stopped watching {}", self.request.context.display());
    }

    fn rebuild(&self) {
        self.hooks.compile_started();
        self.finish_rebuild();
    }

    fn finish_rebuild(&self) {
        let output = self.bundler.bundle(&self.request);
        self.hooks.compile_done(output);
    }
}

struct WatchHandle {
    stop: Option<Sender<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl PipelineHandle for WatchHandle {
    fn close(&mut self) {
        // Dropping both ends the worker loop at its next wakeup; an in-flight
        // rebuild finishes against a closed context and is ignored.
        self.watcher.take();
        self.stop.take();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}
