//! Scripted pipeline: rebuilds happen only when a test says so.

use std::sync::Arc;

use parking_lot::Mutex;

use super::event::{Diagnostic, Diagnostics};
use super::memfs::MemoryFs;
use super::pipeline::{
    BuildError, BuildOutput, BuildPipeline, BuildRequest, PipelineHandle, PipelineHooks,
};

#[derive(Default)]
struct Script {
    requests: Vec<BuildRequest>,
    hooks: Vec<Arc<dyn PipelineHooks>>,
    closes: usize,
    fail_next: bool,
    /// Fire compile-start from `start`, like the watch pipeline
    announce: bool,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedPipeline {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A pipeline that announces its initial rebuild while starting.
    pub(crate) fn announcing() -> Self {
        let pipeline = Self::default();
        pipeline.script.lock().announce = true;
        pipeline
    }

    pub(crate) fn starts(&self) -> usize {
        self.script.lock().requests.len()
    }

    pub(crate) fn closes(&self) -> usize {
        self.script.lock().closes
    }

    pub(crate) fn last_request(&self) -> Option<BuildRequest> {
        self.script.lock().requests.last().cloned()
    }

    pub(crate) fn fail_next_start(&self) {
        self.script.lock().fail_next = true;
    }

    fn hooks(&self, generation: usize) -> Arc<dyn PipelineHooks> {
        Arc::clone(&self.script.lock().hooks[generation])
    }

    fn latest(&self) -> Arc<dyn PipelineHooks> {
        let script = self.script.lock();
        Arc::clone(script.hooks.last().expect("pipeline never started"))
    }

    /// Fire compile-start on the latest pipeline.
    pub(crate) fn begin(&self) {
        self.latest().compile_started();
    }

    /// Fire a successful compile-done on the latest pipeline.
    pub(crate) fn finish(&self, fs: MemoryFs) {
        self.latest().compile_done(BuildOutput {
            fs,
            diagnostics: Diagnostics::new(),
        });
    }

    /// Fire a failing compile-done on the latest pipeline.
    pub(crate) fn fail(&self, message: &str) {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::in_file("./broken/index.js", message));
        self.latest().compile_done(BuildOutput {
            fs: MemoryFs::new(),
            diagnostics,
        });
    }

    /// Fire a full successful rebuild on an earlier pipeline generation.
    pub(crate) fn rebuild_generation(&self, generation: usize, fs: MemoryFs) {
        let hooks = self.hooks(generation);
        hooks.compile_started();
        hooks.compile_done(BuildOutput {
            fs,
            diagnostics: Diagnostics::new(),
        });
    }
}

struct ScriptedHandle {
    script: Arc<Mutex<Script>>,
}

impl PipelineHandle for ScriptedHandle {
    fn close(&mut self) {
        self.script.lock().closes += 1;
    }
}

impl BuildPipeline for ScriptedPipeline {
    fn start(
        &self,
        request: BuildRequest,
        hooks: Arc<dyn PipelineHooks>,
    ) -> Result<Box<dyn PipelineHandle>, BuildError> {
        let mut script = self.script.lock();
        let context = request.context.clone();
        script.requests.push(request);
        script.hooks.push(Arc::clone(&hooks));
        if std::mem::take(&mut script.fail_next) {
            return Err(BuildError::MissingContext(context));
        }
        let announce = script.announce;
        drop(script);

        if announce {
            hooks.compile_started();
        }
        Ok(Box::new(ScriptedHandle {
            script: Arc::clone(&self.script),
        }))
    }
}

/// Filesystem holding one artifact.
pub(crate) fn fs_with(path: &str, content: &str) -> MemoryFs {
    let mut fs = MemoryFs::new();
    fs.write(path, content).unwrap();
    fs
}
