//! Build pipeline seam.
//!
//! A [`BuildPipeline`] turns an entry set into a stream of rebuilds. It
//! reports each rebuild through [`PipelineHooks`] and is stopped through the
//! [`PipelineHandle`] it returns. The queue never knows whether a pipeline
//! watches files, runs once, or is scripted by a test.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::entry::PatternEntry;
use super::event::Diagnostics;
use super::memfs::MemoryFs;

/// What to build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Styleguide root; every entry request is relative to it
    pub context: PathBuf,
    pub entries: Vec<PatternEntry>,
}

/// Result of one rebuild.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Artifacts of this rebuild. Discarded when `diagnostics` has errors.
    pub fs: MemoryFs,
    pub diagnostics: Diagnostics,
}

/// Pipeline start failures.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build context not found: {}", .0.display())]
    MissingContext(PathBuf),

    #[error("cannot watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to spawn build thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Rebuild lifecycle callbacks. Called from the pipeline's own thread.
pub trait PipelineHooks: Send + Sync {
    fn compile_started(&self);
    fn compile_done(&self, output: BuildOutput);
}

/// A running pipeline.
pub trait PipelineHandle: Send {
    /// Stop rebuilding. Hooks may still fire for a rebuild already in
    /// progress; the queue ignores them.
    fn close(&mut self) {}
}

pub trait BuildPipeline: Send + Sync {
    fn start(
        &self,
        request: BuildRequest,
        hooks: Arc<dyn PipelineHooks>,
    ) -> Result<Box<dyn PipelineHandle>, BuildError>;
}
