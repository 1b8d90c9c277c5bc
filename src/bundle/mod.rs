//! Build Queue.
//!
//! Wraps a watch-mode build pipeline for a pattern entry set, records its
//! lifecycle as build events, and serves artifacts from an in-memory
//! filesystem.
//!
//! ```text
//! StyleguideChange ──► BuildQueue::start ──► BuildPipeline (watch thread)
//!                           │                      │ hooks
//!                           ▼                      ▼
//!                   CompilationContext ◄── Start / Error / Done
//!                           │
//!        await_ready ◄──────┴──────► broadcast::Receiver<BuildEvent> (hub)
//! ```

mod bundler;
mod debouncer;
mod entry;
mod event;
mod memfs;
mod minify;
mod pipeline;
mod queue;
mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use bundler::{Bundler, COMPONENTS_PATH};
pub use entry::{PatternEntry, bundle_name, entry_map};
pub use event::{BuildEvent, BuildEventKind, Diagnostic, Diagnostics};
pub use memfs::{FsError, MemoryFs};
pub use pipeline::{BuildError, BuildOutput, BuildPipeline, BuildRequest, PipelineHandle, PipelineHooks};
pub use queue::{BuildQueue, CompilationContext, ReadyError, ReadyTicket};
pub use watch::WatchPipeline;
