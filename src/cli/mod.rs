//! Command-line interface module.

mod args;
pub mod render;
pub mod serve;

pub use args::{Cli, Commands, RenderArgs, RenderMode};
