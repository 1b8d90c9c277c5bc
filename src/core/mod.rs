//! Core types - pure abstractions shared across the codebase.

mod state;
mod token;

pub use state::{is_shutdown, register_server, request_shutdown, setup_shutdown_handler};
pub use token::Token;
