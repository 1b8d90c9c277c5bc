//! Actor System for Preview Synchronization
//!
//! Message-passing concurrency for serve mode:
//!
//! ```text
//! WS acceptor --> HubActor <-- BuildQueue events
//! (handshake)    (session)     (watch pipeline)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for the hub inbox
//! - `hub` - Session State machine, connections and delivery
//! - `coordinator` - Wires up and runs the hub

pub mod coordinator;
pub mod hub;
pub mod messages;

pub use coordinator::{Coordinator, EngineHandle};
