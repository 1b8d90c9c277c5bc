//! Sync Protocol
//!
//! JSON envelope exchanged over WebSocket between the editor, the engine and
//! preview surfaces.
//!
//! # Modules
//!
//! - `message` - envelope and message kinds
//! - `session` - Session State snapshot replayed to new previews
//! - `styleguide` - payload of `styleguide-change`

pub mod message;
pub mod session;
pub mod styleguide;

pub use message::{Message, MessageType};
pub use session::{SessionPayload, SessionState};
pub use styleguide::StyleguideChange;
