//! Reload Module
//!
//! WebSocket endpoint shared by preview surfaces and the editor.
//!
//! # Modules
//!
//! - `server` - acceptor thread with port retry and role-aware handshake

pub mod server;
