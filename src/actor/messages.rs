//! Actor Message Definitions
//!
//! ```text
//! WS acceptor --Attach--> HubActor <--Editor-- reader thread / engine handle
//!                             |
//!                             +--spawn_blocking(await_ready)--> BundleReady
//! ```

use std::fmt;

use super::hub::{Connection, Role};
use crate::bundle::ReadyError;
use crate::core::Token;
use crate::protocol::Message;

/// Messages to the Hub Actor
pub enum HubMsg {
    /// Inbound message from an editor connection or the in-process editor
    Editor(Message),
    /// Inbound message from a preview connection, relayed upstream
    Preview(Message),
    /// Handshaken connection ready to join the registry
    Attach {
        conn: Box<dyn Connection>,
        role: Role,
    },
    /// Script bundle export finished waiting for the build
    BundleReady {
        id: Token,
        scripts: Result<String, ReadyError>,
    },
    /// Close every connection and the pipeline, then stop
    Shutdown,
}

impl fmt::Debug for HubMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Editor(msg) => f.debug_tuple("Editor").field(&msg.kind).finish(),
            Self::Preview(msg) => f.debug_tuple("Preview").field(&msg.kind).finish(),
            Self::Attach { role, .. } => f.debug_struct("Attach").field("role", role).finish(),
            Self::BundleReady { id, scripts } => f
                .debug_struct("BundleReady")
                .field("id", id)
                .field("ok", &scripts.is_ok())
                .finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}
