use super::connection::{Client, ReadyState, Role};
use super::Hub;
use crate::debug;
use crate::protocol::Message;

impl Hub {
    /// Send a message to every open preview client.
    ///
    /// Connecting and closing clients are skipped, not queued. A client that
    /// fails a send is dropped from the registry.
    pub(super) fn broadcast(&self, msg: &Message) {
        let sent = self.deliver(Role::Preview, msg);
        debug!("hub"; "{} to {} previews", msg.kind, sent);
    }

    /// Send a message to every open editor connection.
    pub(super) fn send_to_editors(&self, msg: &Message) {
        let sent = self.deliver(Role::Editor, msg);
        if sent == 0 {
            debug!("hub"; "no editor connected for {}", msg.kind);
        }
    }

    fn deliver(&self, role: Role, msg: &Message) -> usize {
        let text = msg.to_json();
        let mut clients = self.clients.lock();
        let mut sent = 0;

        clients.retain_mut(|client| {
            if client.role != role {
                return true;
            }
            match client.conn.ready_state() {
                ReadyState::Open => {}
                ReadyState::Connecting | ReadyState::Closing => return true,
                ReadyState::Closed => return false,
            }
            match self.send_one(client, &text) {
                Ok(()) => {
                    sent += 1;
                    true
                }
                Err(e) => {
                    debug!("hub"; "client {} disconnected: {}", client.id, e);
                    false
                }
            }
        });
        sent
    }

    /// A preview that opened after attaching gets its snapshot before the
    /// first incremental message.
    fn send_one(&self, client: &mut Client, text: &str) -> Result<(), super::TransportError> {
        client.greet(&self.state)?;
        client.conn.send(text)
    }
}
