//! Process-wide session snapshot shared with newly connecting previews.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, MessageType};
use crate::core::Token;

/// Current page and element selection.
///
/// The page snapshot is opaque to the engine; it is stored and replayed
/// exactly as the editor sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_page: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_element_id: Option<Value>,
}

/// Session State: replaced wholesale on styleguide switch, mutated field by
/// field on selection changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub id: Token,
    pub payload: SessionPayload,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Token::generate(),
            payload: SessionPayload::default(),
        }
    }

    /// Fresh id, empty payload.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// A `null` (or missing) page clears the selection.
    pub fn set_active_page(&mut self, page: Value) {
        self.payload.active_page = non_null(page);
    }

    pub fn set_active_element(&mut self, element_id: Value) {
        self.payload.active_element_id = non_null(element_id);
    }

    /// Full-state message: `{id, type: "state", payload: {activePage?, activeElementId?}}`.
    pub fn to_message(&self) -> Message {
        let payload = serde_json::to_value(&self.payload)
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Message::reply(&self.id, MessageType::State, payload)
    }
}

fn non_null(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_state_message() {
        let state = SessionState::new();
        let msg = state.to_message();
        assert_eq!(msg.kind, MessageType::State);
        assert_eq!(msg.id, state.id);
        assert_eq!(msg.payload, json!({}));
    }

    #[test]
    fn test_fields_mutate_independently() {
        let mut state = SessionState::new();
        state.set_active_element(json!("el-1"));
        state.set_active_page(json!({"id": "page-1"}));

        let msg = state.to_message();
        assert_eq!(msg.payload["activePage"], json!({"id": "page-1"}));
        assert_eq!(msg.payload["activeElementId"], json!("el-1"));
    }

    #[test]
    fn test_null_selection_clears_field() {
        let mut state = SessionState::new();
        state.set_active_page(json!({"id": "page-1"}));
        state.set_active_element(json!("el-1"));

        state.set_active_page(Value::Null);
        state.set_active_element(Value::Null);
        assert_eq!(state.payload, SessionPayload::default());
        assert_eq!(state.to_message().payload, json!({}));
    }

    #[test]
    fn test_reset_replaces_id_and_clears_payload() {
        let mut state = SessionState::new();
        state.set_active_page(json!({"id": "page-1"}));
        let before = state.id.clone();

        state.reset();
        assert_ne!(state.id, before);
        assert_eq!(state.payload, SessionPayload::default());
    }
}
