//! WebSocket wire protocol.
//!
//! Every frame is a JSON text message of the form
//! `{"type": "<name>", "payload": <value>}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tail_logs::{IndexCounts, JsonObject, SearchQuery};

use crate::error::StreamResult;

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Replace the client's entries and index counts.
    SetLogs(SetLogsPayload),
    /// Append entries to the client's view.
    AddLogs(Vec<Arc<JsonObject>>),
    /// Overwrite the listed counts, leaving others untouched.
    UpdateIndex(IndexCounts),
    /// Properties removed from the index.
    DropIndex(Vec<String>),
    /// Process status.
    SetStatus(StatusPayload),
}

impl ServerMessage {
    /// Serializes the message to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> StreamResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the wire name of this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SetLogs(_) => "set_logs",
            Self::AddLogs(_) => "add_logs",
            Self::UpdateIndex(_) => "update_index",
            Self::DropIndex(_) => "drop_index",
            Self::SetStatus(_) => "set_status",
        }
    }
}

/// Payload of [`ServerMessage::SetLogs`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLogsPayload {
    /// Entries, oldest first.
    pub logs: Vec<Arc<JsonObject>>,
    /// Index counts as seen by this client.
    pub index_counts: IndexCounts,
}

/// Payload of [`ServerMessage::SetStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Resident memory of the process in bytes.
    pub allocated_memory: u64,
    /// Number of entries in the store.
    pub logs_stored: usize,
}

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the client's query.
    SetSearch(SearchQuery),
}

impl ClientMessage {
    /// Parses a client text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or unknown message types.
    pub fn parse(text: &str) -> StreamResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use test_case::test_case;

    fn object(value: Value) -> Arc<JsonObject> {
        match value {
            Value::Object(map) => Arc::new(map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn set_logs_wire_format() {
        let mut counts = IndexCounts::new();
        counts.entry("level".to_string()).or_default().insert("INFO".to_string(), 2);

        let msg = ServerMessage::SetLogs(SetLogsPayload {
            logs: vec![object(json!({"level": "INFO"}))],
            index_counts: counts,
        });
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "set_logs",
                "payload": {
                    "logs": [{"level": "INFO"}],
                    "indexCounts": {"level": {"INFO": 2}}
                }
            })
        );
    }

    #[test]
    fn add_logs_payload_is_array() {
        let msg = ServerMessage::AddLogs(vec![object(json!({"a": 1})), object(json!({"b": 2}))]);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "add_logs");
        assert_eq!(value["payload"], json!([{"a": 1}, {"b": 2}]));
    }

    #[test]
    fn drop_index_and_status_wire_format() {
        let drop =
            serde_json::to_value(ServerMessage::DropIndex(vec!["requestId".into()])).unwrap();
        assert_eq!(drop, json!({"type": "drop_index", "payload": ["requestId"]}));

        let status = serde_json::to_value(ServerMessage::SetStatus(StatusPayload {
            allocated_memory: 1024,
            logs_stored: 3,
        }))
        .unwrap();
        assert_eq!(
            status,
            json!({"type": "set_status", "payload": {"allocatedMemory": 1024, "logsStored": 3}})
        );
    }

    #[test]
    fn kind_matches_wire_tag() {
        let messages = [
            ServerMessage::SetLogs(SetLogsPayload::default()),
            ServerMessage::AddLogs(Vec::new()),
            ServerMessage::UpdateIndex(IndexCounts::new()),
            ServerMessage::DropIndex(Vec::new()),
            ServerMessage::SetStatus(StatusPayload::default()),
        ];
        for msg in messages {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.kind());
        }
    }

    #[test]
    fn parse_set_search() {
        let msg = ClientMessage::parse(
            r#"{"type":"set_search","payload":{"filters":{"level":["ERROR"]},"searchTerm":"disk","regexp":false}}"#,
        )
        .unwrap();

        let ClientMessage::SetSearch(query) = msg;
        assert_eq!(query.filters["level"], vec!["ERROR"]);
        assert_eq!(query.search_term, "disk");
        assert!(!query.regexp);
    }

    #[test]
    fn parse_set_search_with_null_filters() {
        let msg =
            ClientMessage::parse(r#"{"type":"set_search","payload":{"filters":null}}"#).unwrap();
        let ClientMessage::SetSearch(query) = msg;
        assert!(query.is_empty());
    }

    #[test_case(r#"{"type":"subscribe","payload":{}}"#; "unknown type")]
    #[test_case("not json"; "not json")]
    #[test_case(r#"{"payload":{}}"#; "missing type")]
    #[test_case(r#"{"type":"set_search","payload":"disk"}"#; "payload not an object")]
    #[test_case(""; "empty frame")]
    fn parse_rejects_unknown_and_malformed(raw: &str) {
        assert!(ClientMessage::parse(raw).is_err());
    }
}
