//! Session wire protocol: newline-delimited JSON frames.
//!
//! Client request: `{"seq": 7, "op": "subscribe", "params": {...}}\n`
//! Server reply:   `{"seq": 7, "ok": {...}}\n` or `{"seq": 7, "err": {...}}\n`
//! Server push:    `{"event": "push", "data": {...}}\n`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{ActorId, IssueId, Priority, QuerySpec, Status, SubKey};

// =============================================================================
// Request - All calls the client can issue
// =============================================================================

/// One request/response call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Session handshake.
    Hello { client: String, version: String },

    /// Open a live query for `key`.
    Subscribe { key: SubKey, spec: QuerySpec },

    /// Close the live query for `key`.
    Release { key: SubKey },

    /// Health check.
    Ping,

    // === One-shot mutations ===
    UpdateStatus {
        id: IssueId,
        status: Status,
    },

    UpdateAssignee {
        id: IssueId,
        #[serde(default)]
        assignee: Option<ActorId>,
    },

    UpdatePriority {
        id: IssueId,
        priority: Priority,
    },

    UpdateTitle {
        id: IssueId,
        title: String,
    },

    AddLabel {
        id: IssueId,
        label: String,
    },

    RemoveLabel {
        id: IssueId,
        label: String,
    },
}

impl Request {
    /// Wire name of this call.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "hello",
            Request::Subscribe { .. } => "subscribe",
            Request::Release { .. } => "release",
            Request::Ping => "ping",
            Request::UpdateStatus { .. } => "update_status",
            Request::UpdateAssignee { .. } => "update_assignee",
            Request::UpdatePriority { .. } => "update_priority",
            Request::UpdateTitle { .. } => "update_title",
            Request::AddLabel { .. } => "add_label",
            Request::RemoveLabel { .. } => "remove_label",
        }
    }

    /// Payload without the `op` discriminant, for `Connection::send`.
    pub fn params(&self) -> Result<Value, WireError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("op");
        }
        Ok(value)
    }
}

// =============================================================================
// Inbound frames
// =============================================================================

/// Any line the server may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Reply(ReplyFrame),
    Event(EventFrame),
}

/// Correlated response to a request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyFrame {
    pub seq: u64,
    #[serde(default)]
    pub ok: Option<Value>,
    #[serde(default)]
    pub err: Option<ErrorPayload>,
}

/// Uncorrelated server push (envelopes, workspace notices).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

// =============================================================================
// Codec
// =============================================================================

/// Wire-level errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WireError {
    #[error("frame encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a request line (no trailing newline; the transport owns framing).
pub fn encode_request(seq: u64, op: &str, params: &Value) -> Result<String, WireError> {
    #[derive(Serialize)]
    struct Outbound<'a> {
        seq: u64,
        op: &'a str,
        params: &'a Value,
    }
    Ok(serde_json::to_string(&Outbound { seq, op, params })?)
}

/// Decode one inbound line.
pub fn decode_server_frame(line: &str) -> Result<ServerFrame, WireError> {
    Ok(serde_json::from_str(line)?)
}
