//! One-shot mutation calls.
//!
//! Mutations are isolated request/response round-trips that never touch a
//! mirror directly: the visible effect arrives asynchronously through the
//! corresponding upsert push, so the UI stays eventually consistent with
//! the server instead of guessing optimistically.

use serde_json::Value;

use crate::conn::{ConnError, Connection};
use crate::core::{ActorId, IssueId, Priority, Status};

use super::wire::Request;

/// Send one typed request over the connection.
pub fn send_request(conn: &Connection, request: &Request) -> Result<Value, ConnError> {
    let params = request
        .params()
        .map_err(|e| ConnError::Protocol(e.to_string()))?;
    conn.send(request.op(), params)
}

pub fn update_status(conn: &Connection, id: IssueId, status: Status) -> Result<(), ConnError> {
    send_request(conn, &Request::UpdateStatus { id, status }).map(|_| ())
}

pub fn update_assignee(
    conn: &Connection,
    id: IssueId,
    assignee: Option<ActorId>,
) -> Result<(), ConnError> {
    send_request(conn, &Request::UpdateAssignee { id, assignee }).map(|_| ())
}

pub fn update_priority(conn: &Connection, id: IssueId, priority: Priority) -> Result<(), ConnError> {
    send_request(conn, &Request::UpdatePriority { id, priority }).map(|_| ())
}

pub fn update_title(conn: &Connection, id: IssueId, title: String) -> Result<(), ConnError> {
    send_request(conn, &Request::UpdateTitle { id, title }).map(|_| ())
}

pub fn add_label(conn: &Connection, id: IssueId, label: String) -> Result<(), ConnError> {
    send_request(conn, &Request::AddLabel { id, label }).map(|_| ())
}

pub fn remove_label(conn: &Connection, id: IssueId, label: String) -> Result<(), ConnError> {
    send_request(conn, &Request::RemoveLabel { id, label }).map(|_| ())
}
