//! Wire schemas for the UI session protocol.
//!
//! Provides:
//! - `Request` - all calls the client can issue
//! - frame types and the ndjson codec
//! - `PushEnvelope` - server-pushed mirror updates
//! - one-shot mutation helpers

pub mod envelope;
pub mod mutate;
pub mod wire;

pub use envelope::{EnvelopeError, EnvelopeKind, PushEnvelope};
pub use mutate::send_request;
pub use wire::{
    ErrorPayload, EventFrame, ReplyFrame, Request, ServerFrame, WireError, decode_server_frame,
    encode_request,
};
