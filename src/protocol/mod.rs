//! Framed wire protocol spoken with the core agent.
//!
//! Every message is a 4-byte big-endian frame length followed by a UTF-8
//! JSON object. Requests are tagged by a discriminator key
//! (`{"StartRequest": {…}}`); responses echo the discriminator and carry a
//! `result` field.

pub mod codec;
pub mod message;

pub use codec::{decode, decode_request, encode, MessageCodec};
pub use message::{format_timestamp, AgentResponse, ApiRequest};
