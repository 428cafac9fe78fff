//! Protobuf message schema for the tokenwire streaming protocol.
//!
//! One message per transport frame. The client sends [`ClientMessage`]s;
//! the server answers with [`ServerMessage`]s, each carrying either a
//! handshake or a result, plus a flag that hands one unit of credit back
//! to the filter the result belongs to.
//!
//! The message types are hand-written `prost` derives, so no `protoc`
//! step is needed at build time.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode_client, decode_server, encode_client, encode_server};
pub use error::{ProtoError, Result};
pub use message::{
    server_message, ClientMessage, HandshakeMessage, PayloadKind, PayloadResult, ResultMessage,
    ResultStatus, ServerMessage,
};

/// Re-exported so callers can build `extras` without a direct dependency.
pub use prost_types::Any;
