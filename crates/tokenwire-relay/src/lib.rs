//! Process-boundary relay for tokenwire frames.
//!
//! A byte-stream channel (pipe, socket pair) is not message-framed, so
//! every serialized [`ClientMessage`](tokenwire_proto::ClientMessage)
//! crossing it is prefixed with its length:
//!
//! ```text
//! ┌──────────────────┬───────────────────────────────┐
//! │ Length (4B BE)   │ Serialized ClientMessage       │
//! └──────────────────┴───────────────────────────────┘
//! ```
//!
//! The writing side uses [`RelaySender`]. The session side plugs a
//! [`RelayProducer`] in as an ordinary producer; it only ever hands out
//! the most recent frame and silently discards older ones.

pub mod codec;
pub mod error;
pub mod producer;
pub mod reader;
pub mod sender;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, RelayCodec, RelayConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{RelayError, Result};
#[cfg(unix)]
pub use producer::channel;
pub use producer::RelayProducer;
pub use reader::RelayReader;
pub use sender::RelaySender;
pub use writer::RelayWriter;
