//! Credit-based, multi-filter streaming client.
//!
//! A tokenwire client streams frames to a server over one WebSocket. The
//! server decides the pace: each filter may only have as many frames in
//! flight as it has credit, and credit comes back one result at a time.
//!
//! # Crate Structure
//!
//! - [`proto`] — Protobuf message schema and codec helpers
//! - [`transport`] — `ws://host:port` connections and an in-memory transport
//! - [`client`] — Credit registry, producer/consumer loops, the session
//! - [`relay`] — Length-prefixed relay from another process (behind `relay` feature)

/// Re-export wire message types.
pub mod proto {
    pub use tokenwire_proto::*;
}

/// Re-export transport types.
pub mod transport {
    pub use tokenwire_transport::*;
}

/// Re-export the session core.
pub mod client {
    pub use tokenwire_client::*;
}

/// Re-export relay types (requires `relay` feature).
#[cfg(feature = "relay")]
pub mod relay {
    pub use tokenwire_relay::*;
}

pub use tokenwire_client::{
    ClientError, Consumer, InputFrame, Producer, Session, SessionConfig, SessionEnd, StopHandle,
};
pub use tokenwire_transport::{Endpoint, WebSocketConnector};
