//! Persistent, message-oriented connections.
//!
//! The client core never sees sockets. It sees a [`Connection`]: a sink of
//! binary messages and a stream of binary messages, one protocol message per
//! transport frame. A [`Connector`] produces one connection per call; the
//! session calls it exactly once per launch.
//!
//! - [`WebSocketConnector`] — `ws://host:port` over `tokio-tungstenite`
//! - [`memory`] — in-process connections for tests and embedding

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod memory;
pub mod websocket;

pub use connection::{Connection, Connector, MessageSink, MessageStream};
pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use websocket::WebSocketConnector;

/// Re-exported so callers can match on WebSocket errors.
pub use tokio_tungstenite::tungstenite;
