use std::pin::Pin;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{Sink, Stream};

use crate::error::{Result, TransportError};

/// Outbound half: one binary protocol message per item.
pub type MessageSink = Pin<Box<dyn Sink<Bytes, Error = TransportError> + Send>>;

/// Inbound half. `None` means the peer closed the connection.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A connected, message-framed, bidirectional channel.
pub struct Connection {
    sink: MessageSink,
    stream: MessageStream,
}

impl Connection {
    /// Assemble a connection from its two halves.
    pub fn new(sink: MessageSink, stream: MessageStream) -> Self {
        Self { sink, stream }
    }

    /// Split into independently owned halves (one writer side, one reader side).
    pub fn into_split(self) -> (MessageSink, MessageStream) {
        (self.sink, self.stream)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Something that can open one connection to a server.
pub trait Connector: Send + Sync {
    /// Make one connection attempt. No retries.
    fn connect(&self) -> BoxFuture<'_, Result<Connection>>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}
