//! In-process connections.
//!
//! [`pair`] returns the client side as an ordinary [`Connection`] and the
//! server side as a [`MemoryServer`] handle that a test drives by hand.
//! Dropping or [`MemoryServer::close`]-ing the server ends the client's
//! inbound stream, exactly like a remote hangup.

use std::sync::Mutex;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::connection::{Connection, Connector};
use crate::error::{Result, TransportError};

/// Create a connected client/server pair.
pub fn pair() -> (Connection, MemoryServer) {
    let (to_server, from_client) = mpsc::unbounded_channel::<Bytes>();
    let (to_client, from_server) = mpsc::unbounded_channel::<Bytes>();

    let sink = futures_util::sink::unfold(to_server, |tx, message: Bytes| async move {
        tx.send(message).map_err(|_| TransportError::Closed)?;
        Ok::<_, TransportError>(tx)
    });
    let stream = futures_util::stream::unfold(from_server, |mut rx| async move {
        rx.recv().await.map(|message| (Ok(message), rx))
    });

    let connection = Connection::new(Box::pin(sink), Box::pin(stream));
    let server = MemoryServer {
        to_client: Some(to_client),
        from_client,
    };
    (connection, server)
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryServer {
    to_client: Option<mpsc::UnboundedSender<Bytes>>,
    from_client: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryServer {
    /// Deliver one message to the client.
    pub fn send(&self, message: impl Into<Bytes>) -> Result<()> {
        let tx = self.to_client.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message.into()).map_err(|_| TransportError::Closed)
    }

    /// Wait for the next client message. `None` once the client hung up.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.from_client.recv().await
    }

    /// Next client message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.from_client.try_recv().ok()
    }

    /// Hang up: the client's inbound stream ends.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

/// Hands out one pre-built connection, or refuses.
pub struct MemoryConnector {
    connection: Mutex<Option<Connection>>,
}

impl MemoryConnector {
    /// A connector whose first `connect` yields `connection`.
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
        }
    }

    /// A connector that always fails like a refused TCP connect.
    pub fn refused() -> Self {
        Self {
            connection: Mutex::new(None),
        }
    }
}

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Connection>> {
        let taken = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        Box::pin(async move {
            taken.ok_or_else(|| TransportError::Connect {
                endpoint: "memory".to_string(),
                source: Box::new(TransportError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                ))),
            })
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
