use std::time::Duration;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::connection::{Connection, Connector};
use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Default bound on the TCP + WebSocket upgrade handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to a `ws://host:port` endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
}

impl WebSocketConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Override the connect timeout. `None` waits for the OS to give up.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn open(&self) -> Result<Connection> {
        let url = self.endpoint.url();
        let attempt = tokio_tungstenite::connect_async(url.as_str());

        let outcome = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| TransportError::ConnectTimeout(limit))?,
            None => attempt.await,
        };
        let (ws, response) = outcome.map_err(TransportError::from)?;
        info!(endpoint = %self.endpoint, status = %response.status(), "websocket connected");

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(TransportError::from)
            .with(|payload: Bytes| future::ready(Ok::<_, TransportError>(Message::binary(payload))));
        let stream = stream.filter_map(|item| future::ready(inbound(item)));

        Ok(Connection::new(Box::pin(sink), Box::pin(stream)))
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Connection>> {
        Box::pin(async move {
            self.open().await.map_err(|source| TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                source: Box::new(source),
            })
        })
    }

    fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

/// Map one WebSocket frame to a protocol message, skipping control frames.
fn inbound(
    item: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Bytes>> {
    match item {
        Ok(Message::Binary(data)) => Some(Ok(Bytes::from(data))),
        Ok(Message::Text(_)) => Some(Err(TransportError::UnexpectedMessage("text"))),
        Ok(Message::Close(frame)) => {
            debug!(?frame, "server sent close frame");
            None
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(err) => Some(Err(err.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_frames_pass_through() {
        let item = inbound(Ok(Message::binary(Bytes::from_static(b"abc"))));
        assert_eq!(item.unwrap().unwrap().as_ref(), b"abc");
    }

    #[test]
    fn control_frames_are_skipped() {
        assert!(inbound(Ok(Message::Ping(Bytes::new().into()))).is_none());
        assert!(inbound(Ok(Message::Close(None))).is_none());
    }

    #[test]
    fn text_frames_are_rejected() {
        let item = inbound(Ok(Message::text(String::from("hello"))));
        assert!(matches!(
            item,
            Some(Err(TransportError::UnexpectedMessage("text")))
        ));
    }

    #[tokio::test]
    async fn refused_connection_reports_endpoint() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = WebSocketConnector::new(Endpoint::new("127.0.0.1", port))
            .with_connect_timeout(Some(Duration::from_secs(2)));
        let err = connector.connect().await.unwrap_err();

        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }
}
