//! The two seams between the session and the application.
//!
//! Anything that produces frames implements [`Producer`]; whatever handles
//! successful results implements [`Consumer`]. Plain closures work for
//! both. Cross-cutting behavior (codecs, timing, relays) wraps these traits
//! rather than extending the session.

use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use tokenwire_proto::{Any, ClientMessage, PayloadKind, ResultMessage};

/// A frame as a producer builds it: no sequence number, no filter name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputFrame {
    pub payload_kind: PayloadKind,
    pub payloads: Vec<Bytes>,
    pub extras: Option<Any>,
}

impl InputFrame {
    /// A frame with a single payload.
    pub fn new(payload_kind: PayloadKind, payload: impl Into<Bytes>) -> Self {
        Self {
            payload_kind,
            payloads: vec![payload.into()],
            extras: None,
        }
    }

    /// Append another payload.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payloads.push(payload.into());
        self
    }

    /// Attach an application-defined typed blob.
    pub fn with_extras(mut self, extras: Any) -> Self {
        self.extras = Some(extras);
        self
    }

    /// Stamp sequence number and filter name onto the frame.
    pub fn into_message(self, sequence_number: u64, filter_name: &str) -> ClientMessage {
        ClientMessage {
            sequence_number,
            filter_name: filter_name.to_string(),
            payload_kind: self.payload_kind.into(),
            payloads: self.payloads,
            extras: self.extras,
        }
    }
}

impl From<ClientMessage> for InputFrame {
    fn from(message: ClientMessage) -> Self {
        Self {
            payload_kind: message.payload_kind(),
            payloads: message.payloads,
            extras: message.extras,
        }
    }
}

/// Source of frames for one filter.
///
/// Called only after the session took a credit for the filter. Returning
/// `None` hands that credit straight back.
pub trait Producer: Send {
    fn produce(&mut self) -> BoxFuture<'_, Option<InputFrame>>;
}

impl<F> Producer for F
where
    F: FnMut() -> Option<InputFrame> + Send,
{
    fn produce(&mut self) -> BoxFuture<'_, Option<InputFrame>> {
        Box::pin(future::ready(self()))
    }
}

/// Sink for successful results, across all filters.
pub trait Consumer: Send {
    fn consume(&mut self, result: ResultMessage) -> BoxFuture<'_, ()>;
}

impl<F> Consumer for F
where
    F: FnMut(ResultMessage) + Send,
{
    fn consume(&mut self, result: ResultMessage) -> BoxFuture<'_, ()> {
        self(result);
        Box::pin(future::ready(()))
    }
}
