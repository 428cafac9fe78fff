use bytes::Bytes;

/// Kind of payload carried by a frame or a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PayloadKind {
    Image = 0,
    Video = 1,
    Audio = 2,
    Accelerometer = 3,
    Gyroscope = 4,
    Other = 5,
}

impl PayloadKind {
    /// Stable lowercase name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            PayloadKind::Image => "image",
            PayloadKind::Video => "video",
            PayloadKind::Audio => "audio",
            PayloadKind::Accelerometer => "accelerometer",
            PayloadKind::Gyroscope => "gyroscope",
            PayloadKind::Other => "other",
        }
    }
}

/// Outcome the server reports for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ResultStatus {
    Success = 0,
    UnspecifiedError = 1,
    WrongInputFormat = 2,
    EngineError = 3,
    /// No engine on the server consumes this filter. Fatal for the session.
    NoEngineForFilter = 4,
    ServerDroppedFrame = 5,
}

impl ResultStatus {
    pub fn name(self) -> &'static str {
        match self {
            ResultStatus::Success => "SUCCESS",
            ResultStatus::UnspecifiedError => "UNSPECIFIED_ERROR",
            ResultStatus::WrongInputFormat => "WRONG_INPUT_FORMAT",
            ResultStatus::EngineError => "ENGINE_ERROR",
            ResultStatus::NoEngineForFilter => "NO_ENGINE_FOR_FILTER",
            ResultStatus::ServerDroppedFrame => "SERVER_DROPPED_FRAME",
        }
    }
}

/// One unit of work submitted by the client.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientMessage {
    /// Global, gap-free send order. Filled in by the session, never by producers.
    #[prost(uint64, tag = "1")]
    pub sequence_number: u64,
    #[prost(string, tag = "2")]
    pub filter_name: String,
    #[prost(enumeration = "PayloadKind", tag = "3")]
    pub payload_kind: i32,
    #[prost(bytes = "bytes", repeated, tag = "4")]
    pub payloads: Vec<Bytes>,
    /// Application-defined typed blob.
    #[prost(message, optional, tag = "5")]
    pub extras: Option<prost_types::Any>,
}

/// Server message: exactly one of handshake or result, plus a credit flag.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerMessage {
    #[prost(oneof = "server_message::Content", tags = "1, 2")]
    pub content: Option<server_message::Content>,
    /// Hands one credit back to the result's filter.
    #[prost(bool, tag = "3")]
    pub return_credit: bool,
}

pub mod server_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Content {
        #[prost(message, tag = "1")]
        Handshake(super::HandshakeMessage),
        #[prost(message, tag = "2")]
        Results(super::ResultMessage),
    }
}

/// Declares the filters the server consumes and the credit each one starts with.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HandshakeMessage {
    #[prost(string, repeated, tag = "1")]
    pub filters: Vec<String>,
    #[prost(uint32, tag = "2")]
    pub credit_per_filter: u32,
}

/// Server's answer for one frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResultMessage {
    #[prost(string, tag = "1")]
    pub filter_name: String,
    #[prost(enumeration = "ResultStatus", tag = "2")]
    pub status: i32,
    #[prost(message, repeated, tag = "3")]
    pub results: Vec<PayloadResult>,
    /// Sequence number of the frame this result answers.
    #[prost(uint64, tag = "4")]
    pub sequence_number: u64,
    #[prost(message, optional, tag = "5")]
    pub extras: Option<prost_types::Any>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PayloadResult {
    #[prost(enumeration = "PayloadKind", tag = "1")]
    pub payload_kind: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: Bytes,
}

impl ServerMessage {
    /// Build a handshake message. Handshakes never return credit.
    pub fn handshake<I, S>(filters: I, credit_per_filter: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            content: Some(server_message::Content::Handshake(HandshakeMessage {
                filters: filters.into_iter().map(Into::into).collect(),
                credit_per_filter,
            })),
            return_credit: false,
        }
    }

    /// Build a result message.
    pub fn result(result: ResultMessage, return_credit: bool) -> Self {
        Self {
            content: Some(server_message::Content::Results(result)),
            return_credit,
        }
    }

    pub fn as_handshake(&self) -> Option<&HandshakeMessage> {
        match &self.content {
            Some(server_message::Content::Handshake(handshake)) => Some(handshake),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&ResultMessage> {
        match &self.content {
            Some(server_message::Content::Results(result)) => Some(result),
            _ => None,
        }
    }
}

impl ResultMessage {
    /// Result with no payloads.
    pub fn new(filter_name: impl Into<String>, status: ResultStatus, sequence_number: u64) -> Self {
        Self {
            filter_name: filter_name.into(),
            status: status.into(),
            results: Vec::new(),
            sequence_number,
            extras: None,
        }
    }
}

impl PayloadResult {
    pub fn new(kind: PayloadKind, payload: impl Into<Bytes>) -> Self {
        Self {
            payload_kind: kind.into(),
            payload: payload.into(),
        }
    }
}
