use tokenwire_proto::ProtoError;
use tokenwire_transport::TransportError;

/// Errors that can end (or, for `Application`, merely annotate) a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The single connection attempt failed. No loop was started.
    #[error("connection refused: {0}")]
    ConnectionRefused(#[source] TransportError),

    /// The connection went away mid-session.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server sent something the protocol does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server cannot serve this filter; its credit will never come back.
    #[error("server has no engine for filter '{0}'")]
    NoEngineForFilter(String),

    /// Credit was requested for a filter the handshake did not declare.
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    /// A non-success result. Logged and dropped; the session continues.
    #[error("filter '{filter}' returned {status}")]
    Application { filter: String, status: String },

    /// Transport failure that is not a plain disconnect.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// `launch` was called on a session that already ran.
    #[error("session already launched")]
    AlreadyLaunched,

    /// A session task panicked or was cancelled unexpectedly.
    #[error("session task failed: {0}")]
    Task(String),
}

impl From<ProtoError> for ClientError {
    fn from(err: ProtoError) -> Self {
        ClientError::ProtocolViolation(err.to_string())
    }
}

impl ClientError {
    /// True for the errors that must terminate the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ClientError::Application { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
