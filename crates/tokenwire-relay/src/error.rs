use tokenwire_proto::ProtoError;

/// Errors that can occur on either side of a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("relay closed (incomplete frame)")]
    ConnectionClosed,

    /// A complete frame did not hold a valid message.
    #[error("relay frame decode failed: {0}")]
    Decode(#[from] ProtoError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
