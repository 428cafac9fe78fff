/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The bytes are not a valid protobuf encoding of the expected message.
    #[error("malformed message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A server message carried neither a handshake nor a result.
    #[error("server message has no content")]
    EmptyMessage,
}

pub type Result<T> = std::result::Result<T, ProtoError>;
