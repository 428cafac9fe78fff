use std::fmt;
use std::io;

use tokenwire_client::ClientError;
use tokenwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = transport_code(&err);
    CliError::new(code, format!("{context}: {err}"))
}

fn transport_code(err: &TransportError) -> i32 {
    use tokenwire_transport::tungstenite::Error as WsError;

    match err {
        TransportError::InvalidEndpoint { .. } => USAGE,
        TransportError::Connect { source, .. } => transport_code(source),
        TransportError::ConnectTimeout(_) => TIMEOUT,
        TransportError::Closed => FAILURE,
        TransportError::Io(io) | TransportError::WebSocket(WsError::Io(io)) => io_code(io.kind()),
        _ => TRANSPORT_ERROR,
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::ConnectionRefused(err) | ClientError::Transport(err) => {
            transport_error(context, err)
        }
        ClientError::ProtocolViolation(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::UnknownFilter(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::ConnectionLost(_)
        | ClientError::NoEngineForFilter(_)
        | ClientError::Application { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        ClientError::AlreadyLaunched | ClientError::Task(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connect_is_failure() {
        let err = ClientError::ConnectionRefused(TransportError::Connect {
            endpoint: "ws://localhost:1".to_string(),
            source: Box::new(TransportError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
        });
        let cli = client_error("connect failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn connect_timeout_maps_to_timeout() {
        let err = TransportError::Connect {
            endpoint: "ws://localhost:1".to_string(),
            source: Box::new(TransportError::ConnectTimeout(std::time::Duration::from_secs(1))),
        };
        assert_eq!(transport_error("connect failed", err).code, TIMEOUT);
    }

    #[test]
    fn invalid_endpoint_is_usage() {
        let err = TransportError::InvalidEndpoint {
            endpoint: "http://x".to_string(),
            reason: "scheme".to_string(),
        };
        assert_eq!(transport_error("bad url", err).code, USAGE);
    }

    #[test]
    fn protocol_violation_is_data_invalid() {
        let err = ClientError::ProtocolViolation("garbage".to_string());
        assert_eq!(client_error("session failed", err).code, DATA_INVALID);
    }

    #[test]
    fn unknown_filter_is_usage() {
        let err = ClientError::UnknownFilter("nope".to_string());
        assert_eq!(client_error("session failed", err).code, USAGE);
    }
}
