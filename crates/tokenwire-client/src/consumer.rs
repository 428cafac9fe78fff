//! The single consumer loop.

use std::sync::Arc;

use futures_util::StreamExt;
use tokenwire_proto::{decode_server, server_message::Content, ResultMessage, ResultStatus};
use tokenwire_transport::{MessageStream, TransportError};
use tracing::{debug, error, warn};

use crate::capability::Consumer;
use crate::error::{ClientError, Result};
use crate::handshake;
use crate::session::Shared;

/// Receive and dispatch server messages until the session stops, the
/// connection closes, or the server breaks the protocol.
pub(crate) async fn run_consumer(
    mut consumer: Box<dyn Consumer>,
    mut stream: MessageStream,
    shared: Arc<Shared>,
) -> Result<()> {
    debug!("consumer started");

    while shared.should_run() {
        let bytes = match stream.next().await {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) if err.is_disconnect() => {
                return Err(ClientError::ConnectionLost(err.to_string()));
            }
            Some(Err(err @ TransportError::UnexpectedMessage(_))) => {
                return Err(ClientError::ProtocolViolation(err.to_string()));
            }
            Some(Err(err)) => return Err(ClientError::Transport(err)),
            None => {
                return Err(ClientError::ConnectionLost(
                    "server closed the connection".to_string(),
                ))
            }
        };

        let message = decode_server(&bytes)?;
        let return_credit = message.return_credit;

        if message.as_handshake().is_some() {
            handshake::apply(&shared.registry, &message)?;
            continue;
        }

        let Some(Content::Results(result)) = message.content else {
            return Err(ClientError::ProtocolViolation(
                "server message has no content".to_string(),
            ));
        };

        let filter = result.filter_name.clone();
        let outcome = dispatch(consumer.as_mut(), result).await;
        if return_credit {
            shared.registry.release(&filter);
        }
        outcome?;
    }

    debug!("consumer stopped");
    Ok(())
}

/// Hand a successful result to the consumer. Non-success results are
/// logged and dropped, except for a missing engine which ends the session.
async fn dispatch(consumer: &mut dyn Consumer, result: ResultMessage) -> Result<()> {
    let seq = result.sequence_number;
    match ResultStatus::try_from(result.status) {
        Ok(ResultStatus::Success) => {
            debug!(filter = %result.filter_name, seq, "result received");
            consumer.consume(result).await;
            Ok(())
        }
        Ok(ResultStatus::NoEngineForFilter) => {
            error!(filter = %result.filter_name, seq, "server has no engine for filter");
            Err(ClientError::NoEngineForFilter(result.filter_name))
        }
        status => {
            let status = match status {
                Ok(status) => status.name().to_string(),
                Err(_) => format!("UNKNOWN({})", result.status),
            };
            let err = ClientError::Application {
                filter: result.filter_name,
                status,
            };
            warn!(seq, error = %err, "result dropped");
            Ok(())
        }
    }
}
