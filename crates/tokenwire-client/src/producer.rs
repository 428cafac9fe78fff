//! Per-filter producer loop.

use std::sync::Arc;

use futures_util::SinkExt;
use tokenwire_proto::encode_client;
use tokenwire_transport::{MessageSink, TransportError};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::capability::{InputFrame, Producer};
use crate::error::{ClientError, Result};
use crate::session::Shared;

/// Drive one filter's producer until the session stops or the connection
/// goes away.
///
/// Every iteration yields once, takes a credit, asks the producer for a
/// frame and sends it. A producer that has nothing this cycle gets its
/// credit handed straight back.
pub(crate) async fn run_producer(
    filter: String,
    mut producer: Box<dyn Producer>,
    shared: Arc<Shared>,
    sink: Arc<Mutex<MessageSink>>,
) -> Result<()> {
    debug!("producer started");

    while shared.should_run() {
        // Give the consumer a turn before competing for credit again.
        tokio::task::yield_now().await;

        shared.registry.acquire(&filter).await?;

        let Some(frame) = producer.produce().await else {
            shared.registry.release(&filter);
            trace!("nothing produced; credit returned");
            continue;
        };

        if !send(&filter, frame, &shared, &sink).await? {
            break;
        }
    }

    debug!("producer stopped");
    Ok(())
}

/// Stamp and transmit one frame. Returns `false` if the session halted
/// before the frame could go out.
async fn send(
    filter: &str,
    frame: InputFrame,
    shared: &Shared,
    sink: &Mutex<MessageSink>,
) -> Result<bool> {
    let mut sink = sink.lock().await;
    if shared.is_halted() {
        return Ok(false);
    }

    let seq = shared.sequence.peek();
    let message = frame.into_message(seq, filter);
    sink.send(encode_client(&message)).await.map_err(send_error)?;
    shared.sequence.advance();

    debug!(seq, credit = ?shared.registry.credit(filter), "frame sent");
    Ok(true)
}

fn send_error(err: TransportError) -> ClientError {
    if err.is_disconnect() {
        ClientError::ConnectionLost(err.to_string())
    } else {
        ClientError::Transport(err)
    }
}
