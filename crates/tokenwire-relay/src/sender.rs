use std::io::Write;

use tokenwire_proto::{encode_client, ClientMessage};
use tracing::trace;

use crate::codec::RelayConfig;
use crate::error::Result;
use crate::writer::RelayWriter;

/// Writing end of a relay for one filter.
///
/// Runs wherever frames are prepared (another thread or process) and pushes
/// them into the byte-stream channel a [`RelayProducer`](crate::RelayProducer)
/// reads from. `inner` must be a blocking stream; [`channel`](crate::channel)
/// hands out one.
pub struct RelaySender<W> {
    filter: String,
    writer: RelayWriter<W>,
}

impl<W: Write> RelaySender<W> {
    pub fn new(filter: impl Into<String>, inner: W) -> Self {
        Self::with_config(filter, inner, RelayConfig::default())
    }

    pub fn with_config(filter: impl Into<String>, inner: W, config: RelayConfig) -> Self {
        Self {
            filter: filter.into(),
            writer: RelayWriter::with_config(inner, config),
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Stamp this relay's filter name on `message` and write it.
    pub fn send(&mut self, mut message: ClientMessage) -> Result<()> {
        message.filter_name.clone_from(&self.filter);
        let payload = encode_client(&message);
        self.writer.send(&payload)?;
        trace!(filter = %self.filter, bytes = payload.len(), "relay frame written");
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::reader::RelayReader;

    #[test]
    fn send_overwrites_filter_name() {
        let mut sender = RelaySender::new("faces", Cursor::new(Vec::new()));
        sender
            .send(ClientMessage {
                filter_name: "something-else".to_string(),
                ..ClientMessage::default()
            })
            .unwrap();

        let wire = sender.into_inner().into_inner();
        let mut reader = RelayReader::new(Cursor::new(wire));
        assert_eq!(reader.read_message().unwrap().filter_name, "faces");
    }
}
