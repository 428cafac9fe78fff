use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tokenwire_proto::{decode_client, ClientMessage};

use crate::codec::{decode_frame, RelayConfig};
use crate::error::{RelayError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete relay frames from any `Read` stream (blocking).
///
/// Handles partial reads internally. The async side of a relay uses
/// [`RelayCodec`](crate::RelayCodec) instead.
pub struct RelayReader<T> {
    inner: T,
    buf: BytesMut,
    config: RelayConfig,
}

impl<T: Read> RelayReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, RelayConfig::default())
    }

    pub fn with_config(inner: T, config: RelayConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete payload.
    ///
    /// Returns `Err(RelayError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(payload);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RelayError::Io(err)),
            };

            if read == 0 {
                return Err(RelayError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next message.
    pub fn read_message(&mut self) -> Result<ClientMessage> {
        let payload = self.read_frame()?;
        Ok(decode_client(&payload)?)
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
