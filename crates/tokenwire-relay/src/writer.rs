use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, RelayConfig};
use crate::error::{RelayError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete relay frames to any `Write` stream.
///
/// The stream must be in blocking mode. A `WouldBlock` from a non-blocking
/// stream is returned as [`RelayError::Io`] and the frame may be partially
/// written.
pub struct RelayWriter<T> {
    inner: T,
    buf: BytesMut,
    config: RelayConfig,
}

impl<T: Write> RelayWriter<T> {
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

    /// Write one length-prefixed payload and flush.
    ///
    /// Header and payload go out from one buffer, so a reader never sees
    /// a header without its payload following.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(RelayError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(RelayError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(RelayError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
