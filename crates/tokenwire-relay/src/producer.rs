//! A [`Producer`] fed from a relay byte stream.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokenwire_client::{InputFrame, Producer};
use tokenwire_proto::decode_client;
use tokio::io::AsyncRead;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};

use crate::codec::{RelayCodec, RelayConfig};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Where the relay reads from. Opened on first use, inside the runtime.
enum Source {
    Reader(BoxedReader),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Source {
    fn open(self) -> io::Result<BoxedReader> {
        match self {
            Source::Reader(reader) => Ok(reader),
            #[cfg(unix)]
            Source::Unix(stream) => {
                stream.set_nonblocking(true)?;
                Ok(Box::new(tokio::net::UnixStream::from_std(stream)?))
            }
        }
    }
}

/// The single-slot mailbox between the reader task and `produce`.
#[derive(Default)]
struct Latest {
    slot: Mutex<Option<InputFrame>>,
    available: Notify,
    closed: AtomicBool,
}

impl Latest {
    fn lock(&self) -> MutexGuard<'_, Option<InputFrame>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, frame: InputFrame) {
        if self.lock().replace(frame).is_some() {
            trace!("stale relay frame discarded");
        }
        self.available.notify_one();
    }

    fn take(&self) -> Option<InputFrame> {
        self.lock().take()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.available.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Producer that hands out the most recent frame received over a relay.
///
/// The background reader starts on the first `produce` call, so the
/// producer can be built before a runtime exists. Frames that arrive
/// faster than the session has credit for are overwritten; only the
/// newest one is ever sent.
///
/// Once the relay closes and the last frame has been taken, `produce`
/// never resolves again: the filter goes idle while the rest of the
/// session carries on.
pub struct RelayProducer {
    source: Option<Source>,
    config: RelayConfig,
    latest: Arc<Latest>,
    reader: Option<JoinHandle<()>>,
}

impl RelayProducer {
    /// A producer reading relay frames from `reader`.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_source(Source::Reader(Box::new(reader)))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source: Some(source),
            config: RelayConfig::default(),
            latest: Arc::new(Latest::default()),
            reader: None,
        }
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    fn start(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };

        let latest = Arc::clone(&self.latest);
        let codec = RelayCodec::new(&self.config);
        self.reader = Some(tokio::spawn(async move {
            match source.open() {
                Ok(reader) => read_frames(FramedRead::new(reader, codec), &latest).await,
                Err(err) => warn!(error = %err, "relay could not be opened"),
            }
            latest.close();
        }));
        debug!("relay reader started");
    }
}

async fn next_frame(latest: &Latest) -> Option<InputFrame> {
    loop {
        if let Some(frame) = latest.take() {
            return Some(frame);
        }
        if latest.is_closed() {
            debug!("relay closed; producer idle");
            return futures_util::future::pending().await;
        }
        latest.available.notified().await;
    }
}

async fn read_frames(mut frames: FramedRead<BoxedReader, RelayCodec>, latest: &Latest) {
    while let Some(next) = frames.next().await {
        let payload = match next {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "relay read failed");
                return;
            }
        };
        match decode_client(&payload) {
            Ok(message) => latest.put(InputFrame::from(message)),
            Err(err) => warn!(error = %err, "relay frame dropped"),
        }
    }
    debug!("relay reached end of stream");
}

impl Producer for RelayProducer {
    fn produce(&mut self) -> BoxFuture<'_, Option<InputFrame>> {
        self.start();
        let latest = Arc::clone(&self.latest);
        Box::pin(async move { next_frame(&latest).await })
    }
}

impl Drop for RelayProducer {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for RelayProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayProducer")
            .field("config", &self.config)
            .field("started", &self.source.is_none())
            .field("closed", &self.latest.is_closed())
            .finish()
    }
}

/// A connected relay over a Unix socket pair.
///
/// The sender writes with blocking I/O and can be moved to another thread
/// (or, through its file descriptor, another process). The producer side
/// is registered with the runtime on its first `produce`.
#[cfg(unix)]
pub fn channel(
    filter: impl Into<String>,
) -> io::Result<(
    crate::RelaySender<std::os::unix::net::UnixStream>,
    RelayProducer,
)> {
    let (write, read) = std::os::unix::net::UnixStream::pair()?;
    Ok((
        crate::RelaySender::new(filter, write),
        RelayProducer::with_source(Source::Unix(read)),
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::{Bytes, BytesMut};
    use tokenwire_proto::{encode_client, ClientMessage, PayloadKind};

    use super::*;
    use crate::codec::encode_frame;

    fn message(tag: u8) -> ClientMessage {
        ClientMessage {
            filter_name: "faces".to_string(),
            payload_kind: PayloadKind::Image.into(),
            payloads: vec![Bytes::from(vec![tag])],
            ..ClientMessage::default()
        }
    }

    fn wire(messages: &[ClientMessage]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            encode_frame(&encode_client(message), &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn only_latest_frame_is_produced() {
        let bytes = wire(&[message(1), message(2), message(3)]);
        let mut producer = RelayProducer::from_reader(Cursor::new(bytes));

        let frame = producer.produce().await.unwrap();
        assert_eq!(frame.payloads, vec![Bytes::from(vec![3])]);
        assert_eq!(frame.payload_kind, PayloadKind::Image);

        let next = tokio::time::timeout(Duration::from_millis(50), producer.produce()).await;
        assert!(next.is_err(), "closed relay should go idle");
    }

    #[tokio::test]
    async fn produce_waits_for_next_frame() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut producer = RelayProducer::from_reader(server);

        let pending = tokio::time::timeout(Duration::from_millis(50), producer.produce()).await;
        assert!(pending.is_err());

        tokio::io::AsyncWriteExt::write_all(&mut client, &wire(&[message(9)]))
            .await
            .unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), producer.produce())
            .await
            .expect("frame should arrive")
            .unwrap();
        assert_eq!(frame.payloads, vec![Bytes::from(vec![9])]);
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let mut buf = BytesMut::new();
        encode_frame(&[0xFF, 0xFF, 0xFF], &mut buf).unwrap();
        let mut bytes = buf.to_vec();
        bytes.extend(wire(&[message(4)]));

        let mut producer = RelayProducer::from_reader(Cursor::new(bytes));
        let frame = producer.produce().await.unwrap();
        assert_eq!(frame.payloads, vec![Bytes::from(vec![4])]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn channel_carries_frames_across_threads() {
        let (mut sender, mut producer) = channel("faces").unwrap();
        assert_eq!(sender.filter(), "faces");

        let writer = std::thread::spawn(move || sender.send(message(5)));
        writer.join().unwrap().unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), producer.produce())
            .await
            .expect("frame should arrive")
            .unwrap();
        assert_eq!(frame.payloads, vec![Bytes::from(vec![5])]);
    }
}
