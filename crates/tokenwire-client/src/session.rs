//! Session controller: one connection, one consumer, one producer per filter.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokenwire_transport::Connector;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::capability::{Consumer, Producer};
use crate::consumer::run_consumer;
use crate::error::{ClientError, Result};
use crate::producer::run_producer;
use crate::registry::TokenRegistry;

/// Cooperative stop flag shared between a session and its callers.
///
/// Loops check it only between iterations, so one in-flight operation per
/// loop may still complete after [`StopHandle::stop`].
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The session-wide sequence counter.
///
/// Holds the number the next transmitted frame will carry. It only moves
/// after a successful send, so sent numbers are gap-free.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    /// Sequence number of the next frame to be sent.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// How a [`Session::launch`] ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The single connection attempt failed; no loop ran. The session can
    /// be launched again.
    NotConnected(ClientError),
    /// A loop observed [`Session::stop`] and returned cleanly.
    Stopped,
    /// The connection went away mid-session.
    Disconnected,
    /// A fatal error ended the session.
    Failed(ClientError),
}

/// Construction-time settings for a [`Session`].
#[derive(Clone)]
pub struct SessionConfig {
    /// Opens the session's single connection.
    pub connector: Arc<dyn Connector>,
    /// Log context. Every loop runs inside a child of this span.
    pub span: Span,
    pub stop: StopHandle,
}

impl SessionConfig {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_shared(Arc::new(connector))
    }

    pub fn from_shared(connector: Arc<dyn Connector>) -> Self {
        let span = info_span!("session", server = %connector.describe());
        Self {
            connector,
            span,
            stop: StopHandle::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("connector", &self.connector.describe())
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

/// State every loop of a running session shares.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) registry: TokenRegistry,
    pub(crate) sequence: SequenceCounter,
    stop: StopHandle,
    /// Set as soon as any loop finishes. No frame leaves after this.
    halted: AtomicBool,
}

impl Shared {
    fn new(stop: StopHandle) -> Self {
        Self {
            registry: TokenRegistry::new(),
            sequence: SequenceCounter::default(),
            stop,
            halted: AtomicBool::new(false),
        }
    }

    pub(crate) fn should_run(&self) -> bool {
        self.stop.is_running() && !self.is_halted()
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Returns whether the session was already halted.
    fn halt(&self) -> bool {
        self.halted.swap(true, Ordering::SeqCst)
    }
}

/// A credit-based streaming session.
///
/// ```no_run
/// # async fn demo() {
/// use bytes::Bytes;
/// use tokenwire_client::{InputFrame, Session, SessionConfig, SessionEnd};
/// use tokenwire_proto::{PayloadKind, ResultMessage};
/// use tokenwire_transport::{Endpoint, WebSocketConnector};
///
/// let endpoint = Endpoint::new("localhost", 9099);
/// let config = SessionConfig::new(WebSocketConnector::new(endpoint));
/// let mut session = Session::new(config, |result: ResultMessage| {
///     println!("{} -> {} payloads", result.filter_name, result.results.len());
/// });
/// session.add_producer("faces", || {
///     Some(InputFrame::new(PayloadKind::Image, Bytes::from_static(b"...")))
/// });
///
/// match session.launch().await {
///     SessionEnd::NotConnected(err) => eprintln!("retry later: {err}"),
///     end => println!("session over: {end:?}"),
/// }
/// # }
/// ```
pub struct Session {
    config: SessionConfig,
    consumer: Option<Box<dyn Consumer>>,
    producers: Vec<(String, Box<dyn Producer>)>,
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(config: SessionConfig, consumer: impl Consumer + 'static) -> Self {
        let shared = Arc::new(Shared::new(config.stop.clone()));
        Self {
            config,
            consumer: Some(Box::new(consumer)),
            producers: Vec::new(),
            shared,
        }
    }

    /// Register the producer for `filter`. One producer per filter.
    pub fn add_producer(
        &mut self,
        filter: impl Into<String>,
        producer: impl Producer + 'static,
    ) -> &mut Self {
        self.producers.push((filter.into(), Box::new(producer)));
        self
    }

    pub fn with_producer(
        mut self,
        filter: impl Into<String>,
        producer: impl Producer + 'static,
    ) -> Self {
        self.add_producer(filter, producer);
        self
    }

    /// Ask every loop to finish at its next iteration boundary.
    pub fn stop(&self) {
        self.shared.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.shared.stop.clone()
    }

    /// Number the next transmitted frame will carry.
    pub fn sequence_number(&self) -> u64 {
        self.shared.sequence.peek()
    }

    pub fn sequence_counter(&self) -> SequenceCounter {
        self.shared.sequence.clone()
    }

    /// Filters declared by the most recent handshake.
    pub fn filters(&self) -> Vec<String> {
        self.shared.registry.filters()
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.shared.registry
    }

    /// Connect once and run every loop until the first one finishes.
    ///
    /// A failed connection attempt returns [`SessionEnd::NotConnected`]
    /// without starting anything, and the session may be launched again.
    /// Otherwise the first loop to finish decides the outcome and the
    /// remaining loops are cancelled before this returns.
    pub async fn launch(&mut self) -> SessionEnd {
        let span = self.config.span.clone();
        self.run().instrument(span).await
    }

    async fn run(&mut self) -> SessionEnd {
        if self.consumer.is_none() {
            return SessionEnd::Failed(ClientError::AlreadyLaunched);
        }

        info!("connecting");
        let connection = match self.config.connector.connect().await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(error = %err, "connection failed");
                return SessionEnd::NotConnected(ClientError::ConnectionRefused(err));
            }
        };
        info!(producers = self.producers.len(), "connected");

        let Some(consumer) = self.consumer.take() else {
            return SessionEnd::Failed(ClientError::AlreadyLaunched);
        };
        let producers = std::mem::take(&mut self.producers);
        let (sink, stream) = connection.into_split();
        let sink = Arc::new(Mutex::new(sink));

        let mut tasks = JoinSet::new();
        tasks.spawn(halting(
            Arc::clone(&self.shared),
            run_consumer(consumer, stream, Arc::clone(&self.shared)),
        )
        .instrument(info_span!("consumer")));

        for (filter, producer) in producers {
            let span = info_span!("producer", filter = %filter);
            tasks.spawn(halting(
                Arc::clone(&self.shared),
                run_producer(filter, producer, Arc::clone(&self.shared), Arc::clone(&sink)),
            )
            .instrument(span));
        }

        let end = loop {
            match tasks.join_next().await {
                // Finished after another loop already decided the outcome.
                Some(Ok(None)) => continue,
                Some(Ok(Some(Ok(())))) | None => break SessionEnd::Stopped,
                Some(Ok(Some(Err(ClientError::ConnectionLost(reason))))) => {
                    info!(%reason, "connection lost");
                    break SessionEnd::Disconnected;
                }
                Some(Ok(Some(Err(err)))) => {
                    error!(error = %err, "session failed");
                    break SessionEnd::Failed(err);
                }
                Some(Err(err)) => {
                    error!(error = %err, "session task failed");
                    break SessionEnd::Failed(ClientError::Task(err.to_string()));
                }
            }
        };

        self.shared.halt();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        info!(next_seq = self.shared.sequence.peek(), "session ended");
        end
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field(
                "producers",
                &self.producers.iter().map(|(filter, _)| filter).collect::<Vec<_>>(),
            )
            .field("launched", &self.consumer.is_none())
            .field("shared", &self.shared)
            .finish()
    }
}

/// Run a loop and halt the session the moment it returns.
///
/// Only the first loop to finish reports its result; later ones yield
/// `None` so the outcome does not depend on join order.
async fn halting<F>(shared: Arc<Shared>, task: F) -> Option<Result<()>>
where
    F: Future<Output = Result<()>>,
{
    let result = task.await;
    let first = !shared.halt();
    first.then_some(result)
}
