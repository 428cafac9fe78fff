//! Frame-rate and round-trip measurement by wrapping the capabilities.
//!
//! ```no_run
//! # use tokenwire_client::{InputFrame, Session, SessionConfig, TimingStats};
//! # use tokenwire_proto::ResultMessage;
//! # fn demo(config: SessionConfig) {
//! let stats = TimingStats::new(10);
//! let mut session = Session::new(config, stats.wrap_consumer(|_r: ResultMessage| {}));
//! let counter = session.sequence_counter();
//! session.add_producer("faces", stats.wrap_producer(|| None::<InputFrame>, counter));
//! # }
//! ```
//!
//! Send timestamps are keyed by [`SequenceCounter::peek`] at the moment a
//! frame is produced. With one producer that is exactly the number the
//! frame goes out with; with several, another filter may claim it first
//! and the round trip recorded for that number is approximate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokenwire_proto::ResultMessage;
use tracing::{error, info};

use crate::capability::{Consumer, InputFrame, Producer};
use crate::session::SequenceCounter;

/// Shared timing statistics for one session.
#[derive(Clone, Debug)]
pub struct TimingStats {
    inner: Arc<Mutex<TimingState>>,
}

#[derive(Debug)]
struct TimingState {
    output_freq: u64,
    /// Frames still waiting for their result.
    sent: HashMap<u64, Instant>,
    rtt_total: Duration,
    matched: u32,
    count: u64,
    interval_count: u64,
    start: Instant,
    interval_start: Instant,
}

impl TimingStats {
    /// Log FPS every `output_freq` results. Zero disables FPS logging.
    pub fn new(output_freq: u64) -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(Mutex::new(TimingState {
                output_freq,
                sent: HashMap::new(),
                rtt_total: Duration::ZERO,
                matched: 0,
                count: 0,
                interval_count: 0,
                start: now,
                interval_start: now,
            })),
        }
    }

    pub fn wrap_producer<P: Producer>(
        &self,
        producer: P,
        sequence: SequenceCounter,
    ) -> TimingProducer<P> {
        TimingProducer {
            inner: producer,
            sequence,
            stats: self.clone(),
        }
    }

    pub fn wrap_consumer<C: Consumer>(&self, consumer: C) -> TimingConsumer<C> {
        TimingConsumer {
            inner: consumer,
            stats: self.clone(),
        }
    }

    /// Successful results seen so far.
    pub fn results(&self) -> u64 {
        self.lock().count
    }

    /// Mean round trip over every frame that got an answer.
    ///
    /// Frames that were sent but never answered are logged at `error`.
    /// Returns `None` if no frame was answered.
    pub fn average_rtt(&self) -> Option<Duration> {
        let state = self.lock();
        for seq in state.sent.keys() {
            error!(seq, "frame never answered");
        }
        (state.matched > 0).then(|| state.rtt_total / state.matched)
    }

    /// Forget pending timestamps and the round-trip total. Counters and FPS windows are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.sent.clear();
        state.rtt_total = Duration::ZERO;
        state.matched = 0;
    }

    fn record_sent(&self, seq: u64) {
        self.lock().sent.insert(seq, Instant::now());
    }

    fn record_received(&self, seq: u64) {
        let now = Instant::now();
        let mut state = self.lock();
        if let Some(sent) = state.sent.remove(&seq) {
            state.rtt_total += now.saturating_duration_since(sent);
            state.matched += 1;
        }
        state.count += 1;
        state.interval_count += 1;

        if state.output_freq == 0 || state.count % state.output_freq != 0 {
            return;
        }

        let overall = fps(state.count, now.duration_since(state.start));
        let interval = fps(
            state.interval_count,
            now.duration_since(state.interval_start),
        );
        info!(
            results = state.count,
            overall_fps = overall,
            interval_fps = interval,
            "throughput"
        );
        state.interval_count = 0;
        state.interval_start = now;
    }

    fn lock(&self) -> MutexGuard<'_, TimingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fps(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// A [`Producer`] that records when each frame was produced.
pub struct TimingProducer<P> {
    inner: P,
    sequence: SequenceCounter,
    stats: TimingStats,
}

impl<P: Producer> Producer for TimingProducer<P> {
    fn produce(&mut self) -> BoxFuture<'_, Option<InputFrame>> {
        Box::pin(async move {
            let frame = self.inner.produce().await;
            if frame.is_some() {
                self.stats.record_sent(self.sequence.peek());
            }
            frame
        })
    }
}

/// A [`Consumer`] that counts results and records when each arrived.
pub struct TimingConsumer<C> {
    inner: C,
    stats: TimingStats,
}

impl<C: Consumer> Consumer for TimingConsumer<C> {
    fn consume(&mut self, result: ResultMessage) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let seq = result.sequence_number;
            self.inner.consume(result).await;
            self.stats.record_received(seq);
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokenwire_proto::{PayloadKind, ResultStatus};

    use super::*;

    #[tokio::test]
    async fn wrapped_capabilities_record_round_trips() {
        let stats = TimingStats::new(0);
        let sequence = SequenceCounter::default();
        let mut producer = stats.wrap_producer(
            || Some(InputFrame::new(PayloadKind::Image, Bytes::from_static(b"x"))),
            sequence.clone(),
        );

        let mut seen = 0;
        {
            let mut consumer = stats.wrap_consumer(|_result: ResultMessage| seen += 1);
            assert!(producer.produce().await.is_some());
            sequence.advance();
            consumer
                .consume(ResultMessage::new("f", ResultStatus::Success, 0))
                .await;
        }

        assert_eq!(seen, 1);
        assert_eq!(stats.results(), 1);
        assert!(stats.average_rtt().is_some());
    }

    #[tokio::test]
    async fn empty_production_is_not_recorded() {
        let stats = TimingStats::new(0);
        let mut producer = stats.wrap_producer(|| None, SequenceCounter::default());

        assert!(producer.produce().await.is_none());
        assert_eq!(stats.average_rtt(), None);
    }

    #[test]
    fn unanswered_frames_do_not_count_toward_rtt() {
        let stats = TimingStats::new(0);
        stats.record_sent(0);
        stats.record_sent(1);
        stats.record_received(1);

        assert!(stats.average_rtt().is_some());
        assert_eq!(stats.results(), 1);
    }

    #[test]
    fn clear_drops_timestamps_but_keeps_count() {
        let stats = TimingStats::new(1);
        stats.record_sent(0);
        stats.record_received(0);
        stats.clear();

        assert_eq!(stats.average_rtt(), None);
        assert_eq!(stats.results(), 1);
    }

    #[test]
    fn answered_frames_are_not_retained() {
        let stats = TimingStats::new(0);
        for seq in 0..100 {
            stats.record_sent(seq);
            stats.record_received(seq);
        }
        stats.record_sent(100);

        assert_eq!(stats.lock().sent.len(), 1);
        assert!(stats.average_rtt().is_some());
        assert_eq!(stats.results(), 100);
    }

    #[test]
    fn fps_handles_zero_elapsed() {
        assert_eq!(fps(10, Duration::ZERO), 0.0);
        assert_eq!(fps(10, Duration::from_secs(2)), 5.0);
    }
}
