//! Per-filter credit buckets.
//!
//! One bucket per filter gives every filter independent backpressure: a
//! filter whose server engine is slow stalls only its own producer.
//!
//! Each filter has exactly one producer, so a bucket has at most one waiter
//! and `release` wakes with `notify_one`. Supporting several producers per
//! filter would need a fair per-filter wait queue instead.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};

/// What a [`TokenRegistry::release`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// One credit was added back.
    Returned,
    /// The bucket already held its declared credit; nothing was added.
    AtCapacity,
    /// The filter is not part of the current handshake; ignored.
    UnknownFilter,
}

/// Credit buckets for every filter the server declared.
///
/// The bucket map sits behind a `std::sync::Mutex` that is never held
/// across an `.await`. Waiters park on `tokio::sync::Notify` handles.
pub struct TokenRegistry {
    state: Mutex<RegistryState>,
    ready: Notify,
}

#[derive(Default)]
struct RegistryState {
    ready: bool,
    /// Bumped by every handshake. A waiter that observes a different epoch
    /// after arming its wakeup re-evaluates instead of sleeping.
    epoch: u64,
    credit_per_filter: u32,
    order: Vec<String>,
    buckets: HashMap<String, Bucket>,
}

struct Bucket {
    credit: u32,
    limit: u32,
    wake: Arc<Notify>,
}

enum Attempt {
    Granted,
    /// `wake == None` means "wait for the first handshake".
    Wait {
        wake: Option<Arc<Notify>>,
        epoch: u64,
    },
}

impl TokenRegistry {
    /// An empty registry. Every `acquire` waits until the first `reset`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            ready: Notify::new(),
        }
    }

    /// Take one credit for `filter`, waiting as long as necessary.
    ///
    /// Waits for the first handshake if none has happened yet. Fails with
    /// [`ClientError::UnknownFilter`] once a handshake is in place that does
    /// not declare `filter`, including when a later handshake removes a
    /// filter this call was waiting on.
    pub async fn acquire(&self, filter: &str) -> Result<()> {
        loop {
            let (wake, epoch) = match self.try_take(filter)? {
                Attempt::Granted => return Ok(()),
                Attempt::Wait { wake, epoch } => (wake, epoch),
            };

            let notified = match &wake {
                Some(wake) => wake.notified(),
                None => self.ready.notified(),
            };
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.epoch() != epoch {
                continue;
            }

            if wake.is_some() {
                debug!(filter, "no credit; waiting");
            } else {
                debug!(filter, "waiting for handshake");
            }
            notified.await;
        }
    }

    /// Return one credit to `filter` and wake its waiter, if any.
    ///
    /// Credit never grows past the amount the last handshake declared;
    /// surplus returns are dropped with a warning.
    pub fn release(&self, filter: &str) -> Release {
        let mut state = self.lock();
        let Some(bucket) = state.buckets.get_mut(filter) else {
            warn!(filter, "credit returned for unknown filter; ignoring");
            return Release::UnknownFilter;
        };

        if bucket.credit >= bucket.limit {
            warn!(
                filter,
                credit = bucket.credit,
                "credit returned beyond declared limit; ignoring"
            );
            return Release::AtCapacity;
        }

        bucket.credit += 1;
        trace!(filter, credit = bucket.credit, "credit returned");
        bucket.wake.notify_one();
        Release::Returned
    }

    /// Replace the bucket set with `filters`, each holding `credit_each`.
    ///
    /// Counters are reset in place: a filter present before and after keeps
    /// its wake handle, and every waiter (old and new filters alike) is
    /// woken to re-check against the new state. Returns `true` for the
    /// first handshake of this registry.
    pub fn reset<I, S>(&self, filters: I, credit_each: u32) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        let first = !state.ready;
        state.ready = true;
        state.epoch += 1;
        state.credit_per_filter = credit_each;

        let mut previous = std::mem::take(&mut state.buckets);
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for name in filters.into_iter().map(Into::into) {
            if !seen.insert(name.clone()) {
                continue;
            }
            let wake = previous
                .remove(&name)
                .map(|bucket| bucket.wake)
                .unwrap_or_default();
            state.buckets.insert(
                name.clone(),
                Bucket {
                    credit: credit_each,
                    limit: credit_each,
                    wake,
                },
            );
            order.push(name);
        }
        state.order = order;

        for bucket in state.buckets.values() {
            bucket.wake.notify_waiters();
        }
        for (name, bucket) in previous {
            debug!(filter = %name, "filter dropped by handshake");
            bucket.wake.notify_waiters();
        }
        drop(state);

        self.ready.notify_waiters();
        first
    }

    /// Current credit of `filter`, or `None` if it is not declared.
    pub fn credit(&self, filter: &str) -> Option<u32> {
        self.lock().buckets.get(filter).map(|bucket| bucket.credit)
    }

    /// Declared filters, in handshake order.
    pub fn filters(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    /// Credit each filter received in the last handshake.
    pub fn credit_per_filter(&self) -> u32 {
        self.lock().credit_per_filter
    }

    /// Whether at least one handshake has been applied.
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    fn try_take(&self, filter: &str) -> Result<Attempt> {
        let mut state = self.lock();
        if !state.ready {
            return Ok(Attempt::Wait {
                wake: None,
                epoch: state.epoch,
            });
        }

        let epoch = state.epoch;
        let bucket = state
            .buckets
            .get_mut(filter)
            .ok_or_else(|| ClientError::UnknownFilter(filter.to_string()))?;

        if bucket.credit > 0 {
            bucket.credit -= 1;
            trace!(filter, credit = bucket.credit, "credit taken");
            return Ok(Attempt::Granted);
        }

        Ok(Attempt::Wait {
            wake: Some(Arc::clone(&bucket.wake)),
            epoch,
        })
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        let credits: Vec<(&str, u32)> = state
            .order
            .iter()
            .map(|name| {
                let credit = state.buckets.get(name).map_or(0, |bucket| bucket.credit);
                (name.as_str(), credit)
            })
            .collect();
        f.debug_struct("TokenRegistry")
            .field("ready", &state.ready)
            .field("credits", &credits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const BLOCKED: Duration = Duration::from_millis(50);

    async fn is_blocked(registry: &TokenRegistry, filter: &str) -> bool {
        tokio::time::timeout(BLOCKED, registry.acquire(filter))
            .await
            .is_err()
    }

    #[tokio::test]
    async fn acquire_decrements_until_empty() {
        let registry = TokenRegistry::new();
        registry.reset(["a"], 2);

        registry.acquire("a").await.unwrap();
        registry.acquire("a").await.unwrap();
        assert_eq!(registry.credit("a"), Some(0));
        assert!(is_blocked(&registry, "a").await);
        assert_eq!(registry.credit("a"), Some(0));
    }

    #[tokio::test]
    async fn acquire_waits_for_first_handshake() {
        let registry = Arc::new(TokenRegistry::new());
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire("a").await })
        };

        tokio::time::sleep(BLOCKED).await;
        assert!(!waiter.is_finished());

        assert!(registry.reset(["a"], 1));
        waiter.await.unwrap().unwrap();
        assert_eq!(registry.credit("a"), Some(0));
    }

    #[tokio::test]
    async fn unknown_filter_fails_after_handshake() {
        let registry = TokenRegistry::new();
        registry.reset(["a"], 1);

        let err = registry.acquire("b").await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownFilter(name) if name == "b"));
    }

    #[tokio::test]
    async fn release_wakes_blocked_waiter() {
        let registry = Arc::new(TokenRegistry::new());
        registry.reset(["a"], 1);
        registry.acquire("a").await.unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire("a").await })
        };
        tokio::time::sleep(BLOCKED).await;
        assert!(!waiter.is_finished());

        assert_eq!(registry.release("a"), Release::Returned);
        waiter.await.unwrap().unwrap();
        assert_eq!(registry.credit("a"), Some(0));
    }

    #[tokio::test]
    async fn one_filter_stalling_does_not_block_another() {
        let registry = TokenRegistry::new();
        registry.reset(["slow", "fast"], 1);

        registry.acquire("slow").await.unwrap();
        assert!(is_blocked(&registry, "slow").await);

        registry.acquire("fast").await.unwrap();
        assert_eq!(registry.credit("fast"), Some(0));
    }

    #[test]
    fn release_is_capped_at_declared_credit() {
        let registry = TokenRegistry::new();
        registry.reset(["a"], 2);

        assert_eq!(registry.release("a"), Release::AtCapacity);
        assert_eq!(registry.credit("a"), Some(2));
    }

    #[test]
    fn release_of_unknown_filter_is_ignored() {
        let registry = TokenRegistry::new();
        assert_eq!(registry.release("a"), Release::UnknownFilter);

        registry.reset(["a"], 1);
        assert_eq!(registry.release("b"), Release::UnknownFilter);
        assert_eq!(registry.credit("b"), None);
    }

    #[tokio::test]
    async fn acquire_then_release_is_net_zero() {
        let registry = TokenRegistry::new();
        registry.reset(["a"], 3);

        registry.acquire("a").await.unwrap();
        assert_eq!(registry.release("a"), Release::Returned);
        assert_eq!(registry.credit("a"), Some(3));
    }

    #[tokio::test]
    async fn rehandshake_wakes_waiter_on_replaced_bucket() {
        let registry = Arc::new(TokenRegistry::new());
        registry.reset(["a"], 1);
        registry.acquire("a").await.unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire("a").await })
        };
        tokio::time::sleep(BLOCKED).await;
        assert!(!waiter.is_finished());

        assert!(!registry.reset(["a", "b"], 4));
        waiter.await.unwrap().unwrap();
        assert_eq!(registry.credit("a"), Some(3));
        assert_eq!(registry.credit("b"), Some(4));
    }

    #[tokio::test]
    async fn rehandshake_dropping_filter_fails_its_waiter() {
        let registry = Arc::new(TokenRegistry::new());
        registry.reset(["a"], 0);

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire("a").await })
        };
        tokio::time::sleep(BLOCKED).await;
        assert!(!waiter.is_finished());

        registry.reset(["b"], 1);
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ClientError::UnknownFilter(_))));
    }

    #[test]
    fn reset_dedupes_and_keeps_order() {
        let registry = TokenRegistry::new();
        assert!(!registry.is_ready());

        registry.reset(["c", "a", "c", "b"], 5);

        assert!(registry.is_ready());
        assert_eq!(registry.filters(), vec!["c", "a", "b"]);
        assert_eq!(registry.credit_per_filter(), 5);
    }

    #[test]
    fn debug_lists_credits() {
        let registry = TokenRegistry::new();
        registry.reset(["a"], 2);
        let out = format!("{registry:?}");
        assert!(out.contains("\"a\", 2"));
    }
}
