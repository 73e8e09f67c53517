//! Shared test doubles and arbitrary generators for property-based testing.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use crate::consumer::Handler;
use crate::extract::BurstPredicate;
use crate::store::{MemoryStore, Rejected, Store, StoreError};

/// Item weights for extractor properties: short runs of small weights so
/// both bursting and non-bursting stores come up often.
pub fn arb_weights() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..=15, 0..30)
}

/// A [`MemoryStore`] that starts failing `batch` or `put` after a number of
/// successful calls.
pub struct FlakyStore<T> {
    inner: MemoryStore<T>,
    batch_calls: AtomicUsize,
    put_calls: AtomicUsize,
    fail_batch_after: Option<usize>,
    fail_put_after: Option<usize>,
}

impl<T> FlakyStore<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        FlakyStore {
            inner: MemoryStore::from_items(items),
            batch_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            fail_batch_after: None,
            fail_put_after: None,
        }
    }

    /// Every `batch` call after the first `n` returns a fault.
    pub fn fail_batch_after(mut self, n: usize) -> Self {
        self.fail_batch_after = Some(n);
        self
    }

    /// Every `put` call after the first `n` is rejected with a fault.
    pub fn fail_put_after(mut self, n: usize) -> Self {
        self.fail_put_after = Some(n);
        self
    }

    pub fn inner(&self) -> &MemoryStore<T> {
        &self.inner
    }
}

fn tripped(calls: &AtomicUsize, limit: Option<usize>) -> bool {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    limit.is_some_and(|limit| n >= limit)
}

impl<T: Send> Store<T> for FlakyStore<T> {
    fn put(&self, item: T) -> Result<(), Rejected<T>> {
        if tripped(&self.put_calls, self.fail_put_after) {
            return Err(Rejected::new(
                item,
                StoreError::Fault("injected put failure".to_string()),
            ));
        }
        self.inner.put(item)
    }

    fn batch(&self, max: usize) -> Result<Vec<T>, StoreError> {
        if tripped(&self.batch_calls, self.fail_batch_after) {
            return Err(StoreError::Fault("injected batch failure".to_string()));
        }
        self.inner.batch(max)
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }
}

/// Wraps a predicate and counts how often it is evaluated.
pub struct CountingPredicate<P> {
    inner: P,
    evaluations: AtomicUsize,
}

impl<P> CountingPredicate<P> {
    pub fn new(inner: P) -> Self {
        CountingPredicate {
            inner,
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl<T, P: BurstPredicate<T>> BurstPredicate<T> for CountingPredicate<P> {
    type Error = P::Error;

    fn evaluate(&self, batch: &[T]) -> Result<bool, Self::Error> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(batch)
    }
}

/// Error returned by failing test predicates.
#[derive(Debug, thiserror::Error)]
#[error("predicate failed")]
pub struct PredicateFailed;

/// Handler that records every batch it is given.
///
/// Optionally sleeps before answering and optionally fails every batch.
/// Tracks how many calls overlap so tests can check cycle serialization.
pub struct RecordingHandler<T> {
    batches: Arc<Mutex<Vec<Vec<T>>>>,
    fail: bool,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl<T> RecordingHandler<T> {
    pub fn accepting() -> Self {
        RecordingHandler {
            batches: Arc::new(Mutex::new(Vec::new())),
            fail: false,
            delay: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        RecordingHandler {
            fail: true,
            ..Self::accepting()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A view onto the recorded batches that outlives the handler.
    pub fn recorder(&self) -> Recorder<T> {
        Recorder {
            batches: Arc::clone(&self.batches),
            max_in_flight: Arc::clone(&self.max_in_flight),
        }
    }
}

impl<T> Handler<T> for RecordingHandler<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Error = String;

    fn handle(&self, batch: &[T]) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.batches.lock().push(batch.to_vec());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let in_flight = Arc::clone(&self.in_flight);
        let fail = self.fail;
        let delay = self.delay;
        let len = batch.len();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if fail {
                Err(format!("refusing batch of {len}"))
            } else {
                Ok(())
            }
        }
    }
}

/// Read side of a [`RecordingHandler`].
pub struct Recorder<T> {
    batches: Arc<Mutex<Vec<Vec<T>>>>,
    max_in_flight: Arc<AtomicUsize>,
}

impl<T: Clone> Recorder<T> {
    pub fn batches(&self) -> Vec<Vec<T>> {
        self.batches.lock().clone()
    }

    /// Every recorded item, in call order.
    pub fn items(&self) -> Vec<T> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}
