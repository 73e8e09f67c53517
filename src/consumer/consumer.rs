//! The rate-limited consumer.
//!
//! One extraction cycle starts per tick. With [`CyclePolicy::Overlapping`]
//! a slow handler does not delay the next tick, so several cycles may be
//! extracting and handling at once; each works on disjoint items because the
//! store hands every item out exactly once.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::extract::{BurstPredicate, ExtractError, find_maximal_batch};
use crate::store::Store;

use super::config::{ConfigError, ConsumerConfig, CyclePolicy};
use super::dirty::DirtySet;
use super::handler::Handler;
use super::lifecycle::ConsumerState;
use super::stats::{ConsumerStats, CycleStats};

/// Errors returned by [`RateLimitedConsumer`].
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// `close()` has already been called.
    #[error("the consumer is already stopped")]
    AlreadyStopped,

    /// The configuration was rejected at construction.
    #[error("invalid consumer config: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Why [`RateLimitedConsumer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The store reported itself closed at a tick.
    StoreClosed,
    /// `close()` was called.
    Cancelled,
}

/// Outcome of a single extraction cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// 1-based cycle id, shared with the `cycle` tracing span.
    pub cycle: u64,
    /// Items handed to the handler. Zero means the handler was not called.
    pub extracted: usize,
    /// True if the handler accepted the batch.
    pub delivered: bool,
    /// Items this cycle moved to the dirty set.
    pub dirtied: usize,
    /// The extraction fault, if the extractor did not finish cleanly.
    pub fault: Option<ExtractError>,
}

/// State shared between the consumer and its spawned cycles.
struct Shared<T, S: ?Sized, P, H> {
    store: Arc<S>,
    predicate: P,
    handler: H,
    policy: CyclePolicy,
    dirty: DirtySet<T>,
    stats: CycleStats,
    serial: tokio::sync::Mutex<()>,
}

impl<T, S, P, H> Shared<T, S, P, H>
where
    T: Send + Sync + 'static,
    S: Store<T> + ?Sized + 'static,
    P: BurstPredicate<T> + 'static,
    H: Handler<T>,
{
    async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let _turn = match self.policy {
            CyclePolicy::Serialized => Some(self.serial.lock().await),
            CyclePolicy::Overlapping => None,
        };

        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        let (batch, unresolved) = match find_maximal_batch(&*self.store, &self.predicate) {
            Ok(batch) => (batch, Vec::new()),
            Err(failure) => {
                let (error, packaged, unresolved) = failure.into_parts();
                warn!(
                    error = %error,
                    packaged = packaged.len(),
                    unresolved = unresolved.len(),
                    "Extraction failed, delivering verified prefix"
                );
                self.stats.record_extraction_fault();
                report.fault = Some(error);
                (packaged, unresolved)
            }
        };

        if batch.is_empty() {
            debug!("Nothing to deliver this cycle");
        } else {
            report.extracted = batch.len();
            self.stats.record_extracted(batch.len());

            let outcome = self.handler.handle(&batch).await;
            match outcome {
                Ok(()) => {
                    debug!(items = batch.len(), "Batch delivered");
                    self.stats.record_delivered(batch.len());
                    report.delivered = true;
                }
                Err(e) => {
                    warn!(error = %e, items = batch.len(), "Handler failed, marking batch dirty");
                    self.stats.record_handler_failure();
                    report.dirtied += batch.len();
                    self.mark_dirty(batch);
                }
            }
        }

        // Items the extractor could not verify go in after the batch.
        if !unresolved.is_empty() {
            report.dirtied += unresolved.len();
            self.mark_dirty(unresolved);
        }

        report
    }

    fn mark_dirty(&self, items: Vec<T>) {
        self.stats.record_dirtied(items.len());
        self.dirty.append(items);
    }
}

/// Periodically extracts a maximal non-bursting batch and hands it to a
/// [`Handler`].
///
/// Items the handler fails on, and items an extraction fault leaves
/// unverified, accumulate in a dirty set that [`close`](Self::close)
/// returns.
///
/// # Example
///
/// ```ignore
/// let consumer = Arc::new(RateLimitedConsumer::new(
///     ConsumerConfig::from_env(),
///     Arc::clone(&store),
///     WeightLimit::new(64, |job: &Job| job.cost),
///     Upload::new(client),
/// )?);
///
/// let runner = tokio::spawn({
///     let consumer = Arc::clone(&consumer);
///     async move { consumer.run().await }
/// });
///
/// // ... later
/// let dirty = consumer.close().await?;
/// ```
pub struct RateLimitedConsumer<T, S: ?Sized, P, H> {
    config: ConsumerConfig,
    shared: Arc<Shared<T, S, P, H>>,
    state: Mutex<ConsumerState>,
    /// Cancelled by `close()`; stops the tick loop.
    shutdown: CancellationToken,
    /// Cancelled once `close()` has finished.
    stopped: CancellationToken,
    cycles: TaskTracker,
}

impl<T, S, P, H> RateLimitedConsumer<T, S, P, H>
where
    T: Send + Sync + 'static,
    S: Store<T> + ?Sized + 'static,
    P: BurstPredicate<T> + 'static,
    H: Handler<T>,
{
    /// Creates a consumer in the `Running` state. No cycle runs until
    /// [`run`](Self::run) or [`run_cycle_now`](Self::run_cycle_now) is
    /// called.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Config`] if `config` is invalid.
    pub fn new(config: ConsumerConfig, store: Arc<S>, predicate: P, handler: H) -> Result<Self> {
        config.validate()?;

        Ok(RateLimitedConsumer {
            shared: Arc::new(Shared {
                store,
                predicate,
                handler,
                policy: config.cycle_policy,
                dirty: DirtySet::new(),
                stats: CycleStats::default(),
                serial: tokio::sync::Mutex::new(()),
            }),
            config,
            state: Mutex::new(ConsumerState::Running),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            cycles: TaskTracker::new(),
        })
    }

    /// Drives the tick loop until the store closes or `close()` is called.
    ///
    /// The first tick fires one interval after the call. Ticks missed while
    /// the runtime was busy are skipped rather than replayed. Cycles started
    /// here keep running after this returns; `close()` joins them.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::AlreadyStopped`] if `close()` was already
    /// called.
    #[instrument(skip_all, fields(
        interval_ms = self.config.interval.as_millis() as u64,
        policy = ?self.config.cycle_policy,
    ))]
    pub async fn run(&self) -> Result<RunExit> {
        if !self.state().is_running() {
            return Err(ConsumerError::AlreadyStopped);
        }

        info!("Consumer loop started");

        let interval = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping consumer loop");
                    break RunExit::Cancelled;
                }

                _ = ticker.tick() => {
                    if self.shared.store.is_done() {
                        info!("Store closed, stopping consumer loop");
                        break RunExit::StoreClosed;
                    }
                    if !self.spawn_cycle() {
                        break RunExit::Cancelled;
                    }
                }
            }
        };

        Ok(exit)
    }

    /// Starts a tracked cycle task. Returns false once the consumer has left
    /// `Running`.
    fn spawn_cycle(&self) -> bool {
        // Hold the state lock across the spawn so `close()` cannot slip
        // between the check and the tracker registration.
        let state = self.state.lock();
        if !state.is_running() {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let cycle = shared.stats.start_cycle();
        self.cycles.spawn(
            async move {
                let report = shared.run_cycle(cycle).await;
                debug!(
                    extracted = report.extracted,
                    delivered = report.delivered,
                    dirtied = report.dirtied,
                    "Cycle finished"
                );
            }
            .instrument(info_span!("cycle", cycle)),
        );
        drop(state);
        true
    }

    /// Runs one cycle on the calling task, outside the tick schedule.
    ///
    /// Follows the configured [`CyclePolicy`] and is joined by `close()`
    /// like any ticked cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::AlreadyStopped`] if `close()` was already
    /// called.
    pub async fn run_cycle_now(&self) -> Result<CycleReport> {
        let (cycle, tracked) = {
            let state = self.state.lock();
            if !state.is_running() {
                return Err(ConsumerError::AlreadyStopped);
            }
            let cycle = self.shared.stats.start_cycle();
            (cycle, self.cycles.track_future(self.shared.run_cycle(cycle)))
        };

        Ok(tracked.instrument(info_span!("cycle", cycle, manual = true)).await)
    }

    /// Stops the consumer and returns every dirty item.
    ///
    /// No new cycle starts once this is called. In-flight cycles, including
    /// their handler calls, run to completion before the dirty set is
    /// collected, so an item is either handled, back in the store, or in
    /// the returned list.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::AlreadyStopped`] on every call after the
    /// first.
    #[instrument(skip_all)]
    pub async fn close(&self) -> Result<Vec<T>> {
        self.state.lock().begin_drain()?;

        info!(in_flight = self.cycles.len(), "Closing consumer, draining in-flight cycles");
        self.shutdown.cancel();
        self.cycles.close();
        self.cycles.wait().await;

        let dirty = self.shared.dirty.take();
        self.state.lock().finish();
        self.stopped.cancel();

        info!(dirty = dirty.len(), "Consumer stopped");
        Ok(dirty)
    }

    /// Resolves once `close()` has completed.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.stopped.cancelled()
    }

    /// Returns true once `close()` has completed.
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        *self.state.lock()
    }

    /// Size of the most recent non-empty extracted batch, or 0 before any.
    pub fn last_batch_size(&self) -> usize {
        self.shared.stats.last_batch_size()
    }

    /// Snapshot of the cycle counters.
    pub fn stats(&self) -> ConsumerStats {
        self.shared.stats.snapshot()
    }

    /// Number of items currently in the dirty set.
    pub fn dirty_len(&self) -> usize {
        self.shared.dirty.len()
    }

    /// The validated configuration.
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }
}
