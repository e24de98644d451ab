//! # Simple Batcher
//!
//! Thread-safe flush coordinator. Commands submitted from any number of threads
//! are appended to a shared [`PendingQueue`] and flushed to a single [`Sink`]
//! either once the queue reaches the batch size or on a forced flush.
//!
//! At most one thread drains the queue and calls the sink at any instant. The
//! winner of the flushing flag does the work; a caller that loses the race
//! returns at once instead of waiting. A forced flush that loses records a
//! request so the current flusher makes one more pass before it returns.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace};

use super::metrics::{BatcherMetrics, MetricsSnapshot};
use super::queue::{DrainPlan, PendingQueue};
use super::tasks::BatchTasks;
use super::{Batcher, CommandBatching};
use crate::config::{BatchSize, BatcherConfig};
use crate::error::{DispatchError, Result};
use crate::logging::log_batch_dispatch;
use crate::sink::Sink;

/// Outcome of a submission or flush
pub type FlushResult<C, E> = std::result::Result<BatchTasks<C>, DispatchError<C, E>>;

/// Batcher that flushes at a size threshold or on demand
///
/// # Examples
///
/// ```rust
/// use command_batcher::{BatchSize, CollectingSink, CommandBatching, SimpleBatcher};
///
/// let batcher = SimpleBatcher::new(CollectingSink::new(), BatchSize::Bounded(3));
///
/// batcher.submit("c1", Some(CommandBatching::Queue)).unwrap();
/// batcher.submit("c2", Some(CommandBatching::Queue)).unwrap();
/// let dispatched = batcher.submit("c3", None).unwrap();
///
/// assert_eq!(dispatched.into_vec(), vec!["c1", "c2", "c3"]);
/// assert_eq!(batcher.sink().batches(), vec![vec!["c1", "c2", "c3"]]);
/// ```
#[derive(Debug)]
pub struct SimpleBatcher<C, S> {
    name: String,
    sink: S,
    batch_size: BatchSize,
    queue: PendingQueue<C>,
    flushing: AtomicBool,
    /// Set when a forced flush lost the race while a flush was in progress
    force_flush_requested: AtomicBool,
    metrics: BatcherMetrics,
}

/// Holds the flushing flag; dropping it releases the flag, including on unwind
struct FlushPermit<'a> {
    flushing: &'a AtomicBool,
}

impl Drop for FlushPermit<'_> {
    fn drop(&mut self) {
        self.flushing.store(false, Ordering::SeqCst);
    }
}

impl<C, S> SimpleBatcher<C, S>
where
    S: Sink<C>,
{
    /// Create a batcher over `sink` with an already validated batch size
    pub fn new(sink: S, batch_size: BatchSize) -> Self {
        Self::build(sink, batch_size, "batcher".to_string())
    }

    /// Create a batcher whose log events carry `name`
    pub fn named(name: impl Into<String>, sink: S, batch_size: BatchSize) -> Self {
        Self::build(sink, batch_size, name.into())
    }

    /// Create a batcher from a raw batch size where `-1` means unbounded.
    ///
    /// Rejects 0, 1 and negatives other than `-1`.
    pub fn with_batch_size(sink: S, batch_size: i64) -> Result<Self> {
        Ok(Self::new(sink, BatchSize::new(batch_size)?))
    }

    /// Create a batcher from loaded configuration
    pub fn from_config(sink: S, config: &BatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(sink, config.batch_size, config.name.clone()))
    }

    fn build(sink: S, batch_size: BatchSize, name: String) -> Self {
        info!(batcher = %name, batch_size = %batch_size, "🧺 Command batcher initialized");

        Self {
            name,
            sink,
            batch_size,
            queue: PendingQueue::new(),
            flushing: AtomicBool::new(false),
            force_flush_requested: AtomicBool::new(false),
            metrics: BatcherMetrics::new(),
        }
    }

    /// Queue `command` and flush according to `batching`.
    ///
    /// - `Some(Queue)`: queue only, never flush.
    /// - `None`: flush up to one batch once the queue reaches the batch size.
    /// - `Some(Flush)`: drain and dispatch everything queued.
    ///
    /// Returns the commands this call itself dispatched, which is empty when
    /// another thread was already flushing.
    pub fn submit(&self, command: C, batching: Option<CommandBatching>) -> FlushResult<C, S::Error> {
        self.queue.push(command);
        self.metrics.record_submitted();

        match batching {
            Some(CommandBatching::Queue) => Ok(BatchTasks::empty()),
            Some(CommandBatching::Flush) => self.flush_pass(true),
            None if self.batch_size.is_reached_by(self.queue.len()) => self.flush_pass(false),
            None => Ok(BatchTasks::empty()),
        }
    }

    /// Queue without attempting a flush
    pub fn enqueue(&self, command: C) {
        self.queue.push(command);
        self.metrics.record_submitted();
    }

    /// Queue with the default threshold behavior
    pub fn submit_default(&self, command: C) -> FlushResult<C, S::Error> {
        self.submit(command, None)
    }

    /// Queue and force a flush of everything queued
    pub fn submit_and_flush(&self, command: C) -> FlushResult<C, S::Error> {
        self.submit(command, Some(CommandBatching::Flush))
    }

    /// Force a flush of everything queued without adding a command
    pub fn flush(&self) -> FlushResult<C, S::Error> {
        self.flush_pass(true)
    }

    /// Approximate number of queued commands
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True while some thread holds the flushing flag
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // All flag operations are SeqCst: a losing forced flush stores the request
    // flag and then observes the flushing flag, while the flusher releases the
    // flushing flag and then observes the request flag. Both orders must agree.
    fn try_acquire(&self) -> Option<FlushPermit<'_>> {
        self.flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FlushPermit {
                flushing: &self.flushing,
            })
    }

    /// Run flush passes until nothing more is owed by this call.
    ///
    /// A forced call that finds the flag held records its request and then
    /// tries the flag once more. If that retry wins, this call drains the
    /// queue itself and returns a non-empty result instead of leaving the
    /// work to the current flusher.
    fn flush_pass(&self, forced: bool) -> FlushResult<C, S::Error> {
        let mut collected: Vec<C> = Vec::new();
        let mut request_recorded = false;
        // Becomes true once this call honors another caller's forced request
        let mut drain_all = forced;

        loop {
            self.metrics.record_flush_attempt();

            let Some(permit) = self.try_acquire() else {
                self.metrics.record_contended();

                if forced && !request_recorded {
                    self.force_flush_requested.store(true, Ordering::SeqCst);
                    self.metrics.record_force_request();
                    request_recorded = true;
                    trace!(batcher = %self.name, "Flush in progress, recorded forced flush request");

                    // The flusher may have finished its re-check before the
                    // request landed; one more attempt closes that window.
                    continue;
                }

                if !collected.is_empty() {
                    self.metrics.record_handoff();
                    trace!(
                        batcher = %self.name,
                        dispatched = collected.len(),
                        "Another thread took over flushing, returning partial result"
                    );
                }
                return Ok(collected.into());
            };

            let (plan, size_triggered) = self.drain_plan(drain_all);
            let batch = self.queue.drain(plan);

            if let Err(source) = self.dispatch(&batch, drain_all) {
                drop(permit);
                return Err(DispatchError {
                    source,
                    failed: batch,
                    dispatched: collected,
                });
            }

            drop(permit);
            collected.extend(batch);

            if size_triggered
                && self
                    .batch_size
                    .limit()
                    .is_some_and(|limit| self.queue.len() > limit)
            {
                continue;
            }

            if self
                .force_flush_requested
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                trace!(batcher = %self.name, "Honoring forced flush requested during previous pass");
                drain_all = true;
                continue;
            }

            return Ok(collected.into());
        }
    }

    /// Decide how much to drain, re-checking the threshold now that the flag is held
    fn drain_plan(&self, drain_all: bool) -> (DrainPlan, bool) {
        if drain_all {
            return (DrainPlan::All, false);
        }

        match self.batch_size.limit() {
            Some(limit) if self.queue.len() >= limit => (DrainPlan::UpTo(limit), true),
            _ => (DrainPlan::Nothing, false),
        }
    }

    fn dispatch(&self, batch: &[C], forced: bool) -> std::result::Result<(), S::Error> {
        let result = match batch {
            [] => return Ok(()),
            [command] => self.sink.dispatch_one(command),
            commands => self.sink.dispatch_many(commands),
        };

        match &result {
            Ok(()) => {
                self.metrics.record_batch(batch.len());
                log_batch_dispatch(&self.name, batch.len(), forced, "dispatched");
            }
            Err(_) => {
                self.metrics.record_failure();
                error!(
                    batcher = %self.name,
                    batch_len = batch.len(),
                    forced = forced,
                    "🔴 Sink dispatch failed"
                );
            }
        }

        result
    }
}

impl<C, S> Batcher<C> for SimpleBatcher<C, S>
where
    S: Sink<C>,
{
    type Error = DispatchError<C, S::Error>;

    fn batch(
        &self,
        command: C,
        batching: Option<CommandBatching>,
    ) -> std::result::Result<BatchTasks<C>, Self::Error> {
        self.submit(command, batching)
    }

    fn flush(&self) -> std::result::Result<BatchTasks<C>, Self::Error> {
        SimpleBatcher::flush(self)
    }
}

impl<C, S> Drop for SimpleBatcher<C, S> {
    fn drop(&mut self) {
        let stranded = self.queue.len();
        if stranded > 0 {
            debug!(batcher = %self.name, stranded = stranded, "Batcher dropped with commands still queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use std::cell::Cell;
    use std::fmt;

    #[derive(Debug, PartialEq, Eq)]
    struct Rejected;

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "rejected")
        }
    }

    impl std::error::Error for Rejected {}

    /// Fails the first `failures` dispatches, then accepts everything
    struct FlakySink {
        failures: Cell<usize>,
        delivered: CollectingSink<u32>,
    }

    impl FlakySink {
        fn failing(failures: usize) -> Self {
            Self {
                failures: Cell::new(failures),
                delivered: CollectingSink::new(),
            }
        }

        fn check(&self) -> std::result::Result<(), Rejected> {
            let remaining = self.failures.get();
            if remaining > 0 {
                self.failures.set(remaining - 1);
                return Err(Rejected);
            }
            Ok(())
        }
    }

    impl Sink<u32> for FlakySink {
        type Error = Rejected;

        fn dispatch_one(&self, command: &u32) -> std::result::Result<(), Rejected> {
            self.check()?;
            self.delivered.dispatch_one(command).map_err(|e| match e {})
        }

        fn dispatch_many(&self, commands: &[u32]) -> std::result::Result<(), Rejected> {
            self.check()?;
            self.delivered.dispatch_many(commands).map_err(|e| match e {})
        }
    }

    fn batcher(batch_size: i64) -> SimpleBatcher<u32, CollectingSink<u32>> {
        SimpleBatcher::with_batch_size(CollectingSink::new(), batch_size).unwrap()
    }

    #[test]
    fn test_rejects_invalid_batch_sizes() {
        for size in [0, 1, -2] {
            assert!(SimpleBatcher::<u32, _>::with_batch_size(CollectingSink::new(), size).is_err());
        }
        assert!(SimpleBatcher::<u32, _>::with_batch_size(CollectingSink::new(), -1).is_ok());
    }

    #[test]
    fn test_queue_directive_never_flushes() {
        let batcher = batcher(2);

        for i in 0..5 {
            assert!(batcher.submit(i, Some(CommandBatching::Queue)).unwrap().is_empty());
        }

        assert_eq!(batcher.pending(), 5);
        assert_eq!(batcher.sink().batch_count(), 0);
    }

    #[test]
    fn test_default_submission_below_threshold_does_not_dispatch() {
        let batcher = batcher(3);

        assert!(batcher.submit_default(1).unwrap().is_empty());
        assert!(batcher.submit_default(2).unwrap().is_empty());
        assert_eq!(batcher.sink().batch_count(), 0);

        let dispatched = batcher.submit_default(3).unwrap();
        assert_eq!(dispatched.into_vec(), vec![1, 2, 3]);
        assert_eq!(batcher.sink().batches(), vec![vec![1, 2, 3]]);
        assert_eq!(batcher.pending(), 0);
    }

    #[test]
    fn test_default_flush_drains_whole_batches_while_more_than_a_batch_remains() {
        let batcher = batcher(2);

        for i in 0..6 {
            batcher.enqueue(i);
        }

        // Seven queued: loops while more than two remain after each drain
        let dispatched = batcher.submit_default(6).unwrap();

        assert_eq!(dispatched.into_vec(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(batcher.sink().batches(), vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
        assert_eq!(batcher.pending(), 1);
    }

    #[test]
    fn test_default_flush_stops_when_exactly_one_batch_remains() {
        let batcher = batcher(2);

        for i in 0..3 {
            batcher.enqueue(i);
        }

        let dispatched = batcher.submit_default(3).unwrap();

        assert_eq!(dispatched.into_vec(), vec![0, 1]);
        assert_eq!(batcher.pending(), 2);
    }

    #[test]
    fn test_forced_flush_drains_everything_in_one_batch() {
        let batcher = batcher(10);

        batcher.enqueue(1);
        batcher.enqueue(2);
        let dispatched = batcher.submit_and_flush(3).unwrap();

        assert_eq!(dispatched.into_vec(), vec![1, 2, 3]);
        assert_eq!(batcher.sink().batches(), vec![vec![1, 2, 3]]);
        assert_eq!(batcher.sink().multi_dispatches(), 1);
    }

    #[test]
    fn test_single_command_uses_single_dispatch_form() {
        let batcher = batcher(-1);

        let dispatched = batcher.submit_and_flush(42).unwrap();

        assert_eq!(dispatched.into_vec(), vec![42]);
        assert_eq!(batcher.sink().single_dispatches(), 1);
        assert_eq!(batcher.sink().multi_dispatches(), 0);
    }

    #[test]
    fn test_flush_on_empty_queue_is_noop() {
        let batcher = batcher(4);

        assert!(batcher.flush().unwrap().is_empty());
        assert_eq!(batcher.sink().batch_count(), 0);
        assert!(!batcher.is_flushing());
    }

    #[test]
    fn test_unbounded_never_flushes_by_size() {
        let batcher = batcher(-1);

        for i in 0..1_000 {
            assert!(batcher.submit_default(i).unwrap().is_empty());
        }
        assert_eq!(batcher.sink().batch_count(), 0);

        let dispatched = batcher.flush().unwrap();
        assert_eq!(dispatched.len(), 1_000);
        assert_eq!(batcher.sink().batch_count(), 1);
    }

    #[test]
    fn test_loser_returns_empty_and_records_forced_request() {
        let batcher = batcher(4);
        batcher.enqueue(1);

        // Simulate another thread mid-flush
        let permit = batcher.try_acquire().unwrap();
        assert!(batcher.is_flushing());

        assert!(batcher.flush().unwrap().is_empty());
        assert!(batcher.force_flush_requested.load(Ordering::SeqCst));
        assert_eq!(batcher.sink().batch_count(), 0);

        drop(permit);

        // Below the threshold the default path does not even try to flush
        let dispatched = batcher.submit_default(2).unwrap();
        assert!(dispatched.is_empty());

        // The next default pass drains one batch, then honors the recorded request

        batcher.enqueue(3);
        batcher.enqueue(4);
        let dispatched = batcher.submit_default(5).unwrap();
        assert_eq!(dispatched.into_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(batcher.sink().batches(), vec![vec![1, 2, 3, 4], vec![5]]);
        assert!(!batcher.force_flush_requested.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_loser_does_not_record_request() {
        let batcher = batcher(2);
        let _permit = batcher.try_acquire().unwrap();

        batcher.enqueue(1);
        assert!(batcher.submit_default(2).unwrap().is_empty());
        assert!(!batcher.force_flush_requested.load(Ordering::SeqCst));

        let metrics = batcher.metrics();
        assert_eq!(metrics.contended_attempts, 1);
        assert_eq!(metrics.force_requests_recorded, 0);
    }

    #[test]
    fn test_dispatch_error_releases_flag_and_returns_batch() {
        let batcher = SimpleBatcher::with_batch_size(FlakySink::failing(1), 3).unwrap();

        batcher.enqueue(1);
        batcher.enqueue(2);
        let err = batcher.flush().unwrap_err();

        assert_eq!(err.failed, vec![1, 2]);
        assert!(err.dispatched.is_empty());
        assert_eq!(err.into_source(), Rejected);
        assert!(!batcher.is_flushing());
        assert_eq!(batcher.metrics().dispatch_failures, 1);

        // Not retried: the rejected batch left the queue
        batcher.enqueue(3);
        let dispatched = batcher.flush().unwrap();
        assert_eq!(dispatched.into_vec(), vec![3]);
        assert_eq!(batcher.sink().delivered.commands(), vec![3]);
    }

    #[test]
    fn test_dispatch_error_keeps_earlier_passes() {
        let batcher = SimpleBatcher::with_batch_size(FailAfter::new(1), 2).unwrap();
        for i in 0..6 {
            batcher.enqueue(i);
        }

        // First pass succeeds, the looped second pass is rejected
        let err = batcher.submit_default(6).unwrap_err();

        assert_eq!(err.dispatched, vec![0, 1]);
        assert_eq!(err.failed, vec![2, 3]);
        assert!(!batcher.is_flushing());
        assert_eq!(batcher.pending(), 3);
    }

    /// Accepts the first `successes` dispatches, then fails
    struct FailAfter {
        successes: Cell<usize>,
    }

    impl FailAfter {
        fn new(successes: usize) -> Self {
            Self {
                successes: Cell::new(successes),
            }
        }

        fn check(&self) -> std::result::Result<(), Rejected> {
            match self.successes.get() {
                0 => Err(Rejected),
                n => {
                    self.successes.set(n - 1);
                    Ok(())
                }
            }
        }
    }

    impl Sink<u32> for FailAfter {
        type Error = Rejected;

        fn dispatch_one(&self, _command: &u32) -> std::result::Result<(), Rejected> {
            self.check()
        }

        fn dispatch_many(&self, _commands: &[u32]) -> std::result::Result<(), Rejected> {
            self.check()
        }
    }

    #[test]
    fn test_sink_panic_releases_flag() {
        struct PanickingSink;

        impl Sink<u32> for PanickingSink {
            type Error = Rejected;

            fn dispatch_one(&self, _command: &u32) -> std::result::Result<(), Rejected> {
                panic!("sink exploded");
            }

            fn dispatch_many(&self, _commands: &[u32]) -> std::result::Result<(), Rejected> {
                panic!("sink exploded");
            }
        }

        let batcher = SimpleBatcher::with_batch_size(PanickingSink, 2).unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batcher.submit_and_flush(1)
        }));

        assert!(outcome.is_err());
        assert!(!batcher.is_flushing());
    }

    #[test]
    fn test_metrics_track_dispatches() {
        let batcher = batcher(2);

        batcher.submit_default(1).unwrap();
        batcher.submit_default(2).unwrap();
        batcher.submit_and_flush(3).unwrap();

        let metrics = batcher.metrics();
        assert_eq!(metrics.commands_submitted, 3);
        assert_eq!(metrics.batches_dispatched, 2);
        assert_eq!(metrics.commands_dispatched, 3);
        assert_eq!(metrics.single_dispatches, 1);
        assert_eq!(metrics.largest_batch, 2);
    }

    #[test]
    fn test_named_batcher_reports_its_name() {
        let batcher = SimpleBatcher::<u32, _>::named("orders", CollectingSink::new(), BatchSize::Bounded(2));

        assert_eq!(batcher.name(), "orders");
        assert_eq!(batcher.batch_size(), BatchSize::Bounded(2));
    }

    #[test]
    fn test_forced_loser_retry_drains_when_flusher_already_finished() {
        let batcher = batcher(-1);
        let stop = AtomicBool::new(false);
        let mut last = 0;

        // Another thread keeps taking and releasing the flag, so a forced
        // flush can lose its first attempt and win the retry right after.
        let retry_won = std::thread::scope(|scope| {
            scope.spawn(|| {
                while !stop.load(Ordering::SeqCst) {
                    if let Some(permit) = batcher.try_acquire() {
                        std::hint::spin_loop();
                        drop(permit);
                    }
                }
            });

            let mut retry_won = false;
            for i in 0..100_000 {
                last = i;
                batcher.enqueue(i);

                let requests_before = batcher.metrics().force_requests_recorded;
                let dispatched = batcher.flush().unwrap();
                let requested = batcher.metrics().force_requests_recorded > requests_before;

                if requested && !dispatched.is_empty() {
                    assert_eq!(dispatched.as_slice().last(), Some(&i));
                    retry_won = true;
                    break;
                }
            }

            stop.store(true, Ordering::SeqCst);
            retry_won
        });

        assert!(retry_won, "forced flush never won its retry after recording a request");

        batcher.flush().unwrap();
        assert_eq!(batcher.sink().commands(), (0..=last).collect::<Vec<_>>());
        assert_eq!(batcher.pending(), 0);
        assert!(!batcher.is_flushing());
    }
}
