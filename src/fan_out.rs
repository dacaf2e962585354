//! # Fan-Out / Fan-In
//!
//! Runs a bounded pool of [`Merger`]s over one input channel, gathers their
//! partial sums on a shared channel and reduces those with one final merger.
//!
//! ```text
//!                  ┌─ worker-0 ─┐
//! input channel ───┼─ worker-1 ─┼── partial channel ── final ── result channel (capacity 1)
//!                  └─ worker-N ─┘
//! ```
//!
//! The partial channel has many writers, so no merger may close it. A barrier
//! task joins every worker and only then closes it. The join happens-after each
//! worker's last send, which is what lets the final merger treat "closed" as
//! "no more partial sums will ever arrive".

use crate::merger::{MergeOutcome, Merger};
use crate::record::{Countable, PartialSum};
use async_channel::{Receiver, Sender};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Per-run accounting of the fan-out stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
  /// Workers that sent a partial sum. Never exceeds the worker count.
  pub partials_emitted: usize,
  /// Workers that stopped because of cancellation.
  pub workers_cancelled: usize,
  /// Workers that panicked or found no receiver for their sum.
  pub workers_failed: usize,
  /// Outcome of the final merger; `None` if its task panicked.
  pub final_outcome: Option<MergeOutcome>,
}

/// Handle to a started fan-out.
#[derive(Debug)]
pub struct FanOut {
  results: Receiver<PartialSum>,
  barrier: JoinHandle<FanOutReport>,
  final_merge: JoinHandle<MergeOutcome>,
}

impl FanOut {
  /// The single-slot channel carrying the final partial sum.
  ///
  /// It is closed once the final merger returns, so a receive after a
  /// cancelled run ends instead of waiting forever.
  pub fn results(&self) -> &Receiver<PartialSum> {
    &self.results
  }

  /// Waits for every task of the fan-out and reports how each ended.
  pub async fn join(self) -> FanOutReport {
    let mut report = match self.barrier.await {
      Ok(report) => report,
      Err(e) => {
        error!(error = %e, "fan-out barrier task failed");
        FanOutReport::default()
      }
    };
    report.final_outcome = match self.final_merge.await {
      Ok(outcome) => Some(outcome),
      Err(e) => {
        error!(error = %e, "final merge task failed");
        None
      }
    };
    report
  }
}

/// Starts bounded worker pools of mergers over a channel.
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
  workers: usize,
  channel_capacity: usize,
  cancel: CancellationToken,
}

impl FanOutCoordinator {
  /// Creates a coordinator for `workers` partial mergers.
  ///
  /// Both `workers` and `channel_capacity` are raised to at least one.
  pub fn new(workers: usize, channel_capacity: usize, cancel: CancellationToken) -> Self {
    Self {
      workers: workers.max(1),
      channel_capacity: channel_capacity.max(1),
      cancel,
    }
  }

  /// Number of partial mergers this coordinator starts.
  pub fn workers(&self) -> usize {
    self.workers
  }

  /// Spawns the worker pool over `input`, the closing barrier and the final
  /// merger. Must be called from within a Tokio runtime.
  pub fn start<T>(&self, input: Receiver<T>) -> FanOut
  where
    T: Countable,
  {
    let (partial_tx, partial_rx) = async_channel::bounded::<PartialSum>(self.channel_capacity);

    let mut workers = JoinSet::new();
    for worker in 0..self.workers {
      let merger = Merger::new(format!("worker-{worker}"), self.cancel.clone());
      let input = input.clone();
      let output = partial_tx.clone();
      workers.spawn(async move { merger.run(&input, &output).await });
    }
    drop(input);
    debug!(workers = self.workers, "started partial mergers");

    let barrier = tokio::spawn(close_after_workers(workers, partial_tx));

    let (final_tx, final_rx) = async_channel::bounded::<PartialSum>(1);
    let final_merger = Merger::new("final", self.cancel.clone());
    let final_merge = tokio::spawn(async move {
      let outcome = final_merger.run(&partial_rx, &final_tx).await;
      final_tx.close();
      outcome
    });

    FanOut {
      results: final_rx,
      barrier,
      final_merge,
    }
  }
}

/// Joins every worker, then closes the shared partial-sum channel exactly once.
async fn close_after_workers(
  mut workers: JoinSet<MergeOutcome>,
  partials: Sender<PartialSum>,
) -> FanOutReport {
  let mut report = FanOutReport::default();
  while let Some(joined) = workers.join_next().await {
    match joined {
      Ok(MergeOutcome::Emitted { .. }) => report.partials_emitted += 1,
      Ok(MergeOutcome::Cancelled) => report.workers_cancelled += 1,
      Ok(MergeOutcome::Abandoned) => report.workers_failed += 1,
      Err(e) => {
        error!(error = %e, "partial merger task failed");
        report.workers_failed += 1;
      }
    }
  }
  partials.close();
  debug!(
    emitted = report.partials_emitted,
    cancelled = report.workers_cancelled,
    failed = report.workers_failed,
    "all partial mergers finished, partial channel closed"
  );
  report
}
