//! # Aggregation Pipeline
//!
//! Wires the three stages together and owns the cancellation token of a run:
//!
//! ```text
//! records ─ Emitter ─ increments ─ FanOutCoordinator (W × Merger ─ final Merger) ─ AggregateResult
//! ```
//!
//! ## Cancellation
//!
//! Each run derives a child token from the pipeline's token. Cancelling the
//! pipeline's token (caller abort, caller-level deadline) stops every stage of
//! a run in progress, and the child token is cancelled whenever `run` returns so
//! no stage outlives it. A cancelled run returns [`PipelineError::Cancelled`],
//! never a partial aggregate. If the final sum is already available when the
//! signal arrives, it is still returned.
//!
//! ## Run States
//!
//! `Idle → Emitting → Draining → Done`, with `Cancelled` reachable from any
//! non-terminal state. See [`PipelineState`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use incidentweave::config::PipelineConfig;
//! use incidentweave::pipeline::Pipeline;
//!
//! # async fn example() -> Result<(), incidentweave::error::PipelineError> {
//! let priorities = vec!["High".to_string(), "Low".to_string(), "High".to_string()];
//! let pipeline = Pipeline::new(PipelineConfig::default().with_worker_count(4))?;
//! let aggregate = pipeline.run(&priorities).await?;
//! assert_eq!(aggregate.count("High"), Some(2));
//! # Ok(())
//! # }
//! ```

use crate::config::PipelineConfig;
use crate::emitter::Emitter;
use crate::error::PipelineError;
use crate::fan_out::FanOutCoordinator;
use crate::record::{Keyed, PartialSum};
use async_channel::Receiver;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
  /// No run has started.
  Idle = 0,
  /// Records are being emitted and merged.
  Emitting = 1,
  /// Emission finished; waiting for the final merge.
  Draining = 2,
  /// The aggregate was produced.
  Done = 3,
  /// The run was cancelled; it produced no result.
  Cancelled = 4,
}

impl PipelineState {
  fn from_u8(value: u8) -> Self {
    match value {
      1 => PipelineState::Emitting,
      2 => PipelineState::Draining,
      3 => PipelineState::Done,
      4 => PipelineState::Cancelled,
      _ => PipelineState::Idle,
    }
  }

  /// Returns `true` for `Done` and `Cancelled`.
  pub fn is_terminal(&self) -> bool {
    matches!(self, PipelineState::Done | PipelineState::Cancelled)
  }
}

/// Final output of a run: `(key, count)` pairs.
///
/// Entry order follows the final partial sum and is not stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
  entries: Vec<(String, u64)>,
}

impl AggregateResult {
  /// The `(key, count)` pairs.
  pub fn entries(&self) -> &[(String, u64)] {
    &self.entries
  }

  /// Consumes the result, returning its pairs.
  pub fn into_entries(self) -> Vec<(String, u64)> {
    self.entries
  }

  /// Count for `key`, if it occurred at all.
  pub fn count(&self, key: &str) -> Option<u64> {
    self
      .entries
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, count)| *count)
  }

  /// Sum of all counts.
  pub fn total(&self) -> u64 {
    self.entries.iter().map(|(_, count)| count).sum()
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when no record was aggregated.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Iterates over `(key, count)` pairs.
  pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
    self.entries.iter().map(|(key, count)| (key.as_str(), *count))
  }
}

impl From<PartialSum> for AggregateResult {
  fn from(sum: PartialSum) -> Self {
    Self {
      entries: sum.into_iter().collect(),
    }
  }
}

/// Emitter → W × Merger → final Merger, under one cancellation token.
#[derive(Debug)]
pub struct Pipeline {
  config: PipelineConfig,
  cancel: CancellationToken,
  state: AtomicU8,
}

impl Pipeline {
  /// Creates a pipeline with its own cancellation token.
  ///
  /// # Errors
  ///
  /// Returns [`PipelineError::InvalidConfig`] if `config` does not validate.
  pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
    config.validate()?;
    Ok(Self {
      config,
      cancel: CancellationToken::new(),
      state: AtomicU8::new(PipelineState::Idle as u8),
    })
  }

  /// Links every future run to `cancel`. Cancelling it aborts the run in
  /// progress and every later run.
  #[must_use]
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// The token that cancels this pipeline's runs.
  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// The pipeline's configuration.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// State of the most recent run.
  pub fn state(&self) -> PipelineState {
    PipelineState::from_u8(self.state.load(Ordering::Acquire))
  }

  fn set_state(&self, state: PipelineState) {
    self.state.store(state as u8, Ordering::Release);
  }

  fn name(&self) -> &str {
    self.config.name.as_deref().unwrap_or("pipeline")
  }

  /// Aggregates `records` by key.
  ///
  /// # Errors
  ///
  /// Returns [`PipelineError::Cancelled`] if the pipeline's token fired before
  /// the final aggregate could be read.
  pub async fn run<R>(&self, records: &[R]) -> Result<AggregateResult, PipelineError>
  where
    R: Keyed + Sync,
  {
    let run_token = self.cancel.child_token();
    let _cancel_on_return = run_token.clone().drop_guard();

    self.set_state(PipelineState::Emitting);
    info!(
      pipeline = self.name(),
      records = records.len(),
      workers = self.config.worker_count,
      "starting aggregation run"
    );

    let (increments_tx, increments_rx) = async_channel::bounded(self.config.channel_capacity);
    let fan_out = FanOutCoordinator::new(
      self.config.worker_count,
      self.config.channel_capacity,
      run_token.clone(),
    )
    .start(increments_rx);
    let emitter = Emitter::new(run_token.clone());

    let emit = async {
      let summary = emitter.emit(records, increments_tx).await;
      if !summary.cancelled {
        self.set_state(PipelineState::Draining);
      }
      summary
    };
    let (summary, received) = tokio::join!(emit, receive_final(fan_out.results(), &run_token));

    match received {
      Some(sum) => {
        let report = fan_out.join().await;
        debug!(pipeline = self.name(), ?report, "fan-out finished");
        let aggregate = AggregateResult::from(sum);
        debug_assert_eq!(aggregate.total(), summary.emitted as u64);
        self.set_state(PipelineState::Done);
        info!(
          pipeline = self.name(),
          keys = aggregate.len(),
          total = aggregate.total(),
          "aggregation run finished"
        );
        Ok(aggregate)
      }
      None => {
        run_token.cancel();
        let report = fan_out.join().await;
        debug!(pipeline = self.name(), ?report, "fan-out unwound");
        self.set_state(PipelineState::Cancelled);
        warn!(
          pipeline = self.name(),
          emitted = summary.emitted,
          "aggregation run cancelled, discarding partial work"
        );
        Err(PipelineError::Cancelled)
      }
    }
  }
}

/// Reads the one final partial sum. A sum that is already waiting wins over a
/// cancellation that arrives at the same time.
pub(crate) async fn receive_final(
  results: &Receiver<PartialSum>,
  cancel: &CancellationToken,
) -> Option<PartialSum> {
  tokio::select! {
    biased;
    received = results.recv() => received.ok(),
    _ = cancel.cancelled() => None,
  }
}
