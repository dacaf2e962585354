//! # Merger
//!
//! A pure reduction unit. A merger drains one channel of [`Countable`] values
//! (increments or other mergers' partial sums) into a single [`PartialSum`] and
//! sends that sum exactly once when its input is exhausted.
//!
//! Because folding is associative, mergers compose into trees: the fan-out
//! stage runs several over the emitter's channel and one more over their
//! combined output.
//!
//! ## Channel ownership
//!
//! A merger only borrows its channels. It never closes its input (that is the
//! producer's job) and never closes its output, which may be shared with other
//! mergers writing concurrently (that is the orchestrator's job).
//!
//! ## Cancellation
//!
//! Every receive and the final send race the token. A cancelled merger sends
//! nothing.

use crate::record::{Countable, PartialSum};
use async_channel::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How a [`Merger::run`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
  /// The partial sum was sent.
  Emitted {
    /// Distinct keys in the sent sum.
    keys: usize,
    /// Sum of all counts in the sent sum.
    total: u64,
  },
  /// The token fired before the sum was sent; nothing was sent.
  Cancelled,
  /// Every output receiver was gone; the sum was dropped.
  Abandoned,
}

impl MergeOutcome {
  /// Returns `true` if a partial sum reached the output channel.
  pub fn is_emitted(&self) -> bool {
    matches!(self, MergeOutcome::Emitted { .. })
  }
}

/// Reduction stage folding a channel of counts into one [`PartialSum`].
#[derive(Debug, Clone)]
pub struct Merger {
  name: String,
  cancel: CancellationToken,
}

impl Merger {
  /// Creates a merger bound to `cancel`. `name` only appears in logs.
  pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
    Self {
      name: name.into(),
      cancel,
    }
  }

  /// Returns the merger's name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Folds `input` until it is closed and drained, then sends one partial sum
  /// to `output`.
  ///
  /// An input that is closed without ever carrying a value still produces one
  /// empty partial sum, so consumers waiting for one sum per merger stay
  /// correct.
  pub async fn run<T>(self, input: &Receiver<T>, output: &Sender<PartialSum>) -> MergeOutcome
  where
    T: Countable,
  {
    let mut sum = PartialSum::new();
    let mut received = 0usize;

    loop {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {
          debug!(merger = %self.name, received, "merge cancelled while receiving");
          return MergeOutcome::Cancelled;
        }
        item = input.recv() => match item {
          Ok(item) => {
            item.fold_into(&mut sum);
            received += 1;
            trace!(merger = %self.name, received, "folded item");
          }
          Err(_) => break,
        }
      }
    }

    let keys = sum.len();
    let total = sum.total();
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => {
        debug!(merger = %self.name, received, "merge cancelled before emitting");
        MergeOutcome::Cancelled
      }
      sent = output.send(sum) => match sent {
        Ok(()) => {
          debug!(merger = %self.name, received, keys, total, "partial sum emitted");
          MergeOutcome::Emitted { keys, total }
        }
        Err(_) => {
          warn!(merger = %self.name, keys, total, "no receiver left for partial sum");
          MergeOutcome::Abandoned
        }
      }
    }
  }
}
