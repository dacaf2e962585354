//! # Emitter
//!
//! The source stage of the aggregation pipeline. The emitter turns a borrowed
//! slice of records into a lazy stream of [`Increment`]s, one per record and in
//! record order, and pumps that stream into a bounded channel.
//!
//! ## Cancellation
//!
//! The increment stream ends as soon as the token is cancelled, and every send
//! races the token, so a blocked send unwinds on the next poll after the signal.
//! Whatever the reason emission stops, the emitter closes its channel before
//! returning so downstream mergers always observe end-of-stream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use incidentweave::emitter::Emitter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let records = vec!["High".to_string(), "Low".to_string()];
//! let (tx, rx) = async_channel::bounded(1);
//! let emitter = Emitter::new(CancellationToken::new());
//! tokio::spawn(async move { while rx.recv().await.is_ok() {} });
//! let summary = emitter.emit(&records, tx).await;
//! assert_eq!(summary.emitted, 2);
//! # }
//! ```

use crate::record::{Increment, Keyed};
use async_channel::Sender;
use async_stream::stream;
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// What an [`Emitter::emit`] call managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
  /// Increments accepted by the channel.
  pub emitted: usize,
  /// Emission stopped because the token was cancelled.
  pub cancelled: bool,
}

/// Source stage producing one [`Increment`] per record.
#[derive(Debug, Clone)]
pub struct Emitter {
  cancel: CancellationToken,
}

impl Emitter {
  /// Creates an emitter bound to `cancel`.
  pub fn new(cancel: CancellationToken) -> Self {
    Self { cancel }
  }

  /// Returns a lazy stream of increments over `records`.
  ///
  /// The stream is finite and single-pass. It yields in record order and
  /// ends early once the token is cancelled.
  pub fn increments<'a, R>(&self, records: &'a [R]) -> impl Stream<Item = Increment> + Send + 'a
  where
    R: Keyed + Sync,
  {
    let cancel = self.cancel.clone();
    stream! {
      for record in records {
        if cancel.is_cancelled() {
          break;
        }
        yield Increment::for_record(record);
      }
    }
  }

  /// Sends one increment per record into `output`, then closes it.
  ///
  /// Stops early when the token is cancelled or when every receiver is gone.
  pub async fn emit<R>(&self, records: &[R], output: Sender<Increment>) -> EmitSummary
  where
    R: Keyed + Sync,
  {
    let increments = self.increments(records);
    tokio::pin!(increments);

    let mut summary = EmitSummary::default();
    while let Some(increment) = increments.next().await {
      trace!(key = increment.key(), "emitting increment");
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {
          summary.cancelled = true;
          break;
        }
        sent = output.send(increment) => {
          if sent.is_err() {
            debug!("all increment receivers dropped, stopping emission");
            break;
          }
          summary.emitted += 1;
        }
      }
    }

    // The stream itself ends early on cancellation without telling us why.
    if summary.emitted < records.len() && self.cancel.is_cancelled() {
      summary.cancelled = true;
    }

    output.close();
    debug!(
      emitted = summary.emitted,
      records = records.len(),
      cancelled = summary.cancelled,
      "emitter finished"
    );
    summary
  }
}
