//! # Fan-Out Test Suite
//!
//! Assertions are on aggregates and counts only. Which worker folded which
//! increment is scheduling-dependent and never checked.

use crate::fan_out::FanOutCoordinator;
use crate::merger::MergeOutcome;
use crate::record::Increment;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn feed(keys: &[&str], capacity: usize) -> async_channel::Receiver<Increment> {
  let (tx, rx) = async_channel::bounded(capacity);
  let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
  tokio::spawn(async move {
    for key in keys {
      if tx.send(Increment::new(&key)).await.is_err() {
        break;
      }
    }
    tx.close();
  });
  rx
}

#[tokio::test]
async fn test_final_sum_is_correct() {
  let keys = ["High", "Critical", "High", "Low", "Critical", "Critical"];
  let coordinator = FanOutCoordinator::new(4, 1, CancellationToken::new());
  let fan_out = coordinator.start(feed(&keys, 1).await);

  let sum = fan_out.results().recv().await.unwrap();
  assert_eq!(sum.get("Critical"), 3);
  assert_eq!(sum.get("High"), 2);
  assert_eq!(sum.get("Low"), 1);
  assert_eq!(sum.total(), 6);

  let results = fan_out.results().clone();
  let report = fan_out.join().await;
  assert!(report.partials_emitted <= 4);
  assert_eq!(report.workers_cancelled, 0);
  assert_eq!(report.workers_failed, 0);
  assert_eq!(report.final_outcome, Some(MergeOutcome::Emitted { keys: 3, total: 6 }));
  assert!(results.is_closed());
  assert!(results.try_recv().is_err());
}

#[tokio::test]
async fn test_every_worker_emits_when_input_is_empty() {
  let coordinator = FanOutCoordinator::new(5, 1, CancellationToken::new());
  let fan_out = coordinator.start(feed(&[], 1).await);

  let sum = fan_out.results().recv().await.unwrap();
  assert!(sum.is_empty());

  let report = fan_out.join().await;
  assert_eq!(report.partials_emitted, 5);
  assert_eq!(report.final_outcome, Some(MergeOutcome::Emitted { keys: 0, total: 0 }));
}

#[tokio::test]
async fn test_worker_count_is_clamped() {
  let coordinator = FanOutCoordinator::new(0, 0, CancellationToken::new());
  assert_eq!(coordinator.workers(), 1);

  let fan_out = coordinator.start(feed(&["Low", "Low"], 1).await);
  assert_eq!(fan_out.results().recv().await.unwrap().get("Low"), 2);
  assert_eq!(fan_out.join().await.partials_emitted, 1);
}

#[tokio::test]
async fn test_result_is_independent_of_worker_count() {
  let keys: Vec<&str> = (0..200)
    .map(|i| ["High", "Low", "Critical", "Moderate"][i % 4])
    .collect();
  for workers in [1, 2, 7, 32] {
    let coordinator = FanOutCoordinator::new(workers, 1, CancellationToken::new());
    let fan_out = coordinator.start(feed(&keys, 1).await);
    let sum = fan_out.results().recv().await.unwrap();
    for key in ["High", "Low", "Critical", "Moderate"] {
      assert_eq!(sum.get(key), 50, "workers {workers}, key {key}");
    }
    fan_out.join().await;
  }
}

#[tokio::test]
async fn test_cancelled_fan_out_yields_no_result() {
  let cancel = CancellationToken::new();
  let (tx, rx) = async_channel::bounded::<Increment>(1);
  let coordinator = FanOutCoordinator::new(3, 1, cancel.clone());
  let fan_out = coordinator.start(rx);
  tx.send(Increment::new("High")).await.unwrap();

  // The input stays open, so only cancellation can end the workers.
  cancel.cancel();
  let results = fan_out.results().clone();
  let report = tokio::time::timeout(Duration::from_secs(5), fan_out.join())
    .await
    .expect("fan-out did not unwind after cancellation");

  assert_eq!(report.partials_emitted, 0);
  assert_eq!(report.workers_cancelled, 3);
  assert_eq!(report.final_outcome, Some(MergeOutcome::Cancelled));
  assert!(results.recv().await.is_err());
  drop(tx);
}
