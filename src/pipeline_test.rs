//! # Pipeline Test Suite
//!
//! End-to-end runs of the wired stages: correctness across worker counts,
//! conservation of the record count, the empty input, and cancellation before
//! and during a run.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{AggregateResult, Pipeline, PipelineState, receive_final};
use crate::record::{Keyed, PartialSum, UNSPECIFIED_KEY};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn records(keys: &[&str]) -> Vec<String> {
  keys.iter().map(|key| key.to_string()).collect()
}

fn sorted(aggregate: AggregateResult) -> Vec<(String, u64)> {
  let mut entries = aggregate.into_entries();
  entries.sort();
  entries
}

fn pipeline(workers: usize) -> Pipeline {
  Pipeline::new(PipelineConfig::default().with_worker_count(workers)).unwrap()
}

#[tokio::test]
async fn test_aggregates_by_priority() {
  let input = records(&["High", "Critical", "High", "Low", "Critical", "Critical"]);
  for workers in [1, 5, 10] {
    let pipeline = pipeline(workers);
    let aggregate = pipeline.run(&input).await.unwrap();
    assert_eq!(
      sorted(aggregate),
      vec![
        ("Critical".to_string(), 3),
        ("High".to_string(), 2),
        ("Low".to_string(), 1),
      ],
      "workers {workers}"
    );
    assert_eq!(pipeline.state(), PipelineState::Done);
  }
}

#[tokio::test]
async fn test_single_record() {
  let aggregate = pipeline(10).run(&records(&["High"])).await.unwrap();
  assert_eq!(aggregate.entries(), &[("High".to_string(), 1)]);
}

#[tokio::test]
async fn test_empty_input_is_an_empty_result() {
  let pipeline = pipeline(10);
  assert_eq!(pipeline.state(), PipelineState::Idle);

  let aggregate = pipeline.run(&Vec::<String>::new()).await.unwrap();
  assert!(aggregate.is_empty());
  assert_eq!(pipeline.state(), PipelineState::Done);
}

#[tokio::test]
async fn test_blank_priorities_are_counted_as_unspecified() {
  let aggregate = pipeline(3)
    .run(&records(&["", "High", "  "]))
    .await
    .unwrap();
  assert_eq!(aggregate.count(UNSPECIFIED_KEY), Some(2));
  assert_eq!(aggregate.count("High"), Some(1));
}

#[tokio::test]
async fn test_counts_are_conserved_for_any_worker_count() {
  let keys = ["P1", "P2", "P3", "P4", "P5", "P6", "P7"];
  let input: Vec<String> = (0..1_000).map(|i| keys[(i * i) % keys.len()].to_string()).collect();

  let baseline = sorted(pipeline(1).run(&input).await.unwrap());
  assert_eq!(baseline.iter().map(|(_, count)| count).sum::<u64>(), 1_000);

  for workers in [2, 10, 64] {
    for capacity in [1, 16] {
      let config = PipelineConfig::default()
        .with_worker_count(workers)
        .with_channel_capacity(capacity);
      let aggregate = Pipeline::new(config).unwrap().run(&input).await.unwrap();
      assert_eq!(aggregate.total(), 1_000);
      assert_eq!(sorted(aggregate), baseline, "workers {workers}, capacity {capacity}");
    }
  }
}

#[tokio::test]
async fn test_pre_cancelled_token_yields_cancelled() {
  let cancel = CancellationToken::new();
  cancel.cancel();
  let pipeline = pipeline(4).with_cancellation(cancel);

  let input = records(&["High", "Low"]);
  let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&input))
    .await
    .expect("cancelled run did not return");

  assert_eq!(result, Err(PipelineError::Cancelled));
  assert_eq!(pipeline.state(), PipelineState::Cancelled);
}

/// A record that fires `cancel` the moment its key is read.
struct CancellingRecord {
  priority: String,
  cancel: Option<CancellationToken>,
}

impl Keyed for CancellingRecord {
  fn key(&self) -> &str {
    if let Some(cancel) = &self.cancel {
      cancel.cancel();
    }
    &self.priority
  }
}

#[tokio::test]
async fn test_cancel_mid_run_never_returns_a_partial_aggregate() {
  let cancel = CancellationToken::new();
  let input: Vec<CancellingRecord> = (0..1_000)
    .map(|i| CancellingRecord {
      priority: format!("P{}", i % 5),
      cancel: (i == 400).then(|| cancel.clone()),
    })
    .collect();
  let pipeline = pipeline(8).with_cancellation(cancel.clone());

  let result = tokio::time::timeout(Duration::from_secs(10), pipeline.run(&input))
    .await
    .expect("run did not unwind after cancellation");

  assert!(cancel.is_cancelled());
  assert_eq!(result, Err(PipelineError::Cancelled));
  assert_eq!(pipeline.state(), PipelineState::Cancelled);
}

#[tokio::test]
async fn test_waiting_final_sum_wins_over_cancellation() {
  let (tx, rx) = async_channel::bounded(1);
  tx.send(PartialSum::from_iter([("High", 2)])).await.unwrap();
  let cancel = CancellationToken::new();
  cancel.cancel();

  let received = receive_final(&rx, &cancel).await;
  assert_eq!(received, Some(PartialSum::from_iter([("High", 2)])));
}

#[tokio::test]
async fn test_cancellation_ends_wait_for_final_sum() {
  let (_tx, rx) = async_channel::bounded::<PartialSum>(1);
  let cancel = CancellationToken::new();
  cancel.cancel();

  let received = tokio::time::timeout(Duration::from_secs(5), receive_final(&rx, &cancel))
    .await
    .expect("final receive ignored cancellation");
  assert_eq!(received, None);
}

#[tokio::test]
async fn test_runs_over_borrowed_keys() {
  let input: [&str; 4] = ["Low", "High", "Low", ""];
  let aggregate = pipeline(2).run(&input).await.unwrap();
  assert_eq!(aggregate.count("Low"), Some(2));
  assert_eq!(aggregate.count("High"), Some(1));
  assert_eq!(aggregate.count(UNSPECIFIED_KEY), Some(1));
}

#[tokio::test]
async fn test_cancelled_token_cancels_later_runs() {
  let pipeline = pipeline(2);
  assert!(pipeline.run(&records(&["High"])).await.is_ok());

  pipeline.cancellation_token().cancel();
  assert_eq!(
    pipeline.run(&records(&["High"])).await,
    Err(PipelineError::Cancelled)
  );
}

#[tokio::test]
async fn test_runs_can_be_repeated() {
  let pipeline = pipeline(3);
  let first = sorted(pipeline.run(&records(&["Low", "Low"])).await.unwrap());
  let second = sorted(pipeline.run(&records(&["Low", "Low"])).await.unwrap());
  assert_eq!(first, second);
  assert_eq!(first, vec![("Low".to_string(), 2)]);
}

#[test]
fn test_rejects_invalid_config() {
  assert!(matches!(
    Pipeline::new(PipelineConfig::default().with_worker_count(0)),
    Err(PipelineError::InvalidConfig(_))
  ));
  assert!(matches!(
    Pipeline::new(PipelineConfig::default().with_channel_capacity(0)),
    Err(PipelineError::InvalidConfig(_))
  ));
}

#[test]
fn test_state_terminality() {
  assert!(!PipelineState::Idle.is_terminal());
  assert!(!PipelineState::Emitting.is_terminal());
  assert!(!PipelineState::Draining.is_terminal());
  assert!(PipelineState::Done.is_terminal());
  assert!(PipelineState::Cancelled.is_terminal());
}
