//! Configuration for the aggregation pipeline and the incident fetcher.
//!
//! Both configs follow the same shape: `Default` carries the production values,
//! `with_*` methods adjust single fields, and serde support with
//! `#[serde(default)]` lets either be embedded in a larger config document.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of partial-merge workers.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Default capacity of the pipeline's internal channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Parallelism of the partial-merge stage.
  pub worker_count: usize,
  /// Capacity of the increment and partial-sum channels.
  ///
  /// `1` keeps every stage in near lock-step with its consumer.
  pub channel_capacity: usize,
  /// Optional name for identifying this pipeline in logs.
  pub name: Option<String>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      worker_count: DEFAULT_WORKER_COUNT,
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
      name: None,
    }
  }
}

impl PipelineConfig {
  /// Sets the number of partial-merge workers.
  #[must_use]
  pub fn with_worker_count(mut self, worker_count: usize) -> Self {
    self.worker_count = worker_count;
    self
  }

  /// Sets the capacity of the internal channels.
  #[must_use]
  pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
    self.channel_capacity = channel_capacity;
    self
  }

  /// Sets the name used in log output.
  #[must_use]
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Checks that this configuration can drive a pipeline.
  ///
  /// # Errors
  ///
  /// Returns [`PipelineError::InvalidConfig`] for a zero worker count or a
  /// zero channel capacity.
  pub fn validate(&self) -> Result<(), PipelineError> {
    if self.worker_count == 0 {
      return Err(PipelineError::InvalidConfig(
        "worker_count must be >= 1".to_string(),
      ));
    }
    if self.channel_capacity == 0 {
      return Err(PipelineError::InvalidConfig(
        "channel_capacity must be >= 1".to_string(),
      ));
    }
    Ok(())
  }
}

/// Accepted range for a response's `Content-Length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLengthBounds {
  /// Expected body length in bytes.
  pub expected: u64,
  /// Accepted deviation in either direction.
  pub tolerance: u64,
}

impl ContentLengthBounds {
  /// Returns `true` when `length` lies within `expected +/- tolerance`.
  pub fn contains(&self, length: u64) -> bool {
    let low = self.expected.saturating_sub(self.tolerance);
    let high = self.expected.saturating_add(self.tolerance);
    (low..=high).contains(&length)
  }
}

impl Default for ContentLengthBounds {
  fn default() -> Self {
    Self {
      expected: 900,
      tolerance: 100,
    }
  }
}

/// Configuration for [`fetch_incidents`](crate::fetch::fetch_incidents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  /// Timeout for a single attempt, covering connect and response headers.
  pub request_timeout: Duration,
  /// Total number of attempts, including the first.
  pub attempts: u32,
  /// Pause between failed attempts.
  pub retry_backoff: Duration,
  /// Range the `Content-Length` header must fall in, when present.
  /// `None` disables the check.
  pub content_length: Option<ContentLengthBounds>,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      request_timeout: Duration::from_secs(2),
      attempts: 5,
      retry_backoff: Duration::ZERO,
      content_length: Some(ContentLengthBounds::default()),
    }
  }
}

impl FetchConfig {
  /// Sets the per-attempt timeout.
  #[must_use]
  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout = timeout;
    self
  }

  /// Sets the total number of attempts. Values below one are treated as one.
  #[must_use]
  pub fn with_attempts(mut self, attempts: u32) -> Self {
    self.attempts = attempts.max(1);
    self
  }

  /// Sets the pause between failed attempts.
  #[must_use]
  pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
    self.retry_backoff = backoff;
    self
  }

  /// Sets or clears the `Content-Length` check.
  #[must_use]
  pub fn with_content_length(mut self, bounds: Option<ContentLengthBounds>) -> Self {
    self.content_length = bounds;
    self
  }
}
