//! # Error Types
//!
//! - [`PipelineError`]: the aggregation core. Cancellation is its only runtime
//!   failure; everything else is rejected when the pipeline is built.
//! - [`FetchError`] and [`ValidationError`]: retrieving and checking the
//!   incident document before it reaches the core.
//!
//! A cancelled run never yields a partial aggregate, so callers can treat
//! [`PipelineError::Cancelled`] as "no result" rather than "zero of every key".

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Error type for pipeline construction and execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
  /// The run was cancelled before the final aggregate was read.
  #[error("pipeline run was cancelled before the aggregate was complete")]
  Cancelled,
  /// The configuration cannot drive a pipeline.
  #[error("invalid pipeline configuration: {0}")]
  InvalidConfig(String),
}

/// Reasons a response is rejected before its body is parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  /// Anything but `200 OK`.
  #[error("received {0} status code")]
  Status(StatusCode),
  /// The response carries no `Content-Type` header.
  #[error("response has no content type")]
  MissingContentType,
  /// The media type is not `application/json`.
  #[error("content type is not application/json, received {0}")]
  ContentType(String),
  /// `Content-Length` is unparsable or outside the accepted range.
  #[error("content length {actual} outside {expected} +/- {tolerance}")]
  ContentLength {
    /// Header value as received.
    actual: String,
    /// Expected body length.
    expected: u64,
    /// Accepted deviation from `expected`.
    tolerance: u64,
  },
}

/// Error type for retrieving an incident report.
#[derive(Error, Debug)]
pub enum FetchError {
  /// The URL could not be parsed.
  #[error("invalid url {url}: {source}")]
  InvalidUrl {
    /// URL as supplied.
    url: String,
    /// Parse failure.
    #[source]
    source: http::uri::InvalidUri,
  },
  /// Every attempt failed at the transport level; carries the last failure.
  #[error("request failed after {attempts} attempt(s): {source}")]
  Request {
    /// Number of attempts made.
    attempts: u32,
    /// Last transport error.
    #[source]
    source: hyper_util::client::legacy::Error,
  },
  /// Every attempt timed out.
  #[error("request timed out after {attempts} attempt(s) of {timeout:?}")]
  Timeout {
    /// Number of attempts made.
    attempts: u32,
    /// Per-attempt timeout.
    timeout: Duration,
  },
  /// The body could not be read.
  #[error("failed to read response body: {0}")]
  Body(#[from] hyper::Error),
  /// The response failed validation.
  #[error("invalid response: {0}")]
  Validation(#[from] ValidationError),
  /// The body is not a valid incident report.
  #[error("failed to parse incident report: {0}")]
  Parse(#[from] serde_json::Error),
}
