//! Retrieval of incident reports over HTTP.
//!
//! [`fetch_incidents`] performs a GET with a per-attempt timeout and a bounded
//! number of attempts, checks the response headers with [`validate_response`]
//! and parses the body into an [`IncidentReport`]. Failure is a single
//! [`FetchError`]; no partial report is ever returned.

use crate::config::{ContentLengthBounds, FetchConfig};
use crate::error::{FetchError, ValidationError};
use crate::incident::IncidentReport;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Response, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

/// Fetches, validates and parses the incident report at `url`.
///
/// # Errors
///
/// Any transport, validation or parse failure; see [`FetchError`].
pub async fn fetch_incidents(
  config: &FetchConfig,
  url: &str,
) -> Result<IncidentReport, FetchError> {
  let response = get_response(config, url).await?;
  validate_response(&response, config.content_length)?;
  let body = response.into_body().collect().await?.to_bytes();
  debug!(bytes = body.len(), "read response body");
  Ok(IncidentReport::from_slice(&body)?)
}

/// Issues a GET for `url`, retrying transport failures and timeouts up to
/// `config.attempts` times in total.
///
/// Any HTTP response counts as success here, whatever its status; judging the
/// response is [`validate_response`]'s job.
///
/// # Errors
///
/// [`FetchError::InvalidUrl`] immediately, or [`FetchError::Request`] /
/// [`FetchError::Timeout`] describing the last failed attempt.
pub async fn get_response(
  config: &FetchConfig,
  url: &str,
) -> Result<Response<Incoming>, FetchError> {
  let uri: Uri = url.parse().map_err(|source| FetchError::InvalidUrl {
    url: url.to_string(),
    source,
  })?;
  let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
  let attempts = config.attempts.max(1);

  let mut attempt = 0;
  loop {
    attempt += 1;
    let request = tokio::time::timeout(config.request_timeout, client.get(uri.clone()));
    let failure = match request.await {
      Ok(Ok(response)) => {
        debug!(attempt, status = %response.status(), "received response");
        return Ok(response);
      }
      Ok(Err(source)) => {
        warn!(attempt, error = %source, "request attempt failed");
        FetchError::Request { attempts: attempt, source }
      }
      Err(_) => {
        warn!(attempt, timeout = ?config.request_timeout, "request attempt timed out");
        FetchError::Timeout {
          attempts: attempt,
          timeout: config.request_timeout,
        }
      }
    };
    if attempt >= attempts {
      return Err(failure);
    }
    if !config.retry_backoff.is_zero() {
      tokio::time::sleep(config.retry_backoff).await;
    }
  }
}

/// Checks status, media type and, when `content_length` is set and the header
/// is present, the advertised body length.
///
/// # Errors
///
/// The first [`ValidationError`] found.
pub fn validate_response<B>(
  response: &Response<B>,
  content_length: Option<ContentLengthBounds>,
) -> Result<(), ValidationError> {
  if response.status() != StatusCode::OK {
    return Err(ValidationError::Status(response.status()));
  }

  let content_type = response
    .headers()
    .get(CONTENT_TYPE)
    .ok_or(ValidationError::MissingContentType)?
    .to_str()
    .map_err(|_| ValidationError::ContentType("<non-ascii>".to_string()))?;
  let media_type: mime::Mime = content_type
    .parse()
    .map_err(|_| ValidationError::ContentType(content_type.to_string()))?;
  if media_type.essence_str() != mime::APPLICATION_JSON.essence_str() {
    return Err(ValidationError::ContentType(content_type.to_string()));
  }

  if let Some(bounds) = content_length
    && let Some(length) = response.headers().get(CONTENT_LENGTH)
  {
    let raw = length.to_str().unwrap_or_default();
    match raw.trim().parse::<u64>() {
      Ok(length) if bounds.contains(length) => {}
      _ => {
        return Err(ValidationError::ContentLength {
          actual: raw.to_string(),
          expected: bounds.expected,
          tolerance: bounds.tolerance,
        });
      }
    }
  }

  Ok(())
}
