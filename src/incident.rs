//! Incident records as served by the incident report endpoint.
//!
//! The wire document is `{"Name": "...", "Report": [incident, ...]}` with
//! snake-case incident fields. Missing fields default to empty strings.

use crate::pipeline::AggregateResult;
use crate::record::Keyed;
use crate::table::TableRow;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One incident. Grouped by [`priority`](Incident::priority).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Incident {
  /// Incident identifier, e.g. `INC0012345`.
  pub number: String,
  /// Assignee.
  pub assigned_to: String,
  /// Free-text description.
  pub description: String,
  /// Workflow state.
  pub state: String,
  /// Priority, the aggregation key.
  pub priority: String,
  /// Severity.
  pub severity: String,
}

impl Keyed for Incident {
  fn key(&self) -> &str {
    &self.priority
  }
}

impl TableRow for Incident {
  fn headers() -> &'static [&'static str] {
    &[
      "Number",
      "AssignedTo",
      "Description",
      "State",
      "Priority",
      "Severity",
    ]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.number.clone(),
      self.assigned_to.clone(),
      self.description.clone(),
      self.state.clone(),
      self.priority.clone(),
      self.severity.clone(),
    ]
  }
}

/// A named list of incidents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
  /// Name of the query that produced the report.
  #[serde(rename = "Name", default)]
  pub name: String,
  /// The incidents.
  #[serde(rename = "Report", default)]
  pub report: Vec<Incident>,
}

impl IncidentReport {
  /// Parses a report from a JSON body.
  ///
  /// # Errors
  ///
  /// Returns the JSON error if `body` is not a report document.
  pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
    serde_json::from_slice(body)
  }
}

impl FromStr for IncidentReport {
  type Err = serde_json::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    serde_json::from_str(s)
  }
}

/// One row of the per-priority aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritySum {
  /// The priority.
  pub priority: String,
  /// Number of incidents with that priority.
  pub sum: u64,
}

impl PrioritySum {
  /// Converts an aggregate into rows, keeping its entry order.
  pub fn from_aggregate(aggregate: &AggregateResult) -> Vec<PrioritySum> {
    aggregate
      .iter()
      .map(|(priority, sum)| PrioritySum {
        priority: priority.to_string(),
        sum,
      })
      .collect()
  }
}

impl TableRow for PrioritySum {
  fn headers() -> &'static [&'static str] {
    &["Priority", "Sum"]
  }

  fn cells(&self) -> Vec<String> {
    vec![self.priority.clone(), self.sum.to_string()]
  }
}
