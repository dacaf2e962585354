//! # Records, Increments and Partial Sums
//!
//! The value types that flow through the aggregation pipeline.
//!
//! - [`Keyed`] is implemented by anything that can be grouped. The emitter only
//!   ever looks at [`Keyed::key`].
//! - [`Increment`] is a single key with an implicit count of one. The emitter
//!   produces exactly one per record.
//! - [`PartialSum`] is an accumulated `key -> count` mapping. Mergers produce
//!   one each.
//! - [`Countable`] is the associative fold shared by both, so a merger can be
//!   composed over increments or over other mergers' partial sums.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map;

/// Key used for records whose grouping key is empty or whitespace-only.
///
/// Renderers require non-blank keys, and dropping such records would break
/// count conservation.
pub const UNSPECIFIED_KEY: &str = "Unspecified";

/// A record that can be grouped by a string key.
pub trait Keyed {
  /// Returns the grouping key of this record.
  fn key(&self) -> &str;
}

impl Keyed for String {
  fn key(&self) -> &str {
    self
  }
}

impl Keyed for &str {
  fn key(&self) -> &str {
    self
  }
}

/// A single-key count of one, produced by the emitter for every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
  key: String,
}

impl Increment {
  /// Creates an increment for `key`, normalizing blank keys to [`UNSPECIFIED_KEY`].
  pub fn new(key: &str) -> Self {
    let key = if key.trim().is_empty() {
      UNSPECIFIED_KEY.to_string()
    } else {
      key.to_string()
    };
    Self { key }
  }

  /// Creates the increment for a record.
  pub fn for_record<R: Keyed + ?Sized>(record: &R) -> Self {
    Self::new(record.key())
  }

  /// Returns the key this increment counts.
  pub fn key(&self) -> &str {
    &self.key
  }
}

/// An accumulated mapping from key to count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialSum {
  counts: HashMap<String, u64>,
}

impl PartialSum {
  /// Creates an empty partial sum.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `count` to `key`.
  pub fn add(&mut self, key: impl Into<String>, count: u64) {
    *self.counts.entry(key.into()).or_insert(0) += count;
  }

  /// Returns the count recorded for `key`, zero when absent.
  pub fn get(&self, key: &str) -> u64 {
    self.counts.get(key).copied().unwrap_or(0)
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.counts.len()
  }

  /// Returns `true` when no key has been counted.
  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  /// Sum of all counts.
  pub fn total(&self) -> u64 {
    self.counts.values().sum()
  }

  /// Iterates over `(key, count)` pairs in map order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
    self.counts.iter().map(|(key, count)| (key.as_str(), *count))
  }
}

impl IntoIterator for PartialSum {
  type Item = (String, u64);
  type IntoIter = hash_map::IntoIter<String, u64>;

  fn into_iter(self) -> Self::IntoIter {
    self.counts.into_iter()
  }
}

impl<K: Into<String>> FromIterator<(K, u64)> for PartialSum {
  fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
    let mut sum = PartialSum::new();
    for (key, count) in iter {
      sum.add(key, count);
    }
    sum
  }
}

/// Values a merger can fold into its accumulator.
///
/// Folding is associative and commutative, which is what makes the merge tree
/// shape irrelevant to the result.
pub trait Countable: Send + 'static {
  /// Adds this value's counts to `acc`.
  fn fold_into(self, acc: &mut PartialSum);
}

impl Countable for Increment {
  fn fold_into(self, acc: &mut PartialSum) {
    acc.add(self.key, 1);
  }
}

impl Countable for PartialSum {
  fn fold_into(self, acc: &mut PartialSum) {
    if acc.is_empty() {
      *acc = self;
      return;
    }
    for (key, count) in self.counts {
      acc.add(key, count);
    }
  }
}
