//! # incidentweave
//!
//! Cancellable fan-out/fan-in aggregation of incident reports.
//!
//! The core is a tree-shaped stream reduction:
//!
//! - [`emitter::Emitter`] turns records into a lazy stream of single-key increments.
//! - [`fan_out::FanOutCoordinator`] runs a bounded pool of [`merger::Merger`]s over
//!   that stream and reduces their partial sums with one final merger.
//! - [`pipeline::Pipeline`] wires the stages, owns the run's cancellation token
//!   and returns an [`pipeline::AggregateResult`].
//!
//! Around the core sit the pieces of a complete client: [`fetch`] retrieves and
//! validates the report, [`incident`] models it, and [`table`] renders rows as
//! plain text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use incidentweave::{Incident, Pipeline, PipelineConfig};
//!
//! # async fn example(incidents: Vec<Incident>) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let by_priority = pipeline.run(&incidents).await?;
//! for (priority, count) in by_priority.iter() {
//!     println!("{priority}: {count}");
//! }
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Pipeline and fetcher configuration.
pub mod config;
/// Source stage: records to increments.
pub mod emitter;
/// Error types.
pub mod error;
/// Bounded worker pool with a final reduction.
pub mod fan_out;
/// HTTP retrieval and validation of incident reports.
pub mod fetch;
/// Incident records and report documents.
pub mod incident;
/// Reduction stage.
pub mod merger;
/// Stage wiring, cancellation and run state.
pub mod pipeline;
/// Keys, increments and partial sums.
pub mod record;
/// Plain-text table rendering.
pub mod table;

pub use config::{FetchConfig, PipelineConfig};
pub use error::{FetchError, PipelineError, ValidationError};
pub use incident::{Incident, IncidentReport, PrioritySum};
pub use pipeline::{AggregateResult, Pipeline, PipelineState};
pub use record::{Increment, Keyed, PartialSum};

#[cfg(test)]
mod fan_out_test;
#[cfg(test)]
mod pipeline_test;
