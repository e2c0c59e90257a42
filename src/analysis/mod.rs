//! Time-series analysis of gossip aggregation experiments.
//!
//! Turns the raw per-node samples of repeated protocol runs into averaged,
//! event-aware series that can be compared against the expected converged
//! value.

pub mod types;
pub mod loader;
pub mod normalize;
pub mod timeline;
pub mod aggregate;
pub mod rates;
pub mod reference;
pub mod writer;
pub mod report;
pub mod pipeline;

pub use types::*;
pub use loader::load_dataset;
pub use normalize::normalize_dataset;
pub use timeline::{active_event, expected_value_at};
pub use aggregate::{aggregate_msg_counts, aggregate_values};
pub use rates::{derive_protocol_rates, derive_rates, RateSeries};
pub use reference::{check_shared_timeline, experiment_reference, expected_value_series, TimelineMismatch};
pub use report::{generate_json_summary, print_summary, AnalysisSummary};
pub use pipeline::{analyze_dataset, run_analysis, ExperimentAnalysis, TimelineError};
