//! # gossip-eval - Evaluation core for gossip aggregation experiments
//!
//! This library builds the overlay graphs that aggregation protocols run on
//! and turns the raw per-node samples of repeated runs into averaged,
//! event-aware time series.
//!
//! ## Overview
//!
//! An experiment runs every protocol (Hidera, Flow Updating, Extrema
//! Propagation, Digest Diffusion, Randomized Reports) several times on the
//! same overlay. Each node periodically records its current estimate and its
//! cumulative message counters; fault-injection events (node kills, input
//! edits) change the value the network should converge to and remove nodes
//! from the population.
//!
//! ## Key Features
//!
//! - **Deterministic overlays**: path backbone plus greedy fill up to a target degree
//! - **Time normalization**: raw nanosecond timestamps anchored at experiment start
//! - **Event-aware aggregation**: samples of excluded nodes are dropped while the event is active
//! - **Ground truth**: expected-value series synthesized from the event timeline
//! - **Message rates**: per-second send/receive rates from cumulative counters
//! - **Planning**: job plan validation, shared overlays, fault outcome previews
//!
//! ## Architecture
//!
//! - `config`: Analysis configuration, protocol catalogue and validation
//! - `config_loader`: YAML loading and CLI overrides
//! - `topology`: Overlay graph generation
//! - `analysis`: Loading, normalization, aggregation and CSV output
//! - `plan`: Job plans and the fault-event catalogue
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gossip_eval::{analysis, config::AnalysisConfig};
//!
//! let config = AnalysisConfig::new("kill10", "/data/experiments");
//! let summary = analysis::run_analysis(&config)?;
//! println!("{} files written", summary.files_written);
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Input Layout
//!
//! ```text
//! <base_dir>/<experiment>_<protocol>/exp_<i>/metadata.json
//! <base_dir>/<experiment>_<protocol>/exp_<i>/node_<j>/value.csv
//! <base_dir>/<experiment>_<protocol>/exp_<i>/node_<j>/msg_count.csv
//! ```
//!
//! ## Error Handling
//!
//! Entry points return `color_eyre::Result`. Damaged rows, nodes and
//! repetitions are logged and skipped; only an invalid configuration or an
//! unwritable output directory aborts an analysis.

pub mod config;
pub mod config_loader;
pub mod topology;
pub mod analysis;
pub mod plan;
