//! Experiment dataset discovery and parsing.
//!
//! Reads the on-disk layout produced by the experiment runner:
//! `<base>/<run_dir>/<repetition_prefix>N/<metadata_file>` plus one
//! `<node_prefix>M/` directory per node holding a value file and a message
//! count file. Bad rows, nodes and repetitions are logged and skipped so one
//! damaged file never loses the rest of the experiment.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;

use super::types::*;
use crate::config::{AnalysisConfig, LayoutConfig, Protocol};

/// A CSV row that cannot be turned into a sample
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: usize, value: String },
}

fn field<T: std::str::FromStr>(record: &csv::StringRecord, index: usize) -> Result<T, RowError> {
    let raw = record.get(index).unwrap_or_default();
    raw.parse().map_err(|_| RowError::InvalidNumber {
        field: index,
        value: raw.to_string(),
    })
}

fn require_columns(record: &csv::StringRecord, expected: usize) -> Result<(), RowError> {
    if record.len() < expected {
        return Err(RowError::TooFewColumns {
            expected,
            found: record.len(),
        });
    }
    Ok(())
}

/// Value row: timestamp in field 2, value in field 3, other fields ignored
pub fn parse_value_row(record: &csv::StringRecord) -> Result<ValueSample, RowError> {
    require_columns(record, 4)?;
    Ok(ValueSample {
        timestamp: field(record, 2)?,
        value: field(record, 3)?,
    })
}

/// Message count row: timestamp, sent, received
pub fn parse_msg_count_row(record: &csv::StringRecord) -> Result<MessageCountSample, RowError> {
    require_columns(record, 3)?;
    Ok(MessageCountSample {
        timestamp: field(record, 0)?,
        sent: field(record, 1)?,
        received: field(record, 2)?,
    })
}

/// Parse every row of a headerless CSV stream, skipping rows that fail
pub fn read_samples<R, T, F>(reader: R, source: &str, parse_row: F) -> Vec<T>
where
    R: Read,
    F: Fn(&csv::StringRecord) -> Result<T, RowError>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                warn!("Stopped reading {} at line {}: {}", source, line + 1, e);
                break;
            }
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line + 1, source, e);
                skipped += 1;
                continue;
            }
        };

        match parse_row(&record) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line + 1, source, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!("{}: kept {} rows, skipped {}", source, samples.len(), skipped);
    }
    samples
}

fn read_sample_file<T, F>(path: &Path, parse_row: F) -> Result<Vec<T>>
where
    F: Fn(&csv::StringRecord) -> Result<T, RowError>,
{
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    Ok(read_samples(file, &path.display().to_string(), parse_row))
}

/// Subdirectories of `dir` named `<prefix><digits>`, sorted by name
fn numbered_dirs(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let pattern = Regex::new(&format!(r"^{}(\d+)$", regex::escape(prefix)))
        .wrap_err_with(|| format!("Invalid directory prefix {:?}", prefix))?;

    let entries =
        std::fs::read_dir(dir).wrap_err_with(|| format!("Failed to list {}", dir.display()))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if pattern.is_match(&name) && entry.path().is_dir() {
            dirs.push((name, entry.path()));
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Parse a run metadata file
pub fn load_metadata(path: &Path) -> Result<RunMetadata> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(file).wrap_err_with(|| format!("Failed to parse {}", path.display()))
}

/// Load one node directory; fails when either sample file is missing
fn load_node(node_dir: &Path, layout: &LayoutConfig) -> Result<NodeSeries> {
    Ok(NodeSeries {
        values: read_sample_file(&node_dir.join(&layout.value_file), parse_value_row)?,
        msg_counts: read_sample_file(&node_dir.join(&layout.msg_count_file), parse_msg_count_row)?,
    })
}

/// Load one repetition directory
pub fn load_repetition(repetition_dir: &Path, layout: &LayoutConfig) -> Result<RepetitionRun> {
    let metadata = load_metadata(&repetition_dir.join(&layout.metadata_file))?;
    let mut run = RepetitionRun::new(metadata);

    for (node, node_dir) in numbered_dirs(repetition_dir, &layout.node_prefix)? {
        match load_node(&node_dir, layout) {
            Ok(series) => {
                debug!(
                    "Loaded {}: {} values, {} message counts",
                    node_dir.display(),
                    series.values.len(),
                    series.msg_counts.len()
                );
                run.nodes.insert(node, series);
            }
            Err(e) => warn!("Skipping node {}: {:#}", node_dir.display(), e),
        }
    }

    Ok(run)
}

/// Load every repetition of one protocol run in parallel
pub fn load_protocol_runs(run_dir: &Path, layout: &LayoutConfig) -> Result<ProtocolRuns> {
    let repetitions = numbered_dirs(run_dir, &layout.repetition_prefix)?;
    info!(
        "Loading {} repetitions from {} in parallel...",
        repetitions.len(),
        run_dir.display()
    );

    let runs: ProtocolRuns = repetitions
        .par_iter()
        .filter_map(|(id, dir)| match load_repetition(dir, layout) {
            Ok(run) => Some((id.clone(), run)),
            Err(e) => {
                warn!("Skipping repetition {}: {:#}", dir.display(), e);
                None
            }
        })
        .collect();

    Ok(runs)
}

/// Load every configured protocol of the experiment.
///
/// A protocol whose run directory is missing or cannot be listed is skipped
/// with a warning.
pub fn load_dataset(config: &AnalysisConfig) -> ExperimentDataset {
    let mut dataset = ExperimentDataset::default();

    for &protocol in &config.protocols {
        let run_dir = config.run_dir(protocol);
        if !run_dir.exists() {
            warn!(
                "No run directory for {} at {}, skipping",
                protocol.display_name(),
                run_dir.display()
            );
            continue;
        }

        match load_protocol_runs(&run_dir, &config.layout) {
            Ok(runs) => {
                log_protocol_totals(protocol, &runs);
                dataset.protocols.insert(protocol, runs);
            }
            Err(e) => warn!("Skipping {}: {:#}", protocol.display_name(), e),
        }
    }

    info!(
        "Loaded {} repetitions across {} protocols",
        dataset.repetition_count(),
        dataset.protocols.len()
    );
    dataset
}

fn log_protocol_totals(protocol: Protocol, runs: &ProtocolRuns) {
    let samples: usize = runs
        .values()
        .flat_map(|run| run.nodes.values())
        .map(|series| series.values.len() + series.msg_counts.len())
        .sum();
    info!(
        "{}: loaded {} repetitions, {} nodes, {} samples",
        protocol,
        runs.len(),
        node_universe(runs).len(),
        samples
    );
}
