//! CSV serialization of derived series.
//!
//! Files have no header. Timestamps and counters are written as integers,
//! values and rates with two decimals.

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::{debug, error};
use rayon::prelude::*;

use super::types::*;
use crate::config::Protocol;

/// File holding the ground-truth series
pub const EXPECTED_VALUE_FILE: &str = "value_expected.csv";

/// Label used in place of a node id for cross-node series
pub const AVERAGED: &str = "averaged";

/// Kind of derived series, also the middle part of its file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Value,
    MsgCount,
    MsgRate,
}

impl SeriesKind {
    pub fn label(&self) -> &'static str {
        match self {
            SeriesKind::Value => "value",
            SeriesKind::MsgCount => "msgcount",
            SeriesKind::MsgRate => "msgrate",
        }
    }
}

/// `<protocol>_<kind>_<node>.csv`; pass [`AVERAGED`] for the cross-node series
pub fn series_file_name(protocol: Protocol, kind: SeriesKind, node: &str) -> String {
    format!("{}_{}_{}.csv", protocol.id(), kind.label(), node)
}

/// A sample that serializes to one CSV record
pub trait CsvRow {
    fn to_record(&self) -> Vec<String>;
}

impl CsvRow for ValueSample {
    fn to_record(&self) -> Vec<String> {
        vec![self.timestamp.to_string(), format!("{:.2}", self.value)]
    }
}

impl CsvRow for MessageCountSample {
    fn to_record(&self) -> Vec<String> {
        vec![
            self.timestamp.to_string(),
            self.sent.to_string(),
            self.received.to_string(),
        ]
    }
}

impl CsvRow for RateSample {
    fn to_record(&self) -> Vec<String> {
        vec![
            self.timestamp.to_string(),
            format!("{:.2}", self.sent_rate),
            format!("{:.2}", self.received_rate),
        ]
    }
}

/// Write one series as a headerless CSV file
pub fn write_series<T: CsvRow>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .wrap_err_with(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer
            .write_record(row.to_record())
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    }

    writer
        .flush()
        .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Borrowed rows of one output file
#[derive(Debug, Clone, Copy)]
pub enum SeriesRows<'a> {
    Values(&'a [ValueSample]),
    MsgCounts(&'a [MessageCountSample]),
    Rates(&'a [RateSample]),
}

/// One file to be written into the output directory
#[derive(Debug, Clone)]
pub struct OutputFile<'a> {
    pub name: String,
    pub rows: SeriesRows<'a>,
}

impl OutputFile<'_> {
    fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(&self.name);
        match self.rows {
            SeriesRows::Values(rows) => write_series(&path, rows),
            SeriesRows::MsgCounts(rows) => write_series(&path, rows),
            SeriesRows::Rates(rows) => write_series(&path, rows),
        }
    }
}

/// Outcome of a batch write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub failed: usize,
}

/// Write every file in parallel.
///
/// A file that fails is logged and counted; the others are still written.
pub fn write_all(dir: &Path, files: &[OutputFile<'_>]) -> WriteStats {
    let failed = files
        .par_iter()
        .filter(|file| match file.write(dir) {
            Ok(()) => {
                debug!("Wrote {}", file.name);
                false
            }
            Err(e) => {
                error!("{:#}", e);
                true
            }
        })
        .count();

    WriteStats {
        written: files.len() - failed,
        failed,
    }
}
