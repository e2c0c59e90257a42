//! Analysis summary report.
//!
//! Written as JSON next to the CSV series and echoed to stdout by the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::Protocol;

/// File name of the JSON summary in the output directory
pub const SUMMARY_FILE: &str = "analysis_summary.json";

/// What was loaded and derived for one protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSummary {
    pub repetitions: usize,
    pub nodes: usize,
    pub value_points: usize,
    pub msg_count_points: usize,
    /// Nodes whose rate series was omitted for lack of samples
    pub nodes_without_rates: usize,
}

/// Top-level summary of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub analysis_timestamp: String,
    pub experiment: String,
    pub base_dir: String,
    pub output_dir: String,
    /// Protocol that supplied the expected-value time grid
    pub reference_protocol: Option<Protocol>,
    pub expected_value_points: usize,
    pub protocols: BTreeMap<Protocol, ProtocolSummary>,
    pub files_written: usize,
    pub files_failed: usize,
    pub timeline_warnings: Vec<String>,
}

/// Write the summary as pretty JSON
pub fn generate_json_summary(summary: &AnalysisSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write summary to {}", output_path.display()))?;

    info!("JSON summary written to {}", output_path.display());
    Ok(())
}

/// Print a short summary to stdout
pub fn print_summary(summary: &AnalysisSummary) {
    println!("\n=== ANALYSIS SUMMARY: {} ===\n", summary.experiment);
    match summary.reference_protocol {
        Some(protocol) => println!(
            "Reference: {} ({} expected-value points)",
            protocol.display_name(),
            summary.expected_value_points
        ),
        None => println!("Reference: none (no node data found)"),
    }

    for (protocol, stats) in &summary.protocols {
        println!(
            "  {:<20} {:>4} repetitions {:>5} nodes {:>7} value points {:>7} count points",
            protocol.display_name(),
            stats.repetitions,
            stats.nodes,
            stats.value_points,
            stats.msg_count_points
        );
    }

    println!(
        "\nFiles: {} written, {} failed -> {}",
        summary.files_written, summary.files_failed, summary.output_dir
    );
    for warning in &summary.timeline_warnings {
        println!("Warning: {}", warning);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summary_json_round_trip() {
        let mut protocols = BTreeMap::new();
        protocols.insert(
            Protocol::Hidera,
            ProtocolSummary {
                repetitions: 2,
                nodes: 3,
                value_points: 10,
                msg_count_points: 8,
                nodes_without_rates: 1,
            },
        );
        let summary = AnalysisSummary {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            experiment: "kill10".to_string(),
            base_dir: "/data".to_string(),
            output_dir: "/data/kill10_analyzed".to_string(),
            reference_protocol: Some(Protocol::Hidera),
            expected_value_points: 10,
            protocols,
            files_written: 12,
            files_failed: 0,
            timeline_warnings: Vec::new(),
        };

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SUMMARY_FILE);
        generate_json_summary(&summary, &path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"reference_protocol\": \"hi\""));
        let parsed: AnalysisSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
