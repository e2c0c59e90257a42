//! End-to-end analysis: load, normalize, check, derive, write.

use std::collections::BTreeMap;
use std::fs;

use color_eyre::eyre::{Context, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use super::aggregate::{aggregate_msg_counts, aggregate_values};
use super::loader::load_dataset;
use super::normalize::normalize_dataset;
use super::rates::{derive_protocol_rates, RateSeries};
use super::reference::{
    check_shared_timeline, experiment_reference, expected_value_series, protocol_reference,
    TimelineMismatch,
};
use super::report::{generate_json_summary, AnalysisSummary, ProtocolSummary, SUMMARY_FILE};
use super::types::*;
use super::writer::{
    series_file_name, write_all, OutputFile, SeriesKind, SeriesRows, WriteStats, AVERAGED,
    EXPECTED_VALUE_FILE,
};
use crate::config::{AnalysisConfig, ExclusionTimeline, Protocol};

/// Protocols disagree on the run window or event timeline
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("protocols do not share one event timeline: {}", describe(.0))]
    Diverged(Vec<TimelineMismatch>),
}

fn describe(mismatches: &[TimelineMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every series derived for one protocol
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolAnalysis {
    pub values: ProtocolSeries<ValueSample>,
    pub msg_counts: ProtocolSeries<MessageCountSample>,
    pub rates: RateSeries,
}

/// Every series derived for the experiment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentAnalysis {
    pub reference_protocol: Option<Protocol>,
    pub expected_values: Vec<ValueSample>,
    pub protocols: BTreeMap<Protocol, ProtocolAnalysis>,
}

fn analyze_protocol(
    protocol: Protocol,
    runs: &ProtocolRuns,
    timeline: ExclusionTimeline,
) -> Option<ProtocolAnalysis> {
    let Some(reference) = protocol_reference(protocol, runs) else {
        warn!("{}: no node data in any repetition, nothing to derive", protocol);
        return None;
    };
    debug!(
        "{}: reference point {}/{}",
        protocol,
        reference.repetition,
        reference.node
    );

    let values = aggregate_values(runs, reference.metadata, timeline);
    let msg_counts = aggregate_msg_counts(runs, reference.metadata, timeline);
    let rates = derive_protocol_rates(&msg_counts);

    Some(ProtocolAnalysis {
        values,
        msg_counts,
        rates,
    })
}

/// Derive every series from a normalized dataset.
///
/// Protocols are processed in parallel. A protocol without any node data
/// produces nothing, and without any reference point there is no
/// expected-value series either.
pub fn analyze_dataset(dataset: &ExperimentDataset, timeline: ExclusionTimeline) -> ExperimentAnalysis {
    let reference = experiment_reference(dataset);

    let protocols = dataset
        .protocols
        .par_iter()
        .filter_map(|(&protocol, runs)| {
            analyze_protocol(protocol, runs, timeline).map(|analysis| (protocol, analysis))
        })
        .collect();

    ExperimentAnalysis {
        reference_protocol: reference.map(|r| r.protocol),
        expected_values: reference.map(|r| expected_value_series(&r)).unwrap_or_default(),
        protocols,
    }
}

/// Output files for every derived series, in name order per protocol
pub fn output_files(analysis: &ExperimentAnalysis) -> Vec<OutputFile<'_>> {
    let mut files = Vec::new();

    if analysis.reference_protocol.is_some() {
        files.push(OutputFile {
            name: EXPECTED_VALUE_FILE.to_string(),
            rows: SeriesRows::Values(&analysis.expected_values),
        });
    }

    for (&protocol, derived) in &analysis.protocols {
        let file = |kind, node: &str, rows| OutputFile {
            name: series_file_name(protocol, kind, node),
            rows,
        };

        for (node, series) in &derived.values.per_node {
            files.push(file(SeriesKind::Value, node, SeriesRows::Values(series)));
        }
        files.push(file(SeriesKind::Value, AVERAGED, SeriesRows::Values(&derived.values.averaged)));

        for (node, series) in &derived.msg_counts.per_node {
            files.push(file(SeriesKind::MsgCount, node, SeriesRows::MsgCounts(series)));
        }
        files.push(file(
            SeriesKind::MsgCount,
            AVERAGED,
            SeriesRows::MsgCounts(&derived.msg_counts.averaged),
        ));

        for (node, series) in &derived.rates.per_node {
            files.push(file(SeriesKind::MsgRate, node, SeriesRows::Rates(series)));
        }
        if let Some(averaged) = &derived.rates.averaged {
            files.push(file(SeriesKind::MsgRate, AVERAGED, SeriesRows::Rates(averaged)));
        }
    }

    files
}

fn summarize(
    config: &AnalysisConfig,
    dataset: &ExperimentDataset,
    analysis: &ExperimentAnalysis,
    stats: WriteStats,
    mismatches: &[TimelineMismatch],
) -> AnalysisSummary {
    let protocols = dataset
        .protocols
        .iter()
        .map(|(protocol, runs)| {
            let mut summary = ProtocolSummary {
                repetitions: runs.len(),
                nodes: node_universe(runs).len(),
                ..Default::default()
            };
            if let Some(derived) = analysis.protocols.get(protocol) {
                summary.value_points = derived.values.averaged.len();
                summary.msg_count_points = derived.msg_counts.averaged.len();
                summary.nodes_without_rates = derived.msg_counts.per_node.len() - derived.rates.per_node.len();
            }
            (*protocol, summary)
        })
        .collect();

    AnalysisSummary {
        analysis_timestamp: chrono::Utc::now().to_rfc3339(),
        experiment: config.experiment.clone(),
        base_dir: config.base_dir.display().to_string(),
        output_dir: config.output_dir().display().to_string(),
        reference_protocol: analysis.reference_protocol,
        expected_value_points: analysis.expected_values.len(),
        protocols,
        files_written: stats.written,
        files_failed: stats.failed,
        timeline_warnings: mismatches.iter().map(|m| m.to_string()).collect(),
    }
}

/// Run the whole analysis for one experiment and write its outputs.
///
/// Fails when the configuration is invalid, the output directory cannot be
/// created, or protocols diverge while `strict_timeline` is set. Everything
/// else that goes wrong is logged and skipped.
pub fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisSummary> {
    config.validate()?;

    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", output_dir.display()))?;

    info!(
        "Analyzing experiment {} from {}",
        config.experiment,
        config.base_dir.display()
    );
    let mut dataset = load_dataset(config);
    if dataset.is_empty() {
        warn!("No repetitions found for experiment {}", config.experiment);
    }

    normalize_dataset(&mut dataset, config.timestamp_divisor);

    let mismatches = check_shared_timeline(&dataset);
    if !mismatches.is_empty() {
        if config.strict_timeline {
            return Err(TimelineError::Diverged(mismatches).into());
        }
        for mismatch in &mismatches {
            warn!("{}", mismatch);
        }
    }

    let analysis = analyze_dataset(&dataset, config.exclusion_timeline);

    let files = output_files(&analysis);
    info!("Writing {} files to {}", files.len(), output_dir.display());
    let stats = write_all(&output_dir, &files);
    if stats.failed > 0 {
        warn!("{} of {} files could not be written", stats.failed, files.len());
    }

    let summary = summarize(config, &dataset, &analysis, stats, &mismatches);
    if let Err(e) = generate_json_summary(&summary, &output_dir.join(SUMMARY_FILE)) {
        error!("{:#}", e);
    }

    Ok(summary)
}
