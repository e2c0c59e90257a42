//! Timestamp normalization.
//!
//! Brings every repetition onto a common time axis: raw timestamps are
//! converted to seconds, shifted so the experiment starts at 0, and samples
//! outside `[0, duration]` are dropped.

use log::{debug, warn};

use super::types::*;

/// Normalize one repetition in place.
///
/// `divisor` is the number of raw units per second; division truncates.
pub fn normalize_run(run: &mut RepetitionRun, divisor: i64) {
    convert_units(run, divisor);
    shift_and_clip(run);
}

/// Normalize every repetition of the dataset
pub fn normalize_dataset(dataset: &mut ExperimentDataset, divisor: i64) {
    for run in dataset.runs_mut() {
        normalize_run(run, divisor);
    }
}

fn convert_units(run: &mut RepetitionRun, divisor: i64) {
    let metadata = &mut run.metadata;
    metadata.start_experiment_ts /= divisor;
    metadata.start_events_ts /= divisor;
    metadata.stop_events_ts /= divisor;
    metadata.stop_experiment_ts /= divisor;
    for event in &mut metadata.events {
        event.timestamp /= divisor;
    }

    for node in run.nodes.values_mut() {
        scale(&mut node.values, divisor);
        scale(&mut node.msg_counts, divisor);
    }
}

fn scale<T: Timestamped>(samples: &mut [T], divisor: i64) {
    for sample in samples {
        sample.set_timestamp(sample.timestamp() / divisor);
    }
}

fn shift_and_clip(run: &mut RepetitionRun) {
    let metadata = &mut run.metadata;
    let origin = metadata.start_experiment_ts;
    let duration = metadata.stop_experiment_ts - origin;

    metadata.start_experiment_ts -= origin;
    metadata.start_events_ts -= origin;
    metadata.stop_events_ts -= origin;
    metadata.stop_experiment_ts -= origin;
    for event in &mut metadata.events {
        event.timestamp -= origin;
    }

    if duration < 0 {
        warn!(
            "Repetition {} stops before it starts, all samples will be dropped",
            metadata.repetition
        );
    }

    let mut clipped = 0;
    for node in run.nodes.values_mut() {
        clipped += shift_window(&mut node.values, origin, duration);
        clipped += shift_window(&mut node.msg_counts, origin, duration);
    }

    if clipped > 0 {
        debug!(
            "Repetition {}: dropped {} samples outside [0, {}]",
            metadata.repetition,
            clipped,
            duration
        );
    }
}

/// Shift by `origin` and keep samples within `[0, duration]`; returns how many were dropped
fn shift_window<T: Timestamped>(samples: &mut Vec<T>, origin: Timestamp, duration: Timestamp) -> usize {
    let before = samples.len();
    samples.retain_mut(|sample| {
        let shifted = sample.timestamp() - origin;
        sample.set_timestamp(shifted);
        (0..=duration).contains(&shifted)
    });
    before - samples.len()
}
