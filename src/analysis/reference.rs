//! Reference point selection and the expected-value series.
//!
//! A reference point is one (repetition, node) pair whose normalized value
//! timestamps serve as the time grid for the ground-truth series and whose
//! run metadata supplies the event timeline. Selection is deterministic:
//! first repetition (by id) that has any node, then its first node (by id).

use super::timeline::expected_value_at;
use super::types::*;
use crate::config::Protocol;

#[derive(Debug, Clone, Copy)]
pub struct ReferencePoint<'a> {
    pub protocol: Protocol,
    pub repetition: &'a str,
    pub node: &'a str,
    pub series: &'a NodeSeries,
    pub metadata: &'a RunMetadata,
}

/// Reference point of one protocol's runs
pub fn protocol_reference(protocol: Protocol, runs: &ProtocolRuns) -> Option<ReferencePoint<'_>> {
    runs.iter().find_map(|(repetition, run)| {
        run.nodes.iter().next().map(|(node, series)| ReferencePoint {
            protocol,
            repetition,
            node,
            series,
            metadata: &run.metadata,
        })
    })
}

/// Reference point of the whole experiment: the first protocol that has one
pub fn experiment_reference(dataset: &ExperimentDataset) -> Option<ReferencePoint<'_>> {
    dataset
        .protocols
        .iter()
        .find_map(|(&protocol, runs)| protocol_reference(protocol, runs))
}

/// Ground-truth series on the reference time grid
pub fn expected_value_series(reference: &ReferencePoint<'_>) -> Vec<ValueSample> {
    reference
        .series
        .values
        .iter()
        .map(|sample| ValueSample {
            timestamp: sample.timestamp,
            value: expected_value_at(sample.timestamp, reference.metadata),
        })
        .collect()
}

/// A protocol whose reference run disagrees with the experiment reference.
///
/// Comparing protocols against one expected-value series is only meaningful
/// when they share the run window and the event timeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("protocol {protocol} does not share the timeline of reference protocol {reference}: {reason}")]
pub struct TimelineMismatch {
    pub protocol: Protocol,
    pub reference: Protocol,
    pub reason: String,
}

fn event_signature(metadata: &RunMetadata) -> Vec<(Timestamp, f64)> {
    let mut events: Vec<_> = metadata
        .events
        .iter()
        .map(|e| (e.timestamp, e.expected_value))
        .collect();
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    events
}

/// Compare every protocol's reference run with the experiment reference.
///
/// Must run after normalization. Returns one entry per disagreeing protocol.
pub fn check_shared_timeline(dataset: &ExperimentDataset) -> Vec<TimelineMismatch> {
    let Some(reference) = experiment_reference(dataset) else {
        return Vec::new();
    };
    let expected_events = event_signature(reference.metadata);

    let mut mismatches = Vec::new();
    for (&protocol, runs) in &dataset.protocols {
        let Some(candidate) = protocol_reference(protocol, runs) else {
            continue;
        };
        if candidate.protocol == reference.protocol {
            continue;
        }

        let reason = if candidate.metadata.stop_experiment_ts != reference.metadata.stop_experiment_ts {
            Some(format!(
                "run window ends at {}s instead of {}s",
                candidate.metadata.stop_experiment_ts, reference.metadata.stop_experiment_ts
            ))
        } else if event_signature(candidate.metadata) != expected_events {
            Some(format!(
                "{} events differ from the reference's {}",
                candidate.metadata.events.len(),
                reference.metadata.events.len()
            ))
        } else {
            None
        };

        if let Some(reason) = reason {
            mismatches.push(TimelineMismatch {
                protocol,
                reference: reference.protocol,
                reason,
            });
        }
    }

    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(expected_value: f64, stop: Timestamp, events: Vec<Event>, nodes: &[(&str, &[Timestamp])]) -> RepetitionRun {
        let metadata = RunMetadata {
            job: JobInfo {
                expected_value,
                ..Default::default()
            },
            repetition: 1,
            start_experiment_ts: 0,
            start_events_ts: 0,
            stop_events_ts: 0,
            stop_experiment_ts: stop,
            events,
        };
        let mut run = RepetitionRun::new(metadata);
        for (node, timestamps) in nodes {
            run.nodes.insert(
                node.to_string(),
                NodeSeries {
                    values: timestamps
                        .iter()
                        .map(|&timestamp| ValueSample { timestamp, value: 0.0 })
                        .collect(),
                    msg_counts: Vec::new(),
                },
            );
        }
        run
    }

    fn event(timestamp: Timestamp, expected_value: f64) -> Event {
        Event {
            timestamp,
            expected_value,
            excluded_nodes: Default::default(),
        }
    }

    #[test]
    fn test_protocol_reference_skips_empty_repetitions() {
        let mut runs = ProtocolRuns::new();
        runs.insert("exp_1".to_string(), run(1.0, 10, Vec::new(), &[]));
        runs.insert("exp_2".to_string(), run(1.0, 10, Vec::new(), &[("node_2", &[1]), ("node_1", &[2])]));

        let reference = protocol_reference(Protocol::Hidera, &runs).unwrap();
        assert_eq!(reference.repetition, "exp_2");
        assert_eq!(reference.node, "node_1");
    }

    #[test]
    fn test_no_reference_in_empty_dataset() {
        let dataset = ExperimentDataset::default();
        assert!(experiment_reference(&dataset).is_none());
        assert!(check_shared_timeline(&dataset).is_empty());
    }

    #[test]
    fn test_expected_value_series() {
        let mut runs = ProtocolRuns::new();
        runs.insert(
            "exp_1".to_string(),
            run(5.0, 30, vec![event(10, 7.0), event(20, 9.0)], &[("node_1", &[0, 10, 11, 20, 25])]),
        );
        let mut dataset = ExperimentDataset::default();
        dataset.protocols.insert(Protocol::FlowUpdating, runs);

        let reference = experiment_reference(&dataset).unwrap();
        assert_eq!(reference.protocol, Protocol::FlowUpdating);

        let series = expected_value_series(&reference);
        let values: Vec<_> = series.iter().map(|s| (s.timestamp, s.value)).collect();
        assert_eq!(values, vec![(0, 5.0), (10, 5.0), (11, 7.0), (20, 7.0), (25, 9.0)]);
    }

    #[test]
    fn test_shared_timeline_detects_mismatches() {
        let mut dataset = ExperimentDataset::default();
        let nodes: &[(&str, &[Timestamp])] = &[("node_1", &[1])];

        let mut hi = ProtocolRuns::new();
        hi.insert("exp_1".to_string(), run(1.0, 30, vec![event(10, 2.0)], nodes));
        let mut fu = ProtocolRuns::new();
        fu.insert("exp_1".to_string(), run(1.0, 30, vec![event(10, 2.0)], nodes));
        let mut ep = ProtocolRuns::new();
        ep.insert("exp_1".to_string(), run(1.0, 30, vec![event(12, 2.0)], nodes));
        let mut dd = ProtocolRuns::new();
        dd.insert("exp_1".to_string(), run(1.0, 40, vec![event(10, 2.0)], nodes));

        dataset.protocols.insert(Protocol::Hidera, hi);
        dataset.protocols.insert(Protocol::FlowUpdating, fu);
        dataset.protocols.insert(Protocol::ExtremaPropagation, ep);
        dataset.protocols.insert(Protocol::DigestDiffusion, dd);

        let mismatches = check_shared_timeline(&dataset);
        let protocols: Vec<_> = mismatches.iter().map(|m| m.protocol).collect();
        assert_eq!(protocols, vec![Protocol::ExtremaPropagation, Protocol::DigestDiffusion]);
        assert!(mismatches.iter().all(|m| m.reference == Protocol::Hidera));
    }
}
