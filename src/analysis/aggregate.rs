//! Cross-repetition and cross-node aggregation.
//!
//! Samples of one protocol are grouped by normalized timestamp. For every node
//! the samples of all repetitions at the same timestamp are averaged, and the
//! same samples also feed one protocol-wide bucket per timestamp. A sample is
//! left out while the active event lists its node as excluded.
//!
//! Buckets live in ordered maps, so every emitted series is ascending in
//! time regardless of the order samples were seen in.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::timeline::is_excluded;
use super::types::*;
use crate::config::ExclusionTimeline;

/// Running aggregate of the samples sharing one timestamp
pub trait Accumulator: Default + Send {
    type Sample: Timestamped + Sync;
    type Output: Send;

    fn add(&mut self, sample: &Self::Sample);

    fn merge(&mut self, other: &Self);

    /// `None` when nothing was accumulated
    fn finish(&self, timestamp: Timestamp) -> Option<Self::Output>;
}

/// Arithmetic mean of metric values
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueMean {
    sum: f64,
    count: u64,
}

impl Accumulator for ValueMean {
    type Sample = ValueSample;
    type Output = ValueSample;

    fn add(&mut self, sample: &ValueSample) {
        self.sum += sample.value;
        self.count += 1;
    }

    fn merge(&mut self, other: &Self) {
        self.sum += other.sum;
        self.count += other.count;
    }

    fn finish(&self, timestamp: Timestamp) -> Option<ValueSample> {
        (self.count > 0).then(|| ValueSample {
            timestamp,
            value: self.sum / self.count as f64,
        })
    }
}

/// Truncating integer mean of sent and received counters
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCountMean {
    sent: i64,
    received: i64,
    count: i64,
}

impl Accumulator for MessageCountMean {
    type Sample = MessageCountSample;
    type Output = MessageCountSample;

    fn add(&mut self, sample: &MessageCountSample) {
        self.sent += sample.sent;
        self.received += sample.received;
        self.count += 1;
    }

    fn merge(&mut self, other: &Self) {
        self.sent += other.sent;
        self.received += other.received;
        self.count += other.count;
    }

    fn finish(&self, timestamp: Timestamp) -> Option<MessageCountSample> {
        (self.count > 0).then(|| MessageCountSample {
            timestamp,
            sent: self.sent / self.count,
            received: self.received / self.count,
        })
    }
}

type Buckets<A> = BTreeMap<Timestamp, A>;

/// Events that decide exclusions for the samples of `run`
fn exclusion_events<'a>(
    timeline: ExclusionTimeline,
    reference: &'a RunMetadata,
    run: &'a RepetitionRun,
) -> &'a [Event] {
    match timeline {
        ExclusionTimeline::Reference => &reference.events,
        ExclusionTimeline::PerRepetition => &run.metadata.events,
    }
}

fn node_buckets<A, F>(
    node: &str,
    runs: &ProtocolRuns,
    reference: &RunMetadata,
    timeline: ExclusionTimeline,
    samples_of: &F,
) -> Buckets<A>
where
    A: Accumulator,
    F: Fn(&NodeSeries) -> &[A::Sample],
{
    let mut buckets: Buckets<A> = BTreeMap::new();

    for run in runs.values() {
        let Some(series) = run.nodes.get(node) else {
            continue;
        };
        let events = exclusion_events(timeline, reference, run);

        for sample in samples_of(series) {
            let timestamp = sample.timestamp();
            if is_excluded(timestamp, node, events) {
                continue;
            }
            buckets.entry(timestamp).or_default().add(sample);
        }
    }

    buckets
}

fn finish_all<A: Accumulator>(buckets: &Buckets<A>) -> Vec<A::Output> {
    buckets
        .iter()
        .filter_map(|(&timestamp, acc)| acc.finish(timestamp))
        .collect()
}

/// Aggregate one kind of sample for every node of a protocol.
///
/// Nodes are processed in parallel; the protocol-wide series is the merge
/// of all node buckets, so it counts exactly the samples the per-node series
/// count.
pub fn aggregate_protocol<A, F>(
    runs: &ProtocolRuns,
    reference: &RunMetadata,
    timeline: ExclusionTimeline,
    samples_of: F,
) -> ProtocolSeries<A::Output>
where
    A: Accumulator,
    F: Fn(&NodeSeries) -> &[A::Sample] + Sync,
{
    let universe: Vec<NodeId> = node_universe(runs).into_iter().collect();

    let node_results: Vec<(NodeId, Buckets<A>)> = universe
        .into_par_iter()
        .map(|node| {
            let buckets = node_buckets(&node, runs, reference, timeline, &samples_of);
            (node, buckets)
        })
        .collect();

    let mut total: Buckets<A> = BTreeMap::new();
    let mut per_node = BTreeMap::new();

    for (node, buckets) in node_results {
        for (&timestamp, acc) in &buckets {
            total.entry(timestamp).or_default().merge(acc);
        }
        per_node.insert(node, finish_all(&buckets));
    }

    ProtocolSeries {
        per_node,
        averaged: finish_all(&total),
    }
}

/// Mean metric value per node and across nodes
pub fn aggregate_values(
    runs: &ProtocolRuns,
    reference: &RunMetadata,
    timeline: ExclusionTimeline,
) -> ProtocolSeries<ValueSample> {
    aggregate_protocol::<ValueMean, _>(runs, reference, timeline, |series| {
        series.values.as_slice()
    })
}

/// Mean cumulative message counters per node and across nodes
pub fn aggregate_msg_counts(
    runs: &ProtocolRuns,
    reference: &RunMetadata,
    timeline: ExclusionTimeline,
) -> ProtocolSeries<MessageCountSample> {
    aggregate_protocol::<MessageCountMean, _>(runs, reference, timeline, |series| {
        series.msg_counts.as_slice()
    })
}
