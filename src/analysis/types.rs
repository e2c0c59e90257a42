//! Core data types for experiment analysis.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Protocol;

/// Timestamp in raw units before normalization, whole seconds after
pub type Timestamp = i64;

/// Node directory name, e.g. `node_3`
pub type NodeId = String;

/// Repetition directory name, e.g. `exp_1`
pub type RepetitionId = String;

/// Treats an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything carrying a single timestamp that normalization can rewrite
pub trait Timestamped {
    fn timestamp(&self) -> Timestamp;
    fn set_timestamp(&mut self, timestamp: Timestamp);
}

/// One node's instantaneous metric reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSample {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Cumulative message counters of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCountSample {
    pub timestamp: Timestamp,
    pub sent: i64,
    pub received: i64,
}

/// Per-second message rates derived from two consecutive counter samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: Timestamp,
    pub sent_rate: f64,
    pub received_rate: f64,
}

impl Timestamped for ValueSample {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }
}

impl Timestamped for MessageCountSample {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }
}

/// A fault-injection event recorded during a repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event_ts")]
    pub timestamp: Timestamp,
    /// Value the protocol should converge to once the event has propagated
    pub expected_value: f64,
    /// Nodes whose samples are ignored while this is the active event
    #[serde(rename = "exclude_nodes", default, deserialize_with = "null_as_default")]
    pub excluded_nodes: BTreeSet<NodeId>,
}

impl Event {
    pub fn excludes(&self, node: &str) -> bool {
        self.excluded_nodes.contains(node)
    }
}

/// Job configuration as recorded by the experiment runner.
///
/// Only `expected_value` is consumed by the analysis; the remaining fields
/// are kept for the summary and for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobInfo {
    pub overlay_group: String,
    pub protocol: String,
    #[serde(rename = "exp_name")]
    pub experiment_name: String,
    pub nodes_count: usize,
    pub avg_degree: usize,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    #[serde(rename = "loss")]
    pub loss_percentage: u32,
    #[serde(rename = "repeat")]
    pub repetitions: u32,
    /// Converged value when no event is active
    pub expected_value: f64,
    #[serde(rename = "event")]
    pub event_name: String,
    /// Event parameters, recorded either as a map or an env file path
    pub params: serde_json::Value,
}

/// Metadata of one repetition: job configuration, run timestamps and events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub job: JobInfo,
    #[serde(default)]
    pub repetition: u32,
    #[serde(rename = "exp_start_ts")]
    pub start_experiment_ts: Timestamp,
    #[serde(rename = "events_start_ts", default)]
    pub start_events_ts: Timestamp,
    #[serde(rename = "events_stop_ts", default)]
    pub stop_events_ts: Timestamp,
    #[serde(rename = "exp_stop_ts")]
    pub stop_experiment_ts: Timestamp,
    /// Events in arrival order, not necessarily sorted by timestamp
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<Event>,
}

/// Samples of one node in one repetition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSeries {
    pub values: Vec<ValueSample>,
    pub msg_counts: Vec<MessageCountSample>,
}

/// One repetition of one protocol run
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionRun {
    pub metadata: RunMetadata,
    pub nodes: BTreeMap<NodeId, NodeSeries>,
}

impl RepetitionRun {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            nodes: BTreeMap::new(),
        }
    }
}

/// All repetitions of one protocol run, ordered by repetition id
pub type ProtocolRuns = BTreeMap<RepetitionId, RepetitionRun>;

/// Root aggregate: protocol -> repetition -> run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentDataset {
    pub protocols: BTreeMap<Protocol, ProtocolRuns>,
}

impl ExperimentDataset {
    pub fn is_empty(&self) -> bool {
        self.protocols.values().all(|runs| runs.is_empty())
    }

    pub fn repetition_count(&self) -> usize {
        self.protocols.values().map(|runs| runs.len()).sum()
    }

    /// Every run of every protocol, for in-place passes such as normalization
    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut RepetitionRun> {
        self.protocols.values_mut().flat_map(|runs| runs.values_mut())
    }
}

/// Every node id observed in any repetition of a protocol, sorted
pub fn node_universe(runs: &ProtocolRuns) -> BTreeSet<NodeId> {
    runs.values()
        .flat_map(|run| run.nodes.keys().cloned())
        .collect()
}

/// Aggregated series of one protocol: one series per node plus the cross-node average
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolSeries<T> {
    pub per_node: BTreeMap<NodeId, Vec<T>>,
    pub averaged: Vec<T>,
}

impl<T> Default for ProtocolSeries<T> {
    fn default() -> Self {
        Self {
            per_node: BTreeMap::new(),
            averaged: Vec::new(),
        }
    }
}
