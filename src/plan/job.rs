//! Job plans: what to run, on which overlay, with which fault event.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use super::events::{expected_after_removal, EventError, EventKind, EventParams};
use crate::config::{Protocol, ValidationError};
use crate::topology::{Graph, TopologyError};

/// A single protocol or every protocol of the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolSelection {
    All,
    One(Protocol),
}

impl ProtocolSelection {
    pub fn protocols(&self) -> Vec<Protocol> {
        match self {
            ProtocolSelection::All => Protocol::ALL.to_vec(),
            ProtocolSelection::One(protocol) => vec![*protocol],
        }
    }
}

impl fmt::Display for ProtocolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolSelection::All => write!(f, "all"),
            ProtocolSelection::One(protocol) => write!(f, "{}", protocol),
        }
    }
}

impl TryFrom<String> for ProtocolSelection {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("all") {
            return Ok(ProtocolSelection::All);
        }
        value.parse().map(ProtocolSelection::One)
    }
}

impl From<ProtocolSelection> for String {
    fn from(selection: ProtocolSelection) -> Self {
        selection.to_string()
    }
}

fn default_repetitions() -> u32 {
    1
}

fn default_event() -> String {
    "noop".to_string()
}

/// One planned experiment as read from a job plan file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPlan {
    /// Plans sharing a group run on the same overlay graph
    pub overlay_group: String,
    pub protocol: ProtocolSelection,
    #[serde(rename = "exp_name")]
    pub experiment_name: String,
    pub nodes_count: usize,
    pub avg_degree: usize,
    #[serde(rename = "latency", default)]
    pub latency_ms: u64,
    #[serde(rename = "loss", default)]
    pub loss_percentage: u32,
    #[serde(rename = "repeat", default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(rename = "stabilization_wait", default)]
    pub stabilization_wait_ms: u64,
    #[serde(rename = "event_wait", default)]
    pub event_wait_ms: u64,
    #[serde(rename = "event", default = "default_event")]
    pub event_name: String,
    #[serde(rename = "end_wait", default)]
    pub end_wait_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,
    #[serde(default)]
    pub params: EventParams,
    /// Converged value before any event; the mean of the node ids when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Arc<Graph>>,
}

impl JobPlan {
    /// Run directory name, `<exp_name>_<protocol>`
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.experiment_name, self.protocol)
    }

    pub fn event_kind(&self) -> Result<EventKind, EventError> {
        EventKind::from_name_and_params(&self.event_name, &self.params)
    }

    pub fn expected_value(&self) -> Option<f64> {
        self.expected_value
            .or_else(|| expected_after_removal(self.nodes_count, &[]))
    }
}

/// Plans keyed by overlay group, in file order within each group
pub fn group_plans(plans: &[JobPlan]) -> BTreeMap<&str, Vec<&JobPlan>> {
    let mut groups: BTreeMap<&str, Vec<&JobPlan>> = BTreeMap::new();
    for plan in plans {
        groups.entry(plan.overlay_group.as_str()).or_default().push(plan);
    }
    groups
}

/// Check every plan on its own and every overlay group for consistency
pub fn validate_plans(plans: &[JobPlan]) -> Result<(), ValidationError> {
    for plan in plans {
        if plan.experiment_name.is_empty() {
            return Err(ValidationError::InvalidPlan(format!(
                "plan in group {:?} has an empty exp_name",
                plan.overlay_group
            )));
        }
        if plan.nodes_count == 0 {
            return Err(ValidationError::InvalidPlan(format!(
                "{}: nodes_count must be positive",
                plan.full_name()
            )));
        }
        plan.event_kind()
            .map_err(|e| ValidationError::InvalidPlan(format!("{}: {}", plan.full_name(), e)))?;
    }

    for (group, members) in group_plans(plans) {
        let first = members[0];
        if let Some(other) = members
            .iter()
            .find(|p| p.nodes_count != first.nodes_count || p.avg_degree != first.avg_degree)
        {
            return Err(ValidationError::InvalidPlan(format!(
                "overlay group {:?} mixes {} nodes / degree {} ({}) with {} nodes / degree {} ({})",
                group,
                first.nodes_count,
                first.avg_degree,
                first.full_name(),
                other.nodes_count,
                other.avg_degree,
                other.full_name()
            )));
        }
    }

    Ok(())
}

/// Build one graph per overlay group and share it with every plan of the group
pub fn attach_graphs(plans: &mut [JobPlan]) -> Result<(), TopologyError> {
    let mut graphs: BTreeMap<String, Arc<Graph>> = BTreeMap::new();

    for plan in plans.iter_mut() {
        let graph = match graphs.get(&plan.overlay_group) {
            Some(graph) => Arc::clone(graph),
            None => {
                let graph = Arc::new(Graph::build(plan.nodes_count, plan.avg_degree)?);
                info!(
                    "Overlay group {}: {} nodes, {} edges",
                    plan.overlay_group,
                    graph.node_count(),
                    graph.edge_count()
                );
                graphs.insert(plan.overlay_group.clone(), Arc::clone(&graph));
                graph
            }
        };
        plan.graph = Some(graph);
    }

    Ok(())
}

/// Expand `all` into one plan per protocol
pub fn unwind_plans(plans: Vec<JobPlan>) -> Vec<JobPlan> {
    plans
        .into_iter()
        .flat_map(|plan| {
            plan.protocol
                .protocols()
                .into_iter()
                .map(move |protocol| JobPlan {
                    protocol: ProtocolSelection::One(protocol),
                    ..plan.clone()
                })
        })
        .collect()
}

/// Read a JSON array of job plans
pub fn load_job_plans(path: &Path) -> Result<Vec<JobPlan>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("Failed to open job plans {}", path.display()))?;
    let plans: Vec<JobPlan> = serde_json::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse job plans {}", path.display()))?;
    info!("Loaded {} job plans from {}", plans.len(), path.display());
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(group: &str, protocol: &str, nodes: usize, degree: usize) -> JobPlan {
        serde_json::from_value(serde_json::json!({
            "overlay_group": group,
            "protocol": protocol,
            "exp_name": "kill10",
            "nodes_count": nodes,
            "avg_degree": degree,
            "event": "kill_percent",
            "params": {"percent": "10"}
        }))
        .unwrap()
    }

    #[test]
    fn test_plan_parsing_defaults() {
        let plan = plan("g1", "fu", 10, 3);
        assert_eq!(plan.protocol, ProtocolSelection::One(Protocol::FlowUpdating));
        assert_eq!(plan.repetitions, 1);
        assert_eq!(plan.latency_ms, 0);
        assert!(plan.graph.is_none());
        assert_eq!(plan.full_name(), "kill10_fu");
        assert_eq!(plan.expected_value(), Some(5.5));
        assert_eq!(plan.event_kind(), Ok(EventKind::KillPercent { percent: 10 }));
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let result: Result<JobPlan, _> = serde_json::from_value(serde_json::json!({
            "overlay_group": "g", "protocol": "gossip", "exp_name": "x",
            "nodes_count": 3, "avg_degree": 2
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_plans() {
        assert!(validate_plans(&[plan("g1", "hi", 10, 3), plan("g1", "all", 10, 3)]).is_ok());
        assert!(validate_plans(&[plan("g1", "hi", 10, 3), plan("g2", "hi", 20, 4)]).is_ok());

        let mixed = validate_plans(&[plan("g1", "hi", 10, 3), plan("g1", "fu", 10, 4)]);
        assert!(matches!(mixed, Err(ValidationError::InvalidPlan(_))));

        let mut bad_event = plan("g1", "hi", 10, 3);
        bad_event.event_name = "meteor".to_string();
        assert!(validate_plans(&[bad_event]).is_err());

        assert!(validate_plans(&[plan("g1", "hi", 0, 3)]).is_err());
    }

    #[test]
    fn test_attach_graphs_shares_per_group() {
        let mut plans = vec![plan("g1", "hi", 10, 3), plan("g2", "hi", 6, 2), plan("g1", "fu", 10, 3)];
        attach_graphs(&mut plans).unwrap();

        let first = plans[0].graph.as_ref().unwrap();
        let third = plans[2].graph.as_ref().unwrap();
        assert!(Arc::ptr_eq(first, third));
        assert_eq!(first.node_count(), 10);
        assert_eq!(plans[1].graph.as_ref().unwrap().node_count(), 6);
    }

    #[test]
    fn test_unwind_all() {
        let mut plans = vec![plan("g1", "all", 8, 3), plan("g1", "dd", 8, 3)];
        attach_graphs(&mut plans).unwrap();
        let unwound = unwind_plans(plans);

        let names: Vec<_> = unwound.iter().map(|p| p.full_name()).collect();
        assert_eq!(
            names,
            vec!["kill10_hi", "kill10_fu", "kill10_ep", "kill10_dd", "kill10_rr", "kill10_dd"]
        );
        let shared = unwound[0].graph.as_ref().unwrap();
        assert!(unwound.iter().all(|p| Arc::ptr_eq(p.graph.as_ref().unwrap(), shared)));
    }

    #[test]
    fn test_serialize_with_graph() {
        let mut plans = vec![plan("g1", "ep", 3, 2)];
        attach_graphs(&mut plans).unwrap();
        let json = serde_json::to_value(&plans[0]).unwrap();

        assert_eq!(json["protocol"], "ep");
        assert_eq!(json["exp_name"], "kill10");
        assert_eq!(json["graph"]["degree"], serde_json::json!([2, 2, 2]));
    }
}
