//! Fault-injection event catalogue.
//!
//! Every node's input is its 1-based id, so the expected converged value
//! after an event can be predicted without running anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event parameters as written in a job plan, e.g. `{"percent": "10"}`
pub type EventParams = BTreeMap<String, String>;

/// Multiplier used by a single input edit
pub const EDIT_ONCE_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("Unknown event {0:?}")]
    UnknownEvent(String),
    #[error("Event {event} requires parameter {name:?}")]
    MissingParameter { event: &'static str, name: &'static str },
    #[error("Event {event}: parameter {name:?} has invalid value {value:?}")]
    InvalidParameter {
        event: &'static str,
        name: &'static str,
        value: String,
    },
}

/// A resolved fault-injection event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Noop,
    /// Kill the given percentage of non-edge nodes
    KillPercent { percent: u32 },
    /// Kill the node with the highest id
    KillRoot,
    /// Rewrite the input of a percentage of nodes once
    EditInputOnce { percent: u32 },
    /// Rewrite the input of every node `total_edits` times, `interval_s` apart
    EditInputContinuous { interval_s: u64, total_edits: u32 },
}

impl EventKind {
    pub const NAMES: [&'static str; 5] = [
        "noop",
        "kill_percent",
        "kill_root",
        "edit_input_once",
        "edit_input_continuous",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Noop => "noop",
            EventKind::KillPercent { .. } => "kill_percent",
            EventKind::KillRoot => "kill_root",
            EventKind::EditInputOnce { .. } => "edit_input_once",
            EventKind::EditInputContinuous { .. } => "edit_input_continuous",
        }
    }

    /// Resolve an event name and its string parameters
    pub fn from_name_and_params(name: &str, params: &EventParams) -> Result<Self, EventError> {
        match name {
            "noop" => Ok(EventKind::Noop),
            "kill_percent" => Ok(EventKind::KillPercent {
                percent: percent_param("kill_percent", params)?,
            }),
            "kill_root" => Ok(EventKind::KillRoot),
            "edit_input_once" => Ok(EventKind::EditInputOnce {
                percent: percent_param("edit_input_once", params)?,
            }),
            "edit_input_continuous" => Ok(EventKind::EditInputContinuous {
                interval_s: param("edit_input_continuous", params, "interval")?,
                total_edits: param("edit_input_continuous", params, "total_edits")?,
            }),
            other => Err(EventError::UnknownEvent(other.to_string())),
        }
    }
}

fn param<T: std::str::FromStr>(
    event: &'static str,
    params: &EventParams,
    name: &'static str,
) -> Result<T, EventError> {
    let raw = params
        .get(name)
        .ok_or(EventError::MissingParameter { event, name })?;
    raw.trim().parse().map_err(|_| EventError::InvalidParameter {
        event,
        name,
        value: raw.clone(),
    })
}

fn percent_param(event: &'static str, params: &EventParams) -> Result<u32, EventError> {
    let percent: u32 = param(event, params, "percent")?;
    if !(1..=100).contains(&percent) {
        return Err(EventError::InvalidParameter {
            event,
            name: "percent",
            value: percent.to_string(),
        });
    }
    Ok(percent)
}

/// Pick roughly `percent`% of the nodes, never the first or the last id.
///
/// Candidates are ids `2..=n-1`; every `max(100 / percent, 1)`-th one is
/// selected starting from the first.
pub fn select_percentage_of_nodes(node_count: usize, percent: u32) -> Vec<usize> {
    if percent == 0 || node_count < 3 {
        return Vec::new();
    }
    let step = (100 / percent as usize).max(1);
    (2..node_count).step_by(step).collect()
}

/// Mean input once `removed` nodes are gone; `None` when nobody is left
pub fn expected_after_removal(node_count: usize, removed: &[usize]) -> Option<f64> {
    let remaining = node_count.checked_sub(removed.len()).filter(|&c| c > 0)?;
    let total = (node_count * (node_count + 1) / 2) as f64;
    let removed_sum: usize = removed.iter().sum();
    Some((total - removed_sum as f64) / remaining as f64)
}

/// Mean input after the `i`-th edited node's input became `multiplier * (i + 1)`
pub fn expected_after_edit(node_count: usize, edited: &[usize], multiplier: u64) -> Option<f64> {
    if node_count == 0 {
        return None;
    }
    let mut total = (node_count * (node_count + 1) / 2) as f64;
    for (i, &id) in edited.iter().enumerate() {
        total += (multiplier * (i as u64 + 1)) as f64 - id as f64;
    }
    Some(total / node_count as f64)
}

/// Node directory and container names for ids
pub fn node_names(ids: &[usize]) -> Vec<String> {
    ids.iter().map(|id| format!("node_{}", id)).collect()
}

/// Predicted outcome of one event occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEvent {
    /// Seconds after the first occurrence of the event
    pub offset_s: u64,
    pub expected_value: Option<f64>,
    pub exclude_nodes: Vec<String>,
}

/// Preview every occurrence an event kind produces on `node_count` nodes
pub fn planned_events(kind: EventKind, node_count: usize) -> Vec<PlannedEvent> {
    let removal = |removed: Vec<usize>| PlannedEvent {
        offset_s: 0,
        expected_value: expected_after_removal(node_count, &removed),
        exclude_nodes: node_names(&removed),
    };

    match kind {
        EventKind::Noop => Vec::new(),
        EventKind::KillPercent { percent } => {
            vec![removal(select_percentage_of_nodes(node_count, percent))]
        }
        EventKind::KillRoot if node_count == 0 => Vec::new(),
        EventKind::KillRoot => vec![removal(vec![node_count])],
        EventKind::EditInputOnce { percent } => {
            let edited = select_percentage_of_nodes(node_count, percent);
            vec![PlannedEvent {
                offset_s: 0,
                expected_value: expected_after_edit(node_count, &edited, EDIT_ONCE_MULTIPLIER),
                exclude_nodes: Vec::new(),
            }]
        }
        EventKind::EditInputContinuous {
            interval_s,
            total_edits,
        } => {
            let everyone: Vec<usize> = (1..=node_count).collect();
            (0..total_edits)
                .map(|edit| PlannedEvent {
                    offset_s: edit as u64 * interval_s,
                    expected_value: expected_after_edit(node_count, &everyone, edit as u64 + 2),
                    exclude_nodes: Vec::new(),
                })
                .collect()
        }
    }
}
