//! Offline experiment planning.
//!
//! Validates job plans, attaches one overlay graph per group, expands
//! `all` into per-protocol plans and previews the ground truth each fault
//! event should produce.

pub mod events;
pub mod job;

use log::info;
use serde::Serialize;

pub use events::{planned_events, EventError, EventKind, EventParams, PlannedEvent};
pub use job::{attach_graphs, load_job_plans, unwind_plans, validate_plans, JobPlan, ProtocolSelection};

/// A validated, single-protocol plan with its predicted event outcomes
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPlan {
    #[serde(flatten)]
    pub plan: JobPlan,
    pub run_dir: String,
    pub event_kind: EventKind,
    pub planned_events: Vec<PlannedEvent>,
}

/// Validate, attach graphs and unwind, in that order
pub fn resolve_plans(mut plans: Vec<JobPlan>) -> color_eyre::Result<Vec<ResolvedPlan>> {
    validate_plans(&plans)?;
    attach_graphs(&mut plans)?;

    let resolved = unwind_plans(plans)
        .into_iter()
        .map(|mut plan| -> Result<ResolvedPlan, EventError> {
            let event_kind = plan.event_kind()?;
            plan.expected_value = plan.expected_value();
            Ok(ResolvedPlan {
                run_dir: plan.full_name(),
                planned_events: planned_events(event_kind, plan.nodes_count),
                event_kind,
                plan,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Resolved {} job plans", resolved.len());
    Ok(resolved)
}
