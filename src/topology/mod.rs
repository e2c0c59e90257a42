//! Overlay topology module.
//!
//! Generates the neighbor graph protocol nodes are deployed with. One graph is
//! built per overlay group and shared by every protocol variant of the group.

pub mod graph;

pub use graph::{Graph, TopologyError};
