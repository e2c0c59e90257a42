//! Overlay graph construction.
//!
//! Builds the undirected neighbor graph that protocol nodes are wired with.
//! A path backbone (`0-1-2-...-n-1`) keeps the graph connected, then extra
//! edges are added greedily until nodes reach the target degree.

use std::collections::VecDeque;

use log::debug;
use serde::{Deserialize, Serialize};

/// Errors raised while building an overlay graph
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Node count must be positive, got {0}")]
    InvalidNodeCount(usize),
}

/// Undirected, unweighted overlay graph.
///
/// `adjacency[u]` lists the neighbors of `u` in the order edges were added,
/// `degree[u] == adjacency[u].len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(rename = "edges")]
    adjacency: Vec<Vec<usize>>,
    degree: Vec<usize>,
}

impl Graph {
    /// Build a graph for `node_count` nodes aiming at `target_degree` neighbors each.
    ///
    /// The backbone edges count toward the cap, so when `target_degree < 2`
    /// interior nodes still end up with degree 2. Nodes late in the ordering
    /// may fall short of the target when no eligible partner is left.
    pub fn build(node_count: usize, target_degree: usize) -> Result<Self, TopologyError> {
        if node_count == 0 {
            return Err(TopologyError::InvalidNodeCount(node_count));
        }

        let mut graph = Self {
            adjacency: vec![Vec::new(); node_count],
            degree: vec![0; node_count],
        };

        for i in 0..node_count - 1 {
            graph.add_edge(i, i + 1);
        }

        for u in 0..node_count {
            for v in (u + 2)..node_count {
                if graph.degree[u] >= target_degree {
                    break;
                }
                if graph.degree[v] < target_degree && !graph.contains_edge(u, v) {
                    graph.add_edge(u, v);
                }
            }
        }

        debug!(
            "Built overlay graph: {} nodes, {} edges, target degree {}, average degree {:.2}",
            node_count,
            graph.edge_count(),
            target_degree,
            graph.average_degree()
        );

        Ok(graph)
    }

    fn add_edge(&mut self, u: usize, v: usize) {
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
        self.degree[u] += 1;
        self.degree[v] += 1;
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.degree.iter().sum::<usize>() / 2
    }

    /// Neighbors of `node`, empty if the node does not exist
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, node: usize) -> usize {
        self.degree.get(node).copied().unwrap_or(0)
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degree
    }

    pub fn contains_edge(&self, u: usize, v: usize) -> bool {
        self.neighbors(u).contains(&v)
    }

    pub fn average_degree(&self) -> f64 {
        if self.degree.is_empty() {
            0.0
        } else {
            self.degree.iter().sum::<usize>() as f64 / self.degree.len() as f64
        }
    }

    /// Breadth-first reachability check from node 0
    pub fn is_connected(&self) -> bool {
        let n = self.node_count();
        if n == 0 {
            return true;
        }

        let mut visited = vec![false; n];
        let mut queue = VecDeque::from([0usize]);
        visited[0] = true;
        let mut reached = 1;

        while let Some(u) = queue.pop_front() {
            for &v in &self.adjacency[u] {
                if !visited[v] {
                    visited[v] = true;
                    reached += 1;
                    queue.push_back(v);
                }
            }
        }

        reached == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ring_degree(node: usize, n: usize) -> usize {
        match n {
            1 => 0,
            _ if node == 0 || node == n - 1 => 1,
            _ => 2,
        }
    }

    #[test]
    fn test_rejects_empty_graph() {
        assert_eq!(Graph::build(0, 3), Err(TopologyError::InvalidNodeCount(0)));
    }

    #[test]
    fn test_single_node() {
        let g = Graph::build(1, 4).unwrap();
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert!(g.is_connected());
    }

    #[test]
    fn test_backbone_only_when_degree_is_low() {
        let g = Graph::build(5, 1).unwrap();
        assert_eq!(g.edge_count(), 4);
        assert_eq!(g.degrees(), &[1, 2, 2, 2, 1]);
    }

    #[test]
    fn test_small_graph_exact_adjacency() {
        // backbone 0-1-2-3-4, then 0-2? no (2 is full), 0-3? no, 0-4 yes
        let g = Graph::build(5, 2).unwrap();
        assert_eq!(g.neighbors(0), &[1, 4]);
        assert_eq!(g.neighbors(4), &[3, 0]);
        assert_eq!(g.degrees(), &[2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_degree_three_walkthrough() {
        let g = Graph::build(6, 3).unwrap();
        // u=0: adds 0-2 then 0-3 (degree 3 reached)
        assert_eq!(g.neighbors(0), &[1, 2, 3]);
        // u=1: 1-3 rejected (3 full), adds 1-4
        assert_eq!(g.neighbors(1), &[0, 2, 4]);
        // 2, 3 and 4 are full; node 5 has no candidate partner left
        assert_eq!(g.degree(5), 1);
        assert!(g.is_connected());
    }

    #[test]
    fn test_structural_invariants_across_sizes() {
        for n in 1..40 {
            for m in 0..8 {
                let g = Graph::build(n, m).unwrap();
                assert!(g.is_connected(), "n={} m={} not connected", n, m);

                for u in 0..n {
                    let neighbors = g.neighbors(u);
                    let unique: HashSet<_> = neighbors.iter().collect();
                    assert_eq!(unique.len(), neighbors.len(), "duplicate neighbor at {}", u);
                    assert!(!neighbors.contains(&u), "self loop at {}", u);
                    assert_eq!(g.degree(u), neighbors.len());
                    for &v in neighbors {
                        assert!(g.contains_edge(v, u), "asymmetric edge {}-{}", u, v);
                    }
                    assert!(
                        g.degree(u) <= m.max(ring_degree(u, n)),
                        "n={} m={} node {} degree {}",
                        n,
                        m,
                        u,
                        g.degree(u)
                    );
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_queries() {
        let g = Graph::build(3, 2).unwrap();
        assert!(g.neighbors(10).is_empty());
        assert_eq!(g.degree(10), 0);
        assert!(!g.contains_edge(10, 0));
    }

    #[test]
    fn test_json_shape() {
        let g = Graph::build(3, 2).unwrap();
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["edges"][0], serde_json::json!([1, 2]));
        assert_eq!(json["edges"][1], serde_json::json!([0, 2]));
        assert_eq!(json["degree"], serde_json::json!([2, 2, 2]));
    }
}
