//! Connectivity Graph
//!
//! Bipartite petgraph view of a schematic snapshot: part nodes on one side,
//! net nodes on the other, one edge per net member carrying the pin
//! designator. The librarian rebuilds it on every refresh and uses it for the
//! 1-hop traversal behind context bubbles.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use crate::model::{Component, Net};

/// Node type in the connectivity graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNode {
    /// A part, keyed by refdes. Net members that name no known component
    /// still get a node so traversal sees them.
    Part(String),

    /// A net, as an index into the snapshot's net list
    Net(usize),
}

/// Graph of which parts touch which nets
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    graph: DiGraph<GraphNode, String>,
    part_indices: HashMap<String, NodeIndex>,
    net_indices: Vec<NodeIndex>,
}

impl Connectivity {
    pub fn build(components: &[Component], nets: &[Net]) -> Self {
        let mut conn = Self::default();

        for component in components {
            conn.part_node(&component.refdes);
        }

        for (i, net) in nets.iter().enumerate() {
            let net_idx = conn.graph.add_node(GraphNode::Net(i));
            conn.net_indices.push(net_idx);
            for (refdes, pin) in &net.members {
                let part_idx = conn.part_node(refdes);
                conn.graph.add_edge(part_idx, net_idx, pin.clone());
            }
        }

        tracing::debug!(
            "Built connectivity graph: {} nodes, {} edges",
            conn.graph.node_count(),
            conn.graph.edge_count()
        );
        conn
    }

    fn part_node(&mut self, refdes: &str) -> NodeIndex {
        if let Some(&idx) = self.part_indices.get(refdes) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Part(refdes.to_string()));
        self.part_indices.insert(refdes.to_string(), idx);
        idx
    }

    /// Indices of nets with at least one member in `refdes`, ascending.
    pub fn nets_touching(&self, refdes: &BTreeSet<String>) -> Vec<usize> {
        let found: BTreeSet<usize> = refdes
            .iter()
            .filter_map(|r| self.part_indices.get(r))
            .flat_map(|&idx| self.graph.edges_directed(idx, Direction::Outgoing))
            .filter_map(|edge| match self.graph.node_weight(edge.target()) {
                Some(GraphNode::Net(i)) => Some(*i),
                _ => None,
            })
            .collect();
        found.into_iter().collect()
    }

    /// Refdes of every part on net `net`.
    pub fn parts_on_net(&self, net: usize) -> BTreeSet<&str> {
        let Some(&net_idx) = self.net_indices.get(net) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(net_idx, Direction::Incoming)
            .filter_map(|edge| match self.graph.node_weight(edge.source()) {
                Some(GraphNode::Part(r)) => Some(r.as_str()),
                _ => None,
            })
            .collect()
    }

    /// One hop out from `primary`: the nets they touch, and every other part
    /// on those nets.
    pub fn one_hop(&self, primary: &BTreeSet<String>) -> (Vec<usize>, BTreeSet<String>) {
        let nets = self.nets_touching(primary);
        let neighbors = nets
            .iter()
            .flat_map(|&n| self.parts_on_net(n))
            .filter(|r| !primary.contains(*r))
            .map(str::to_string)
            .collect();
        (nets, neighbors)
    }
}
