//! Cycle detection by three-colour depth-first search.
//!
//! A back edge (to a node still on the DFS stack) closes exactly one cycle:
//! the stack segment from that node to the current one. Every back edge ends
//! up in some reported cycle, so excluding all reported edges leaves the
//! graph acyclic.

use super::{DependencyGraph, EdgeId, NodeId};
use crate::models::{Dependency, Task};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// One closed chain of dependencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    /// Nodes in traversal order; the first node is repeated at the end.
    pub nodes: Vec<NodeId>,
    /// Edges along the chain, `edges[i]` joining `nodes[i]` to `nodes[i + 1]`.
    pub edges: Vec<EdgeId>,
}

#[derive(Clone, Copy)]
struct Frame {
    node: NodeId,
    /// Next position in the node's outgoing edge list.
    cursor: usize,
}

pub struct CycleDetector<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> CycleDetector<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Find cycles among the graph's active edges.
    pub fn find_cycles(&self) -> Vec<Cycle> {
        let n = self.graph.node_count();
        let mut color = vec![Color::Unvisited; n];
        let mut cycles = Vec::new();

        for root in 0..n {
            if color[root] != Color::Unvisited {
                continue;
            }

            color[root] = Color::InProgress;
            let mut stack = vec![Frame {
                node: root,
                cursor: 0,
            }];
            // entry_edges[i] leads from stack[i] into stack[i + 1]
            let mut entry_edges: Vec<EdgeId> = Vec::new();

            while let Some(&Frame { node, cursor }) = stack.last() {
                let outgoing = self.graph.outgoing_all(node);
                if cursor >= outgoing.len() {
                    color[node] = Color::Done;
                    stack.pop();
                    entry_edges.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.cursor += 1;
                }

                let edge_id = outgoing[cursor];
                if self.graph.is_excluded(edge_id) {
                    continue;
                }
                let Some(next) = self.graph.edge(edge_id).map(|e| e.dependent) else {
                    continue;
                };

                match color[next] {
                    Color::Unvisited => {
                        color[next] = Color::InProgress;
                        entry_edges.push(edge_id);
                        stack.push(Frame {
                            node: next,
                            cursor: 0,
                        });
                    }
                    Color::InProgress => {
                        let Some(from) = stack.iter().position(|f| f.node == next) else {
                            continue;
                        };
                        let mut nodes: Vec<NodeId> = stack[from..].iter().map(|f| f.node).collect();
                        nodes.push(next);
                        let mut edges: Vec<EdgeId> = entry_edges[from..].to_vec();
                        edges.push(edge_id);
                        cycles.push(Cycle { nodes, edges });
                    }
                    Color::Done => {}
                }
            }
        }

        cycles
    }

    /// Render a cycle as `"A -> B -> A"` using task names.
    pub fn describe(&self, cycle: &Cycle) -> String {
        cycle
            .nodes
            .iter()
            .map(|&node| self.graph.node_name(node))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Describe every dependency cycle among `tasks`, one chain per cycle.
pub fn detect_cycles(tasks: &[Task], dependencies: &[Dependency]) -> Vec<String> {
    let (graph, _) = DependencyGraph::build(tasks, dependencies);
    let detector = CycleDetector::new(&graph);
    detector
        .find_cycles()
        .iter()
        .map(|cycle| detector.describe(cycle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyType;
    use chrono::NaiveDate;

    fn make_task(id: &str) -> Task {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        Task::new(
            id,
            id.to_uppercase(),
            day.and_hms_opt(8, 0, 0).unwrap(),
            day.and_hms_opt(16, 0, 0).unwrap(),
        )
    }

    fn fs(id: &str, origin: &str, dependent: &str) -> Dependency {
        Dependency::new(id, origin, dependent, DependencyType::FinishToStart, 0)
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let tasks = vec![make_task("a"), make_task("b"), make_task("c")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "b", "c"), fs("d3", "a", "c")];
        assert!(detect_cycles(&tasks, &deps).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let tasks = vec![make_task("a"), make_task("b")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "b", "a")];
        assert_eq!(detect_cycles(&tasks, &deps), vec!["A -> B -> A".to_string()]);
    }

    #[test]
    fn test_cycle_edges_follow_chain() {
        let tasks = vec![make_task("a"), make_task("b"), make_task("c")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "b", "c"), fs("d3", "c", "a")];
        let (graph, _) = DependencyGraph::build(&tasks, &deps);
        let cycles = CycleDetector::new(&graph).find_cycles();

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].nodes, vec![0, 1, 2, 0]);
        assert_eq!(cycles[0].edges, vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_reported_from_entry_point() {
        // x feeds into the b <-> c loop but is not part of it
        let tasks = vec![make_task("x"), make_task("b"), make_task("c")];
        let deps = vec![fs("d1", "x", "b"), fs("d2", "b", "c"), fs("d3", "c", "b")];
        assert_eq!(detect_cycles(&tasks, &deps), vec!["B -> C -> B".to_string()]);
    }

    #[test]
    fn test_disjoint_cycles_reported_separately() {
        let tasks = vec![make_task("a"), make_task("b"), make_task("c"), make_task("d")];
        let deps = vec![
            fs("d1", "a", "b"),
            fs("d2", "b", "a"),
            fs("d3", "c", "d"),
            fs("d4", "d", "c"),
        ];
        assert_eq!(
            detect_cycles(&tasks, &deps),
            vec!["A -> B -> A".to_string(), "C -> D -> C".to_string()]
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let tasks = vec![make_task("a")];
        let deps = vec![fs("d1", "a", "a")];
        assert_eq!(detect_cycles(&tasks, &deps), vec!["A -> A".to_string()]);
    }

    #[test]
    fn test_excluding_cycle_edges_leaves_acyclic_graph() {
        let tasks = vec![make_task("a"), make_task("b"), make_task("c")];
        let deps = vec![
            fs("d1", "a", "b"),
            fs("d2", "b", "a"),
            fs("d3", "b", "c"),
            fs("d4", "c", "b"),
            fs("d5", "a", "c"),
        ];
        let (mut graph, _) = DependencyGraph::build(&tasks, &deps);
        let cycles = CycleDetector::new(&graph).find_cycles();
        assert_eq!(cycles.len(), 2);

        for cycle in &cycles {
            for &edge_id in &cycle.edges {
                graph.exclude(edge_id);
            }
        }
        assert!(CycleDetector::new(&graph).find_cycles().is_empty());
        // Only a -> c survives
        let active: Vec<&str> = graph
            .active_edges_in_order()
            .into_iter()
            .filter_map(|e| graph.edge(e))
            .map(|e| e.dependency_id.as_str())
            .collect();
        assert_eq!(active, vec!["d5"]);
    }
}
