//! In-memory dependency graph for one resolution pass.
//!
//! Nodes are positions in the task slice the graph was built from; edges are
//! the dependencies whose endpoints both resolved to a node. Edges can be
//! excluded (cycle members) without being removed, so diagnostics can still
//! refer to them.

mod cycles;

pub use cycles::{detect_cycles, Cycle, CycleDetector};

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::models::{Dependency, DependencyType, Task};

/// Index of a task in the slice the graph was built from.
pub type NodeId = usize;
/// Index of an edge in [`DependencyGraph::edges`].
pub type EdgeId = usize;

/// One active-or-excluded constraint between two tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub dependency_id: String,
    pub origin: NodeId,
    pub dependent: NodeId,
    pub dependency_type: DependencyType,
    pub lag_minutes: i64,
}

/// A dependency that could not become an edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DanglingDependency {
    pub dependency_id: String,
    pub missing_task_id: String,
}

impl DanglingDependency {
    pub fn describe(&self) -> String {
        format!(
            "Dependency {} ignored: unknown task '{}'",
            self.dependency_id, self.missing_task_id
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    task_names: Vec<String>,
    edges: Vec<Edge>,
    /// Outgoing edge ids per node, in dependency input order.
    outgoing: Vec<Vec<EdgeId>>,
    excluded: FxHashSet<EdgeId>,
}

impl DependencyGraph {
    /// Build the graph over `tasks`, dropping dependencies that reference a
    /// task id not present in `tasks`.
    pub fn build(tasks: &[Task], dependencies: &[Dependency]) -> (Self, Vec<DanglingDependency>) {
        let mut index: FxHashMap<&str, NodeId> =
            FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default());
        for (node, task) in tasks.iter().enumerate() {
            // First occurrence wins for duplicated ids
            index.entry(task.id.as_str()).or_insert(node);
        }

        let mut graph = DependencyGraph {
            task_names: tasks.iter().map(|t| t.name.clone()).collect(),
            edges: Vec::with_capacity(dependencies.len()),
            outgoing: vec![Vec::new(); tasks.len()],
            excluded: FxHashSet::default(),
        };
        let mut dangling = Vec::new();

        for dep in dependencies {
            let origin = index.get(dep.origin_task_id.as_str()).copied();
            let dependent = index.get(dep.dependent_task_id.as_str()).copied();
            match (origin, dependent) {
                (Some(origin), Some(dependent)) => {
                    let edge_id = graph.edges.len();
                    graph.edges.push(Edge {
                        dependency_id: dep.id.clone(),
                        origin,
                        dependent,
                        dependency_type: dep.dependency_type,
                        lag_minutes: dep.lag_minutes,
                    });
                    graph.outgoing[origin].push(edge_id);
                }
                (None, _) => dangling.push(DanglingDependency {
                    dependency_id: dep.id.clone(),
                    missing_task_id: dep.origin_task_id.clone(),
                }),
                (Some(_), None) => dangling.push(DanglingDependency {
                    dependency_id: dep.id.clone(),
                    missing_task_id: dep.dependent_task_id.clone(),
                }),
            }
        }

        (graph, dangling)
    }

    pub fn node_count(&self) -> usize {
        self.task_names.len()
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        self.task_names.get(node).map(String::as_str).unwrap_or("?")
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(edge_id)
    }

    /// Remove an edge from propagation; it stays addressable by id.
    pub fn exclude(&mut self, edge_id: EdgeId) {
        self.excluded.insert(edge_id);
    }

    pub fn is_excluded(&self, edge_id: EdgeId) -> bool {
        self.excluded.contains(&edge_id)
    }

    /// Active outgoing edges of `node`; none for an unknown node.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |e| !self.excluded.contains(e))
    }

    pub(crate) fn outgoing_all(&self, node: NodeId) -> &[EdgeId] {
        &self.outgoing[node]
    }

    /// Order nodes over active edges using Kahn's algorithm.
    ///
    /// Ties are broken by input position so the order is deterministic. Nodes
    /// still constrained by a cycle (none, once cycles are excluded) are
    /// appended in input order.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let n = self.node_count();
        let mut in_degree = vec![0usize; n];
        for (edge_id, edge) in self.edges.iter().enumerate() {
            if !self.is_excluded(edge_id) {
                in_degree[edge.dependent] += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = (0..n).filter(|&node| in_degree[node] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];

        while let Some(node) = queue.pop_front() {
            order.push(node);
            placed[node] = true;
            for edge_id in self.outgoing(node) {
                let dependent = self.edges[edge_id].dependent;
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            order.extend((0..n).filter(|&node| !placed[node]));
        }
        order
    }

    /// Active edges sorted by the topological rank of their origin, so every
    /// edge into a task is applied before any edge out of it.
    pub fn active_edges_in_order(&self) -> Vec<EdgeId> {
        let order = self.topological_order();
        order
            .into_iter()
            .flat_map(|node| self.outgoing(node).collect::<Vec<_>>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn position(order: &[NodeId], node: NodeId) -> usize {
        order.iter().position(|&n| n == node).unwrap()
    }

    #[test]
    fn test_build_skips_dangling_dependencies() {
        let tasks = vec![make_task("a"), make_task("b")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "a", "ghost"), fs("d3", "nope", "b")];
        let (graph, dangling) = DependencyGraph::build(&tasks, &deps);

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edge(0).map(|e| e.dependency_id.as_str()), Some("d1"));
        assert_eq!(graph.edge(1), None);
        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].missing_task_id, "ghost");
        assert_eq!(dangling[1].missing_task_id, "nope");
        assert_eq!(dangling[0].describe(), "Dependency d2 ignored: unknown task 'ghost'");
    }

    #[test]
    fn test_topological_order_chain() {
        // Input order deliberately reversed
        let tasks = vec![make_task("c"), make_task("b"), make_task("a")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "b", "c")];
        let (graph, _) = DependencyGraph::build(&tasks, &deps);

        assert_eq!(graph.topological_order(), vec![2, 1, 0]);
        assert_eq!(graph.active_edges_in_order(), vec![0, 1]);
    }

    #[test]
    fn test_topological_order_diamond() {
        let tasks = vec![make_task("a"), make_task("b"), make_task("c"), make_task("d")];
        let deps = vec![
            fs("d1", "a", "b"),
            fs("d2", "a", "c"),
            fs("d3", "b", "d"),
            fs("d4", "c", "d"),
        ];
        let (graph, _) = DependencyGraph::build(&tasks, &deps);
        let order = graph.topological_order();

        assert_eq!(order.len(), 4);
        assert!(position(&order, 0) < position(&order, 1));
        assert!(position(&order, 0) < position(&order, 2));
        assert!(position(&order, 1) < position(&order, 3));
        assert!(position(&order, 2) < position(&order, 3));
    }

    #[test]
    fn test_excluded_edges_are_inactive() {
        let tasks = vec![make_task("a"), make_task("b")];
        let deps = vec![fs("d1", "a", "b"), fs("d2", "b", "a")];
        let (mut graph, _) = DependencyGraph::build(&tasks, &deps);

        // Cyclic: both nodes get appended
        assert_eq!(graph.topological_order().len(), 2);

        graph.exclude(1);
        assert!(graph.is_excluded(1));
        assert_eq!(graph.outgoing(1).count(), 0);
        assert_eq!(graph.outgoing(7).count(), 0);
        assert_eq!(graph.topological_order(), vec![0, 1]);
        assert_eq!(graph.active_edges_in_order(), vec![0]);
    }
}
