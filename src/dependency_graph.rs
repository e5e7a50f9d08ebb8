//! Directed "must finish before" graph over request ids.
//!
//! Forward adjacency lists the requests a request's completion enables;
//! reverse adjacency lists the requests it waits on. Cycles are allowed to
//! exist and are reported on demand; orderings refuse to run while one does.
//! All walks use explicit stacks, so long dependency chains are safe.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::request::ServiceRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub vertices: usize,
    pub edges: usize,
    pub roots: usize,
    pub leaves: usize,
    pub cyclic: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    requests: BTreeMap<u64, ServiceRequest>,
    /// from -> requests that can start once `from` completes
    dependents: BTreeMap<u64, Vec<u64>>,
    /// to -> requests that must complete before `to`
    dependencies: BTreeMap<u64, Vec<u64>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.dependents.clear();
        self.dependencies.clear();
    }

    pub fn get(&self, id: u64) -> Option<&ServiceRequest> {
        self.requests.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.requests.contains_key(&id)
    }

    /// Registers a vertex. Re-registering keeps its edges and replaces the record.
    ///
    /// Returns true when the vertex is new.
    pub fn add_request(&mut self, request: ServiceRequest) -> bool {
        let id = request.id;
        let is_new = self.requests.insert(id, request).is_none();
        self.dependents.entry(id).or_default();
        self.dependencies.entry(id).or_default();
        is_new
    }

    /// Replaces the stored record of a known vertex without touching edges.
    pub fn refresh_request(&mut self, request: ServiceRequest) -> bool {
        match self.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                true
            }
            None => false,
        }
    }

    /// Drops a vertex together with every edge touching it.
    pub fn remove_request(&mut self, id: u64) -> Option<ServiceRequest> {
        let removed = self.requests.remove(&id)?;
        for dependent in self.dependents.remove(&id).unwrap_or_default() {
            if let Some(list) = self.dependencies.get_mut(&dependent) {
                list.retain(|&other| other != id);
            }
        }
        for dependency in self.dependencies.remove(&id).unwrap_or_default() {
            if let Some(list) = self.dependents.get_mut(&dependency) {
                list.retain(|&other| other != id);
            }
        }
        Some(removed)
    }

    /// Records that `from` must complete before `to`.
    ///
    /// Returns Ok(false) when the edge already exists.
    pub fn add_dependency(&mut self, from: u64, to: u64) -> Result<bool> {
        for id in [from, to] {
            if !self.contains(id) {
                return Err(EngineError::UnknownRequest(id));
            }
        }
        if self.has_dependency(from, to) {
            return Ok(false);
        }
        self.dependents.entry(from).or_default().push(to);
        self.dependencies.entry(to).or_default().push(from);
        Ok(true)
    }

    pub fn remove_dependency(&mut self, from: u64, to: u64) -> bool {
        let Some(forward) = self.dependents.get_mut(&from) else {
            return false;
        };
        let before = forward.len();
        forward.retain(|&id| id != to);
        if forward.len() == before {
            return false;
        }
        if let Some(reverse) = self.dependencies.get_mut(&to) {
            reverse.retain(|&id| id != from);
        }
        true
    }

    pub fn has_dependency(&self, from: u64, to: u64) -> bool {
        self.dependents.get(&from).is_some_and(|list| list.contains(&to))
    }

    fn forward(&self, id: u64) -> &[u64] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn backward(&self, id: u64) -> &[u64] {
        self.dependencies.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn records(&self, ids: impl IntoIterator<Item = u64>) -> Vec<&ServiceRequest> {
        ids.into_iter().filter_map(|id| self.requests.get(&id)).collect()
    }

    /// Depth-first order from `start` along forward edges.
    pub fn dfs(&self, start: u64) -> Vec<&ServiceRequest> {
        self.records(self.dfs_ids(start, &mut HashSet::new()))
    }

    fn dfs_ids(&self, start: u64, visited: &mut HashSet<u64>) -> Vec<u64> {
        let mut order = Vec::new();
        if !self.contains(start) {
            return order;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            // Reversed so the first neighbour is explored first.
            stack.extend(self.forward(id).iter().rev().filter(|next| !visited.contains(*next)));
        }
        order
    }

    /// Breadth-first order from `start` along forward edges.
    pub fn bfs(&self, start: u64) -> Vec<&ServiceRequest> {
        let mut order = Vec::new();
        if !self.contains(start) {
            return Vec::new();
        }
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &next in self.forward(id) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        self.records(order)
    }

    /// Three-colour walk over every vertex. Returns the cycle closed by the
    /// first back edge found, as `[v, .., u]` for back edge `u -> v`.
    fn detect_cycle(&self) -> Option<Vec<u64>> {
        let mut colors: HashMap<u64, Color> = HashMap::with_capacity(self.len());
        let mut parent: HashMap<u64, u64> = HashMap::new();

        for &root in self.requests.keys() {
            if colors.get(&root).is_some_and(|&c| c != Color::White) {
                continue;
            }
            colors.insert(root, Color::Gray);
            let mut stack: Vec<(u64, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                let Some(&next) = self.forward(node).get(cursor) else {
                    colors.insert(node, Color::Black);
                    stack.pop();
                    continue;
                };
                frame.1 += 1;
                match colors.get(&next).copied().unwrap_or(Color::White) {
                    Color::White => {
                        colors.insert(next, Color::Gray);
                        parent.insert(next, node);
                        stack.push((next, 0));
                    }
                    Color::Gray => {
                        let mut cycle = vec![node];
                        let mut current = node;
                        while current != next {
                            match parent.get(&current) {
                                Some(&up) => {
                                    cycle.push(up);
                                    current = up;
                                }
                                None => break,
                            }
                        }
                        cycle.reverse();
                        return Some(cycle);
                    }
                    Color::Black => {}
                }
            }
        }
        None
    }

    pub fn has_cycles(&self) -> bool {
        self.detect_cycle().is_some()
    }

    /// The ids of one cycle, if any exists.
    pub fn find_cycle(&self) -> Option<Vec<u64>> {
        self.detect_cycle()
    }

    fn ensure_acyclic(&self, operation: &str) -> Result<()> {
        if let Some(cycle) = self.detect_cycle() {
            warn!(operation, ?cycle, "rejected on cyclic dependency graph");
            return Err(EngineError::CyclicGraph);
        }
        Ok(())
    }

    fn topological_ids(&self) -> Result<Vec<u64>> {
        self.ensure_acyclic("topological_sort")?;
        let mut visited: HashSet<u64> = HashSet::with_capacity(self.len());
        let mut finished = Vec::with_capacity(self.len());

        for &root in self.requests.keys() {
            if !visited.insert(root) {
                continue;
            }
            let mut stack: Vec<(u64, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                match self.forward(node).get(cursor) {
                    Some(&next) => {
                        frame.1 += 1;
                        if visited.insert(next) {
                            stack.push((next, 0));
                        }
                    }
                    None => {
                        finished.push(node);
                        stack.pop();
                    }
                }
            }
        }
        finished.reverse();
        Ok(finished)
    }

    /// DFS post-order topological sort. Fails on a cyclic graph.
    pub fn topological_sort(&self) -> Result<Vec<&ServiceRequest>> {
        Ok(self.records(self.topological_ids()?))
    }

    /// In-degree frontier topological sort. Fails on a cyclic graph.
    pub fn kahns_topological_sort(&self) -> Result<Vec<&ServiceRequest>> {
        self.ensure_acyclic("kahns_topological_sort")?;
        let mut in_degree: HashMap<u64, usize> = self
            .requests
            .keys()
            .map(|&id| (id, self.backward(id).len()))
            .collect();
        let mut frontier: VecDeque<u64> = self
            .requests
            .keys()
            .copied()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(id) = frontier.pop_front() {
            order.push(id);
            for &next in self.forward(id) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        frontier.push_back(next);
                    }
                }
            }
        }
        if order.len() != self.len() {
            return Err(EngineError::CyclicGraph);
        }
        Ok(self.records(order))
    }

    pub fn dependencies_of(&self, id: u64) -> Vec<&ServiceRequest> {
        self.records(self.backward(id).iter().copied())
    }

    pub fn dependents_of(&self, id: u64) -> Vec<&ServiceRequest> {
        self.records(self.forward(id).iter().copied())
    }

    /// Requests that wait on nothing.
    pub fn root_requests(&self) -> Vec<&ServiceRequest> {
        self.records(self.requests.keys().copied().filter(|&id| self.backward(id).is_empty()))
    }

    /// Requests nothing waits on.
    pub fn leaf_requests(&self) -> Vec<&ServiceRequest> {
        self.records(self.requests.keys().copied().filter(|&id| self.forward(id).is_empty()))
    }

    /// Longest dependency chain, root first. Fails on a cyclic graph.
    pub fn critical_path(&self) -> Result<Vec<&ServiceRequest>> {
        let order = self.topological_ids()?;
        let mut distance: HashMap<u64, usize> = order.iter().map(|&id| (id, 0)).collect();
        let mut parent: HashMap<u64, u64> = HashMap::new();

        for &id in &order {
            let here = distance.get(&id).copied().unwrap_or(0);
            for &next in self.forward(id) {
                let slot = distance.entry(next).or_insert(0);
                if here + 1 > *slot {
                    *slot = here + 1;
                    parent.insert(next, id);
                }
            }
        }

        let mut end = None;
        let mut best = 0;
        for &id in &order {
            let d = distance.get(&id).copied().unwrap_or(0);
            if end.is_none() || d > best {
                best = d;
                end = Some(id);
            }
        }

        let mut path = Vec::new();
        let mut current = end;
        while let Some(id) = current {
            path.push(id);
            current = parent.get(&id).copied();
        }
        path.reverse();
        Ok(self.records(path))
    }

    /// Groups vertices by forward reachability from each unvisited vertex,
    /// in id order. This is downstream reachability, not weak connectivity:
    /// a vertex only joins a group if an earlier-visited root reaches it.
    pub fn connected_components(&self) -> Vec<Vec<u64>> {
        let mut visited = HashSet::with_capacity(self.len());
        let mut components = Vec::new();
        for &id in self.requests.keys() {
            if visited.contains(&id) {
                continue;
            }
            components.push(self.dfs_ids(id, &mut visited));
        }
        components
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            vertices: self.len(),
            edges: self.edge_count(),
            roots: self.root_requests().len(),
            leaves: self.leaf_requests().len(),
            cyclic: self.has_cycles(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn graph_with(n: u64) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for id in 1..=n {
            graph.add_request(ServiceRequest::new(id, "Maintenance", "Pending"));
        }
        graph
    }

    fn ids(records: Vec<&ServiceRequest>) -> Vec<u64> {
        records.into_iter().map(|r| r.id).collect()
    }

    fn position(order: &[u64], id: u64) -> usize {
        order.iter().position(|&x| x == id).unwrap()
    }

    #[test]
    fn test_chain_sorts_then_cycle_rejects() {
        let mut graph = graph_with(4);
        graph.add_dependency(1, 2).unwrap();
        graph.add_dependency(2, 3).unwrap();
        graph.add_dependency(3, 4).unwrap();

        assert!(!graph.has_cycles());
        assert_eq!(ids(graph.topological_sort().unwrap()), vec![1, 2, 3, 4]);
        assert_eq!(ids(graph.kahns_topological_sort().unwrap()), vec![1, 2, 3, 4]);

        graph.add_dependency(4, 1).unwrap();
        assert!(graph.has_cycles());
        assert!(matches!(graph.topological_sort(), Err(EngineError::CyclicGraph)));
        assert!(matches!(graph.kahns_topological_sort(), Err(EngineError::CyclicGraph)));
        assert!(matches!(graph.critical_path(), Err(EngineError::CyclicGraph)));

        let mut cycle = graph.find_cycle().unwrap();
        cycle.sort();
        assert_eq!(cycle, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_find_cycle_reports_only_the_loop() {
        let mut graph = graph_with(5);
        graph.add_dependency(1, 2).unwrap();
        graph.add_dependency(2, 3).unwrap();
        graph.add_dependency(3, 4).unwrap();
        graph.add_dependency(4, 2).unwrap();
        graph.add_dependency(4, 5).unwrap();
        assert_eq!(graph.find_cycle(), Some(vec![2, 3, 4]));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = graph_with(2);
        graph.add_dependency(2, 2).unwrap();
        assert_eq!(graph.find_cycle(), Some(vec![2]));
    }

    #[test]
    fn test_duplicate_and_unknown_edges() {
        let mut graph = graph_with(2);
        assert!(graph.add_dependency(1, 2).unwrap());
        assert!(!graph.add_dependency(1, 2).unwrap());
        assert_eq!(graph.edge_count(), 1);
        assert!(matches!(graph.add_dependency(1, 9), Err(EngineError::UnknownRequest(9))));
    }

    #[test]
    fn test_remove_dependency_and_vertex() {
        let mut graph = graph_with(3);
        graph.add_dependency(1, 2).unwrap();
        graph.add_dependency(2, 3).unwrap();
        assert!(graph.remove_dependency(1, 2));
        assert!(!graph.remove_dependency(1, 2));
        assert!(graph.dependencies_of(2).is_empty());

        graph.add_dependency(1, 2).unwrap();
        assert!(graph.remove_request(2).is_some());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.dependents_of(1).is_empty());
        assert!(graph.dependencies_of(3).is_empty());
    }

    #[test]
    fn test_traversals() {
        let mut graph = graph_with(6);
        for (from, to) in [(1, 2), (1, 3), (2, 4), (3, 5), (4, 6)] {
            graph.add_dependency(from, to).unwrap();
        }
        assert_eq!(ids(graph.dfs(1)), vec![1, 2, 4, 6, 3, 5]);
        assert_eq!(ids(graph.bfs(1)), vec![1, 2, 3, 4, 5, 6]);
        assert!(graph.dfs(99).is_empty());
    }

    #[test]
    fn test_roots_leaves_and_neighbours() {
        let mut graph = graph_with(4);
        graph.add_dependency(1, 3).unwrap();
        graph.add_dependency(2, 3).unwrap();
        graph.add_dependency(3, 4).unwrap();
        assert_eq!(ids(graph.root_requests()), vec![1, 2]);
        assert_eq!(ids(graph.leaf_requests()), vec![4]);
        assert_eq!(ids(graph.dependencies_of(3)), vec![1, 2]);
        assert_eq!(ids(graph.dependents_of(3)), vec![4]);
    }

    #[test]
    fn test_critical_path_takes_longest_chain() {
        let mut graph = graph_with(6);
        for (from, to) in [(1, 2), (2, 3), (3, 4), (1, 5), (5, 4), (6, 4)] {
            graph.add_dependency(from, to).unwrap();
        }
        assert_eq!(ids(graph.critical_path().unwrap()), vec![1, 2, 3, 4]);
        assert!(DependencyGraph::new().critical_path().unwrap().is_empty());
    }

    #[test]
    fn test_components_follow_forward_edges_only() {
        let mut graph = graph_with(5);
        graph.add_dependency(1, 2).unwrap();
        graph.add_dependency(3, 2).unwrap();
        graph.add_dependency(4, 5).unwrap();
        assert_eq!(graph.connected_components(), vec![vec![1, 2], vec![3], vec![4, 5]]);
    }

    #[test]
    fn test_random_dags_sort_validly() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let mut graph = graph_with(30);
            let mut edges = Vec::new();
            for _ in 0..60 {
                let a = rng.gen_range(1..=30u64);
                let b = rng.gen_range(1..=30u64);
                if a < b {
                    graph.add_dependency(a, b).unwrap();
                    edges.push((a, b));
                }
            }
            let dfs_order = ids(graph.topological_sort().unwrap());
            let kahn_order = ids(graph.kahns_topological_sort().unwrap());
            for (a, b) in edges {
                assert!(position(&dfs_order, a) < position(&dfs_order, b));
                assert!(position(&kahn_order, a) < position(&kahn_order, b));
            }
        }
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let n = 50_000;
        let mut graph = graph_with(n);
        for id in 1..n {
            graph.add_dependency(id, id + 1).unwrap();
        }
        assert!(!graph.has_cycles());
        assert_eq!(graph.critical_path().unwrap().len(), n as usize);
        assert_eq!(graph.dfs(1).len(), n as usize);
    }

    #[test]
    fn test_statistics() {
        let mut graph = graph_with(3);
        graph.add_dependency(1, 2).unwrap();
        let stats = graph.statistics();
        assert_eq!(stats.vertices, 3);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.roots, 2);
        assert_eq!(stats.leaves, 2);
        assert!(!stats.cyclic);
    }
}
