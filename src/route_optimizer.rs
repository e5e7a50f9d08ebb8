//! Spatial/cost view of the request set.
//!
//! Every pair of known requests is joined by an undirected edge weighted by
//! one interpretation at a time (distance, time or cost). Minimum spanning
//! trees over the live edge set drive clustering and a visiting route.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet, VecDeque};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::haversine::{TravelModel, haversine_km};
use crate::priority::priority_score;
use crate::request::{Location, ServiceRequest};

/// Centre used to place requests that arrive without a location.
const CITY_CENTRE: (f64, f64) = (36.1699, -115.1398);

/// Degrees per synthesized offset step (roughly 220 m of latitude).
const SYNTHETIC_STEP_DEG: f64 = 0.002;

/// Cluster radius reported by [`RouteOptimizer::statistics`].
const STATISTICS_CLUSTER_KM: f64 = 5.0;

/// Which interpretation the live edge weights carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeMode {
    /// Kilometers.
    Distance,
    /// Minutes, including on-site time.
    Time,
    /// Currency units, including call-out cost.
    Cost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MstAlgorithm {
    Kruskal,
    Prim,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub from: u64,
    pub to: u64,
    pub weight: f64,
}

impl Edge {
    fn order(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| (self.from, self.to).cmp(&(other.from, other.to)))
    }
}

#[derive(Debug, Clone)]
struct EdgeSet {
    mode: EdgeMode,
    edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
struct MstCache {
    algorithm: MstAlgorithm,
    edges: Vec<Edge>,
    total_weight: f64,
}

/// A visiting order derived from the spanning tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub stops: Vec<u64>,
    pub mode: EdgeMode,
    /// Sum of leg weights under `mode`.
    pub total_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSavings {
    /// Visiting requests in id order.
    pub baseline_km: f64,
    pub optimized_km: f64,
    pub saved_km: f64,
    pub saved_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerStatistics {
    pub requests: usize,
    pub edges: usize,
    pub mode: Option<EdgeMode>,
    pub mst_algorithm: Option<MstAlgorithm>,
    pub mst_edges: usize,
    pub mst_weight: Option<f64>,
    pub average_edge_weight: Option<f64>,
    pub clusters_within_5km: usize,
}

/// Disjoint sets with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
    sets: usize,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sets: n,
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merges the sets of `x` and `y`; false if they were already one set.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return false;
        }
        match self.rank[root_x].cmp(&self.rank[root_y]) {
            Ordering::Less => self.parent[root_x] = root_y,
            Ordering::Greater => self.parent[root_y] = root_x,
            Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            }
        }
        self.sets -= 1;
        true
    }

    pub fn sets(&self) -> usize {
        self.sets
    }
}

/// Frontier entry for Prim; ordered so the lightest edge pops first.
#[derive(Debug, Clone, Copy)]
struct FrontierEdge(Edge);

impl PartialEq for FrontierEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEdge {}

impl Ord for FrontierEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.order(&self.0)
    }
}

impl PartialOrd for FrontierEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn kruskal(ids: &[u64], edges: &[Edge]) -> Vec<Edge> {
    let index: HashMap<u64, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut sorted = edges.to_vec();
    sorted.sort_by(Edge::order);

    let target = ids.len().saturating_sub(1);
    let mut sets = UnionFind::new(ids.len());
    let mut accepted = Vec::with_capacity(target);
    for edge in sorted {
        if accepted.len() == target {
            break;
        }
        let (Some(&a), Some(&b)) = (index.get(&edge.from), index.get(&edge.to)) else {
            continue;
        };
        if sets.union(a, b) {
            accepted.push(edge);
        }
    }
    accepted
}

fn prim(ids: &[u64], edges: &[Edge]) -> Vec<Edge> {
    let Some(&start) = ids.first() else {
        return Vec::new();
    };
    let mut adjacency: HashMap<u64, Vec<Edge>> = HashMap::with_capacity(ids.len());
    for edge in edges {
        adjacency.entry(edge.from).or_default().push(*edge);
        adjacency.entry(edge.to).or_default().push(Edge {
            from: edge.to,
            to: edge.from,
            weight: edge.weight,
        });
    }

    let target = ids.len() - 1;
    let mut visited = HashSet::from([start]);
    let mut frontier: BinaryHeap<FrontierEdge> = adjacency
        .get(&start)
        .into_iter()
        .flatten()
        .map(|edge| FrontierEdge(*edge))
        .collect();
    let mut accepted = Vec::with_capacity(target);

    while accepted.len() < target {
        let Some(FrontierEdge(edge)) = frontier.pop() else {
            break;
        };
        if !visited.insert(edge.to) {
            continue;
        }
        accepted.push(edge);
        for next in adjacency.get(&edge.to).into_iter().flatten() {
            if !visited.contains(&next.to) {
                frontier.push(FrontierEdge(*next));
            }
        }
    }
    accepted
}

/// Deterministic placeholder position near the city centre.
pub fn synthesized_location(id: u64) -> Location {
    let lat_step = (id.wrapping_mul(37) % 101) as f64 - 50.0;
    let lng_step = (id.wrapping_mul(73) % 101) as f64 - 50.0;
    Location::new(
        CITY_CENTRE.0 + lat_step * SYNTHETIC_STEP_DEG,
        CITY_CENTRE.1 + lng_step * SYNTHETIC_STEP_DEG,
    )
    .with_address(format!("synthesized location for request {}", id))
}

#[derive(Debug, Clone, Default)]
pub struct RouteOptimizer {
    requests: BTreeMap<u64, ServiceRequest>,
    locations: BTreeMap<u64, Location>,
    edges: Option<EdgeSet>,
    mst: Option<MstCache>,
    model: TravelModel,
}

impl RouteOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: TravelModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    pub fn model(&self) -> &TravelModel {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn location(&self, id: u64) -> Option<&Location> {
        self.locations.get(&id)
    }

    fn invalidate(&mut self) {
        self.edges = None;
        self.mst = None;
    }

    /// Adds or replaces a request. Requests without a location get a synthesized one.
    pub fn add_request(&mut self, request: ServiceRequest) -> bool {
        let location = request
            .location
            .clone()
            .unwrap_or_else(|| synthesized_location(request.id));
        self.locations.insert(request.id, location);
        self.invalidate();
        self.requests.insert(request.id, request).is_none()
    }

    /// Replaces the stored record only; location and edges stay as they are.
    pub fn refresh_request(&mut self, request: ServiceRequest) -> bool {
        match self.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                true
            }
            None => false,
        }
    }

    pub fn remove_request(&mut self, id: u64) -> Option<ServiceRequest> {
        let removed = self.requests.remove(&id)?;
        self.locations.remove(&id);
        self.invalidate();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.locations.clear();
        self.invalidate();
    }

    pub fn live_mode(&self) -> Option<EdgeMode> {
        self.edges.as_ref().map(|set| set.mode)
    }

    /// The live edge set; empty until one has been computed.
    pub fn edges(&self) -> &[Edge] {
        self.edges.as_ref().map(|set| set.edges.as_slice()).unwrap_or(&[])
    }

    fn weigh(&self, mode: EdgeMode, a: (&ServiceRequest, &Location), b: (&ServiceRequest, &Location)) -> f64 {
        let km = haversine_km(a.1.coords(), b.1.coords());
        match mode {
            EdgeMode::Distance => km,
            EdgeMode::Time => self.model.travel_minutes(km, a.0, b.0),
            EdgeMode::Cost => self.model.travel_cost(km, a.0, b.0),
        }
    }

    fn weight_between(&self, mode: EdgeMode, a: u64, b: u64) -> Option<f64> {
        let a = (self.requests.get(&a)?, self.locations.get(&a)?);
        let b = (self.requests.get(&b)?, self.locations.get(&b)?);
        Some(self.weigh(mode, a, b))
    }

    fn pairwise_edges(&self, mode: EdgeMode) -> Vec<Edge> {
        let nodes: Vec<(&ServiceRequest, &Location)> = self
            .requests
            .values()
            .filter_map(|request| self.locations.get(&request.id).map(|location| (request, location)))
            .collect();
        let nodes = &nodes;
        (0..nodes.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                (i + 1..nodes.len()).map(move |j| Edge {
                    from: nodes[i].0.id,
                    to: nodes[j].0.id,
                    weight: self.weigh(mode, nodes[i], nodes[j]),
                })
            })
            .collect()
    }

    fn rebuild_edges(&mut self, mode: EdgeMode) -> &[Edge] {
        let edges = self.pairwise_edges(mode);
        debug!(?mode, edges = edges.len(), "rebuilt pairwise edges");
        self.mst = None;
        self.edges = Some(EdgeSet { mode, edges });
        self.edges()
    }

    /// Great-circle kilometers between every pair.
    pub fn calculate_distance_edges(&mut self) -> &[Edge] {
        self.rebuild_edges(EdgeMode::Distance)
    }

    /// Estimated minutes between every pair.
    pub fn calculate_time_edges(&mut self) -> &[Edge] {
        self.rebuild_edges(EdgeMode::Time)
    }

    /// Estimated cost between every pair.
    pub fn calculate_cost_edges(&mut self) -> &[Edge] {
        self.rebuild_edges(EdgeMode::Cost)
    }

    fn ensure_edges(&mut self) -> EdgeMode {
        match self.live_mode() {
            Some(mode) => mode,
            None => {
                self.calculate_distance_edges();
                EdgeMode::Distance
            }
        }
    }

    fn compute_mst(&mut self, algorithm: MstAlgorithm) -> Vec<Edge> {
        self.ensure_edges();
        let ids: Vec<u64> = self.requests.keys().copied().collect();
        let edges = match algorithm {
            MstAlgorithm::Kruskal => kruskal(&ids, self.edges()),
            MstAlgorithm::Prim => prim(&ids, self.edges()),
        };
        let total_weight = edges.iter().map(|edge| edge.weight).sum();
        self.mst = Some(MstCache {
            algorithm,
            edges: edges.clone(),
            total_weight,
        });
        edges
    }

    /// Minimum spanning tree by sorted edges and union-find.
    pub fn kruskal_mst(&mut self) -> Vec<Edge> {
        self.compute_mst(MstAlgorithm::Kruskal)
    }

    /// Minimum spanning tree grown from the smallest id.
    pub fn prim_mst(&mut self) -> Vec<Edge> {
        self.compute_mst(MstAlgorithm::Prim)
    }

    /// Total weight of the last computed spanning tree.
    pub fn mst_total_weight(&self) -> Option<f64> {
        self.mst.as_ref().map(|mst| mst.total_weight)
    }

    pub fn mst_edges(&self) -> Option<&[Edge]> {
        self.mst.as_ref().map(|mst| mst.edges.as_slice())
    }

    /// Depth-first walk of the spanning tree from the most urgent request,
    /// taking lighter branches first.
    pub fn optimal_route(&mut self) -> Route {
        let mode = self.ensure_edges();
        let now = Utc::now();
        let Some(start) = self
            .requests
            .values()
            .min_by_key(|request| (priority_score(request, now), request.id))
            .map(|request| request.id)
        else {
            return Route {
                stops: Vec::new(),
                mode,
                total_weight: 0.0,
            };
        };

        let tree = match &self.mst {
            Some(mst) => mst.edges.clone(),
            None => self.kruskal_mst(),
        };
        let mut adjacency: HashMap<u64, Vec<(f64, u64)>> = HashMap::new();
        for edge in &tree {
            adjacency.entry(edge.from).or_default().push((edge.weight, edge.to));
            adjacency.entry(edge.to).or_default().push((edge.weight, edge.from));
        }
        for neighbours in adjacency.values_mut() {
            neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        }

        let mut stops = Vec::with_capacity(self.len());
        let mut visited = HashSet::with_capacity(self.len());
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            stops.push(id);
            if let Some(neighbours) = adjacency.get(&id) {
                stack.extend(neighbours.iter().rev().map(|&(_, next)| next).filter(|next| !visited.contains(next)));
            }
        }

        let total_weight = self.path_weight(mode, &stops);
        Route {
            stops,
            mode,
            total_weight,
        }
    }

    fn path_weight(&self, mode: EdgeMode, stops: &[u64]) -> f64 {
        stops
            .windows(2)
            .filter_map(|leg| self.weight_between(mode, leg[0], leg[1]))
            .sum()
    }

    /// Groups requests whose chain of hops is each within `max_distance_km`.
    pub fn service_clusters(&self, max_distance_km: f64) -> Vec<Vec<u64>> {
        let mut visited = HashSet::with_capacity(self.len());
        let mut clusters = Vec::new();
        for &seed in self.locations.keys() {
            if !visited.insert(seed) {
                continue;
            }
            let mut cluster = Vec::new();
            let mut queue = VecDeque::from([seed]);
            while let Some(id) = queue.pop_front() {
                cluster.push(id);
                let Some(here) = self.locations.get(&id) else {
                    continue;
                };
                for (&other, there) in &self.locations {
                    if !visited.contains(&other)
                        && haversine_km(here.coords(), there.coords()) <= max_distance_km
                    {
                        visited.insert(other);
                        queue.push_back(other);
                    }
                }
            }
            cluster.sort_unstable();
            clusters.push(cluster);
        }
        clusters
    }

    /// Compares visiting in id order against the optimized route, in kilometers.
    pub fn calculate_savings(&mut self) -> RouteSavings {
        let baseline: Vec<u64> = self.requests.keys().copied().collect();
        let optimized = self.optimal_route().stops;
        let baseline_km = self.path_weight(EdgeMode::Distance, &baseline);
        let optimized_km = self.path_weight(EdgeMode::Distance, &optimized);
        let saved_km = baseline_km - optimized_km;
        let saved_percent = if baseline_km > 0.0 {
            saved_km / baseline_km * 100.0
        } else {
            0.0
        };
        RouteSavings {
            baseline_km,
            optimized_km,
            saved_km,
            saved_percent,
        }
    }

    pub fn statistics(&self) -> OptimizerStatistics {
        let edges = self.edges();
        let average_edge_weight =
            (!edges.is_empty()).then(|| edges.iter().map(|edge| edge.weight).sum::<f64>() / edges.len() as f64);
        OptimizerStatistics {
            requests: self.len(),
            edges: edges.len(),
            mode: self.live_mode(),
            mst_algorithm: self.mst.as_ref().map(|mst| mst.algorithm),
            mst_edges: self.mst.as_ref().map_or(0, |mst| mst.edges.len()),
            mst_weight: self.mst_total_weight(),
            average_edge_weight,
            clusters_within_5km: self.service_clusters(STATISTICS_CLUSTER_KM).len(),
        }
    }
}
