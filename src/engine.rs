//! Orchestrator that keeps every index in step with the request store.
//!
//! One bulk load fans the store snapshot out into all five structures;
//! afterwards each mutation is written to the store first and then applied
//! to every structure in lockstep. Read queries go to whichever structure
//! suits them, and the comparison queries run the same question through
//! several structures side by side.
//!
//! Not thread-safe by itself: callers serialize access.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::balanced_tree::BalancedTree;
use crate::benchmark::{
    Comparison, MemoryEstimate, NodeOverhead, PerformanceReport, QueryKind, Structure, TimingLog, measure,
};
use crate::dependency_graph::{DependencyGraph, GraphStatistics};
use crate::error::Result;
use crate::haversine::TravelModel;
use crate::priority::labels_match;
use crate::priority_queue::PriorityQueue;
use crate::request::ServiceRequest;
use crate::route_optimizer::{OptimizerStatistics, RouteOptimizer};
use crate::search_tree::SearchTree;
use crate::traits::RequestStore;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How long a loaded snapshot is trusted before the next read reloads it.
    pub cache_ttl: Duration,
    /// Ask the store to seed demo data when its snapshot comes back empty.
    pub seed_when_empty: bool,
    pub overhead: NodeOverhead,
    pub travel_model: TravelModel,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            seed_when_empty: true,
            overhead: NodeOverhead::default(),
            travel_model: TravelModel::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub structure: Structure,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub requests: usize,
    pub seeded: bool,
    /// Time spent pulling the snapshot from the store.
    pub fetch: Duration,
    pub phases: Vec<PhaseTiming>,
}

impl LoadReport {
    pub fn phase(&self, structure: Structure) -> Option<Duration> {
        self.phases
            .iter()
            .find(|phase| phase.structure == structure)
            .map(|phase| phase.elapsed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub requests: usize,
    pub search_tree_height: i32,
    pub balanced_tree_height: i32,
    pub queued: usize,
    pub graph: GraphStatistics,
    pub optimizer: OptimizerStatistics,
}

pub struct RequestEngine<S: RequestStore> {
    store: S,
    options: EngineOptions,
    search_tree: SearchTree,
    balanced_tree: BalancedTree,
    priority_queue: PriorityQueue,
    dependency_graph: DependencyGraph,
    route_optimizer: RouteOptimizer,
    snapshot: Vec<ServiceRequest>,
    loaded_at: Option<Instant>,
    timings: TimingLog,
}

impl<S: RequestStore> RequestEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    pub fn with_options(store: S, options: EngineOptions) -> Self {
        let route_optimizer = RouteOptimizer::with_model(options.travel_model.clone());
        Self {
            store,
            options,
            search_tree: SearchTree::new(),
            balanced_tree: BalancedTree::new(),
            priority_queue: PriorityQueue::new(),
            dependency_graph: DependencyGraph::new(),
            route_optimizer,
            snapshot: Vec::new(),
            loaded_at: None,
            timings: TimingLog::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn search_tree(&self) -> &SearchTree {
        &self.search_tree
    }

    pub fn balanced_tree(&self) -> &BalancedTree {
        &self.balanced_tree
    }

    pub fn priority_queue(&self) -> &PriorityQueue {
        &self.priority_queue
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependency_graph
    }

    pub fn route_optimizer(&self) -> &RouteOptimizer {
        &self.route_optimizer
    }

    /// Mutable access for operations that cache results (edge sets, spanning trees).
    pub fn route_optimizer_mut(&mut self) -> &mut RouteOptimizer {
        &mut self.route_optimizer
    }

    /// Records in the cached store snapshot.
    pub fn snapshot(&self) -> &[ServiceRequest] {
        &self.snapshot
    }

    pub fn timings(&self) -> &TimingLog {
        &self.timings
    }

    pub fn reset_timings(&mut self) {
        self.timings.clear();
    }

    /// Empties every structure and drops the cached snapshot.
    pub fn clear(&mut self) {
        self.search_tree.clear();
        self.balanced_tree.clear();
        self.priority_queue.clear();
        self.dependency_graph.clear();
        self.route_optimizer.clear();
        self.snapshot.clear();
        self.loaded_at = None;
    }

    /// Pulls the full snapshot and rebuilds all five structures from it.
    pub fn load_all_requests(&mut self) -> Result<LoadReport> {
        let started = Instant::now();
        let mut requests = self.store.get_all()?;
        let mut seeded = false;
        if requests.is_empty() && self.options.seed_when_empty {
            seeded = self.store.ensure_seeded()?;
            if seeded {
                warn!("request store was empty, loaded seeded sample data");
                requests = self.store.get_all()?;
            }
        }
        let fetch = started.elapsed();

        self.clear();
        let phases = vec![
            measure(Structure::SearchTree, || {
                for request in &requests {
                    self.search_tree.insert(request.clone());
                }
            }),
            measure(Structure::BalancedTree, || {
                for request in &requests {
                    self.balanced_tree.insert(request.clone());
                }
            }),
            measure(Structure::PriorityQueue, || {
                self.priority_queue.build_heap(requests.iter().cloned());
            }),
            measure(Structure::DependencyGraph, || {
                for request in &requests {
                    self.dependency_graph.add_request(request.clone());
                }
            }),
            measure(Structure::RouteOptimizer, || {
                for request in &requests {
                    self.route_optimizer.add_request(request.clone());
                }
            }),
        ]
        .into_iter()
        .map(|run| PhaseTiming {
            structure: run.structure,
            elapsed: run.elapsed,
        })
        .collect();

        let count = requests.len();
        self.snapshot = requests;
        self.loaded_at = Some(Instant::now());
        info!(
            requests = count,
            seeded,
            fetch_ms = fetch.as_secs_f64() * 1e3,
            "loaded request indexes"
        );

        Ok(LoadReport {
            requests: count,
            seeded,
            fetch,
            phases,
        })
    }

    pub fn is_cache_fresh(&self) -> bool {
        self.loaded_at
            .is_some_and(|loaded| loaded.elapsed() < self.options.cache_ttl)
    }

    /// Forces the next read query to reload from the store.
    pub fn invalidate_cache(&mut self) {
        self.loaded_at = None;
    }

    fn ensure_fresh(&mut self) -> Result<()> {
        if !self.is_cache_fresh() {
            debug!("request snapshot missing or expired, reloading");
            self.load_all_requests()?;
        }
        Ok(())
    }

    fn upsert_snapshot(&mut self, request: ServiceRequest) {
        match self.snapshot.iter_mut().find(|existing| existing.id == request.id) {
            Some(slot) => *slot = request,
            None => self.snapshot.push(request),
        }
    }

    /// Creates the request in the store, then indexes it under the assigned id.
    pub fn add_request(&mut self, mut request: ServiceRequest) -> Result<u64> {
        let id = self.store.create(request.clone())?;
        request.id = id;

        self.search_tree.insert(request.clone());
        self.balanced_tree.insert(request.clone());
        self.priority_queue.enqueue(request.clone());
        self.dependency_graph.add_request(request.clone());
        self.route_optimizer.add_request(request.clone());
        self.upsert_snapshot(request);
        debug!(id, "indexed new request");
        Ok(id)
    }

    /// Writes the change to the store and re-indexes the record.
    ///
    /// Dependency edges and route edges are left as they are; only the stored
    /// copies in the graph and optimizer are refreshed. Returns false when the
    /// store does not know the id.
    pub fn update_request(&mut self, request: ServiceRequest) -> Result<bool> {
        if !self.store.update(&request)? {
            debug!(id = request.id, "update skipped, unknown to store");
            return Ok(false);
        }
        let id = request.id;

        self.search_tree.delete(id);
        self.search_tree.insert(request.clone());
        self.balanced_tree.delete(id);
        self.balanced_tree.insert(request.clone());
        if !self.priority_queue.update_priority(request.clone()) {
            self.priority_queue.enqueue(request.clone());
        }
        if !self.dependency_graph.refresh_request(request.clone()) {
            self.dependency_graph.add_request(request.clone());
        }
        if !self.route_optimizer.refresh_request(request.clone()) {
            self.route_optimizer.add_request(request.clone());
        }
        self.upsert_snapshot(request);
        debug!(id, "re-indexed updated request");
        Ok(true)
    }

    /// Deletes from the store, then from every structure.
    pub fn remove_request(&mut self, id: u64) -> Result<bool> {
        if !self.store.delete(id)? {
            debug!(id, "remove skipped, unknown to store");
            return Ok(false);
        }
        self.search_tree.delete(id);
        self.balanced_tree.delete(id);
        self.priority_queue.remove(id);
        self.dependency_graph.remove_request(id);
        self.route_optimizer.remove_request(id);
        self.snapshot.retain(|request| request.id != id);
        debug!(id, "removed request from indexes");
        Ok(true)
    }

    pub fn add_dependency(&mut self, from: u64, to: u64) -> Result<bool> {
        self.dependency_graph.add_dependency(from, to)
    }

    pub fn remove_dependency(&mut self, from: u64, to: u64) -> bool {
        self.dependency_graph.remove_dependency(from, to)
    }

    /// Looks `id` up by linear scan and in both trees.
    pub fn search_by_id(&mut self, id: u64) -> Result<Comparison<Option<ServiceRequest>>> {
        self.ensure_fresh()?;
        let comparison = Comparison {
            query: QueryKind::SearchById,
            runs: vec![
                measure(Structure::LinearScan, || {
                    self.snapshot.iter().find(|request| request.id == id).cloned()
                }),
                measure(Structure::SearchTree, || self.search_tree.search(id).cloned()),
                measure(Structure::BalancedTree, || self.balanced_tree.search(id).cloned()),
            ],
        };
        self.timings.record_comparison(&comparison);
        Ok(comparison)
    }

    /// Requests with a matching status, each run's result in id order.
    pub fn requests_by_status(&mut self, status: &str) -> Result<Comparison<Vec<ServiceRequest>>> {
        self.ensure_fresh()?;
        let matches = |request: &&ServiceRequest| labels_match(&request.status, status);
        let mut runs = vec![
            measure(Structure::LinearScan, || {
                let mut found: Vec<ServiceRequest> = self.snapshot.iter().filter(matches).cloned().collect();
                found.sort_by_key(|request| request.id);
                found
            }),
            measure(Structure::SearchTree, || {
                self.search_tree.in_order().into_iter().filter(matches).cloned().collect()
            }),
            measure(Structure::BalancedTree, || {
                self.balanced_tree.in_order().into_iter().filter(matches).cloned().collect()
            }),
            measure(Structure::PriorityQueue, || {
                self.priority_queue.by_status(status).into_iter().cloned().collect()
            }),
        ];
        // The heap answers in priority order.
        for run in &mut runs {
            run.result.sort_by_key(|request| request.id);
        }
        let comparison = Comparison {
            query: QueryKind::ByStatus,
            runs,
        };
        self.timings.record_comparison(&comparison);
        Ok(comparison)
    }

    /// Requests with `min <= id <= max`, ascending.
    pub fn requests_in_range(&mut self, min: u64, max: u64) -> Result<Comparison<Vec<ServiceRequest>>> {
        self.ensure_fresh()?;
        let comparison = Comparison {
            query: QueryKind::Range,
            runs: vec![
                measure(Structure::LinearScan, || {
                    let mut found: Vec<ServiceRequest> = self
                        .snapshot
                        .iter()
                        .filter(|request| (min..=max).contains(&request.id))
                        .cloned()
                        .collect();
                    found.sort_by_key(|request| request.id);
                    found
                }),
                measure(Structure::SearchTree, || {
                    self.search_tree.range_search(min, max).into_iter().cloned().collect()
                }),
                measure(Structure::BalancedTree, || {
                    self.balanced_tree.range_search(min, max).into_iter().cloned().collect()
                }),
            ],
        };
        self.timings.record_comparison(&comparison);
        Ok(comparison)
    }

    fn memory_estimates(&self) -> Vec<MemoryEstimate> {
        let overhead = &self.options.overhead;
        let per = |entries: usize, node: usize| entries * (overhead.record + node);
        let graph = &self.dependency_graph;
        let optimizer = &self.route_optimizer;
        vec![
            MemoryEstimate {
                structure: Structure::LinearScan,
                entries: self.snapshot.len(),
                bytes: per(self.snapshot.len(), 0),
            },
            MemoryEstimate {
                structure: Structure::SearchTree,
                entries: self.search_tree.len(),
                bytes: per(self.search_tree.len(), overhead.search_tree_node),
            },
            MemoryEstimate {
                structure: Structure::BalancedTree,
                entries: self.balanced_tree.len(),
                bytes: per(self.balanced_tree.len(), overhead.balanced_tree_node),
            },
            MemoryEstimate {
                structure: Structure::PriorityQueue,
                entries: self.priority_queue.len(),
                bytes: per(self.priority_queue.len(), overhead.heap_slot),
            },
            MemoryEstimate {
                structure: Structure::DependencyGraph,
                entries: graph.len(),
                bytes: per(graph.len(), overhead.graph_vertex) + graph.edge_count() * overhead.graph_edge,
            },
            MemoryEstimate {
                structure: Structure::RouteOptimizer,
                entries: optimizer.len(),
                bytes: per(optimizer.len(), overhead.optimizer_vertex)
                    + optimizer.edges().len() * overhead.optimizer_edge,
            },
        ]
    }

    /// Averaged timings so far, efficiency gains over linear scan, and memory estimates.
    pub fn performance_comparison(&self) -> PerformanceReport {
        PerformanceReport::build(&self.timings, self.memory_estimates())
    }

    pub fn statistics(&self) -> EngineStatistics {
        EngineStatistics {
            requests: self.snapshot.len(),
            search_tree_height: self.search_tree.height(),
            balanced_tree_height: self.balanced_tree.height(),
            queued: self.priority_queue.len(),
            graph: self.dependency_graph.statistics(),
            optimizer: self.route_optimizer.statistics(),
        }
    }
}
