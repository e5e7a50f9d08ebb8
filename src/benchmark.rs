//! Side-by-side timing of the same query across structures.

use std::collections::BTreeMap;
use std::mem::size_of;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::Result;
use crate::request::{Location, ServiceRequest};
use crate::route_optimizer::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Structure {
    LinearScan,
    SearchTree,
    BalancedTree,
    PriorityQueue,
    DependencyGraph,
    RouteOptimizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum QueryKind {
    SearchById,
    ByStatus,
    Range,
}

/// One structure's answer and how long it took.
#[derive(Debug, Clone, Serialize)]
pub struct Measured<T> {
    pub structure: Structure,
    pub result: T,
    pub elapsed: Duration,
}

pub fn measure<T>(structure: Structure, run: impl FnOnce() -> T) -> Measured<T> {
    let start = Instant::now();
    let result = run();
    Measured {
        structure,
        result,
        elapsed: start.elapsed(),
    }
}

/// The same query answered by several structures.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison<T> {
    pub query: QueryKind,
    pub runs: Vec<Measured<T>>,
}

impl<T> Comparison<T> {
    pub fn get(&self, structure: Structure) -> Option<&Measured<T>> {
        self.runs.iter().find(|run| run.structure == structure)
    }

    pub fn result(&self, structure: Structure) -> Option<&T> {
        self.get(structure).map(|run| &run.result)
    }

    pub fn fastest(&self) -> Option<Structure> {
        self.runs.iter().min_by_key(|run| run.elapsed).map(|run| run.structure)
    }
}

impl<T: PartialEq> Comparison<T> {
    /// True when every structure returned the same answer.
    pub fn agree(&self) -> bool {
        self.runs.windows(2).all(|pair| pair[0].result == pair[1].result)
    }
}

/// Accumulated samples per query kind and structure.
#[derive(Debug, Clone, Default)]
pub struct TimingLog {
    samples: BTreeMap<(QueryKind, Structure), Vec<Duration>>,
}

impl TimingLog {
    pub fn record(&mut self, query: QueryKind, structure: Structure, elapsed: Duration) {
        self.samples.entry((query, structure)).or_default().push(elapsed);
    }

    pub fn record_comparison<T>(&mut self, comparison: &Comparison<T>) {
        for run in &comparison.runs {
            self.record(comparison.query, run.structure, run.elapsed);
        }
    }

    pub fn samples(&self, query: QueryKind, structure: Structure) -> usize {
        self.samples.get(&(query, structure)).map_or(0, Vec::len)
    }

    pub fn average(&self, query: QueryKind, structure: Structure) -> Option<Duration> {
        let samples = self.samples.get(&(query, structure))?;
        let count = u32::try_from(samples.len()).ok().filter(|&n| n > 0)?;
        Some(samples.iter().sum::<Duration>() / count)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn keys(&self) -> impl Iterator<Item = (QueryKind, Structure)> + '_ {
        self.samples.keys().copied()
    }
}

/// Fixed per-entry byte overheads used for memory estimates.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOverhead {
    /// Payload every structure stores per request.
    pub record: usize,
    pub search_tree_node: usize,
    pub balanced_tree_node: usize,
    pub heap_slot: usize,
    pub graph_vertex: usize,
    pub graph_edge: usize,
    pub optimizer_vertex: usize,
    pub optimizer_edge: usize,
}

impl Default for NodeOverhead {
    fn default() -> Self {
        Self {
            record: size_of::<ServiceRequest>(),
            // two child indices
            search_tree_node: 2 * size_of::<Option<usize>>(),
            // two child pointers, height, subtree size
            balanced_tree_node: 2 * size_of::<Option<Box<u8>>>() + size_of::<i32>() + size_of::<usize>(),
            // id -> slot map entry
            heap_slot: size_of::<(u64, usize)>(),
            // forward and reverse adjacency lists
            graph_vertex: 2 * size_of::<Vec<u64>>(),
            graph_edge: 2 * size_of::<u64>(),
            optimizer_vertex: size_of::<Location>(),
            optimizer_edge: size_of::<Edge>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPerformance {
    pub query: QueryKind,
    pub structure: Structure,
    pub samples: usize,
    pub average_micros: f64,
    /// Linear-scan average divided by this structure's average.
    pub efficiency_gain: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryEstimate {
    pub structure: Structure,
    pub entries: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub queries: Vec<QueryPerformance>,
    pub memory: Vec<MemoryEstimate>,
}

impl PerformanceReport {
    pub fn build(log: &TimingLog, memory: Vec<MemoryEstimate>) -> Self {
        let queries = log
            .keys()
            .filter_map(|(query, structure)| {
                let average = log.average(query, structure)?;
                let efficiency_gain = log
                    .average(query, Structure::LinearScan)
                    .filter(|_| !average.is_zero())
                    .map(|linear| linear.as_secs_f64() / average.as_secs_f64());
                Some(QueryPerformance {
                    query,
                    structure,
                    samples: log.samples(query, structure),
                    average_micros: average.as_secs_f64() * 1e6,
                    efficiency_gain,
                })
            })
            .collect();
        Self { queries, memory }
    }

    pub fn query(&self, query: QueryKind, structure: Structure) -> Option<&QueryPerformance> {
        self.queries
            .iter()
            .find(|entry| entry.query == query && entry.structure == structure)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_efficiency_gain() {
        let mut log = TimingLog::default();
        log.record(QueryKind::SearchById, Structure::LinearScan, Duration::from_micros(100));
        log.record(QueryKind::SearchById, Structure::LinearScan, Duration::from_micros(300));
        log.record(QueryKind::SearchById, Structure::BalancedTree, Duration::from_micros(50));

        assert_eq!(
            log.average(QueryKind::SearchById, Structure::LinearScan),
            Some(Duration::from_micros(200))
        );
        let report = PerformanceReport::build(&log, Vec::new());
        let tree = report.query(QueryKind::SearchById, Structure::BalancedTree).unwrap();
        assert_eq!(tree.samples, 1);
        assert!((tree.efficiency_gain.unwrap() - 4.0).abs() < 1e-9);
        let linear = report.query(QueryKind::SearchById, Structure::LinearScan).unwrap();
        assert!((linear.efficiency_gain.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_comparison_agreement() {
        let comparison = Comparison {
            query: QueryKind::SearchById,
            runs: vec![
                measure(Structure::LinearScan, || Some(3)),
                measure(Structure::SearchTree, || Some(3)),
            ],
        };
        assert!(comparison.agree());
        assert_eq!(comparison.result(Structure::SearchTree), Some(&Some(3)));
        assert!(comparison.fastest().is_some());
    }

    #[test]
    fn test_report_serializes() {
        let mut log = TimingLog::default();
        log.record(QueryKind::Range, Structure::SearchTree, Duration::from_micros(10));
        let report = PerformanceReport::build(&log, vec![MemoryEstimate {
            structure: Structure::SearchTree,
            entries: 1,
            bytes: 64,
        }]);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"SearchTree\""));
        assert!(json.contains("\"bytes\": 64"));
    }
}
