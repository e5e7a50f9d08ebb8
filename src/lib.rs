//! request-index
//!
//! In-memory indexes over field-service requests: ordered lookup trees, a
//! priority heap, a dependency graph, and a spanning-tree route optimizer,
//! kept in step with an external request store by [`engine::RequestEngine`].

pub mod error;
pub mod request;
pub mod priority;
pub mod traits;
pub mod search_tree;
pub mod balanced_tree;
pub mod priority_queue;
pub mod dependency_graph;
pub mod haversine;
pub mod route_optimizer;
pub mod benchmark;
pub mod memory_store;
pub mod http_store;
pub mod engine;

pub use engine::{EngineOptions, RequestEngine};
pub use error::{EngineError, Result};
pub use request::{Location, ServiceRequest};
pub use traits::RequestStore;
