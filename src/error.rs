//! Error type shared by every index structure and the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Dequeue or peek on a heap with no elements.
    #[error("priority queue is empty")]
    EmptyQueue,

    /// Topological sort or critical path requested on a graph containing a cycle.
    #[error("operation invalid on cyclic graph")]
    CyclicGraph,

    /// A dependency edge referenced a request that was never registered.
    #[error("request {0} is not registered in the dependency graph")]
    UnknownRequest(u64),

    #[error("request store error: {0}")]
    Store(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
