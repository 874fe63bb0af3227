//! Errors surfaced by the task pool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread for pool `{pool}`")]
    Spawn {
        pool: String,
        #[source]
        source: std::io::Error,
    },
    /// A subgroup path did not resolve.
    #[error("subgroup `{path}` not found under pool `{pool}`")]
    SubgroupNotFound { pool: String, path: String },
}
