//! Error types for the pool autoscaler.

use thiserror::Error;

use ironpool_state::StateError;

use crate::scaler::ScaleOutcome;

/// Errors raised by a scale request.
#[derive(Debug, Error)]
pub enum ScaleError {
    /// The requested pool does not exist.
    #[error("pool '{0}' not found")]
    PoolNotFound(String),

    /// The requested size violates the pool's bounds.
    #[error("pool '{pool_id}': requested {desired} nodes, allowed range is {min}..={max}")]
    OutOfBounds {
        pool_id: String,
        desired: u32,
        min: u32,
        max: u32,
    },

    /// Not enough eligible nodes to satisfy the whole request.
    ///
    /// Selection is all-or-nothing: when fewer candidates exist than the
    /// request needs, no node is touched.
    #[error("pool '{pool_id}': needed {needed} eligible nodes, found {available}")]
    Shortfall {
        pool_id: String,
        needed: u32,
        available: u32,
    },

    /// One or more per-node actions failed after selection.
    ///
    /// Successful nodes stay committed; only the failures need retrying.
    #[error("scale batch incomplete: {} succeeded, {} failed", .0.succeeded.len(), .0.failed.len())]
    BatchIncomplete(ScaleOutcome),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Lifecycle(#[from] ironpool_lifecycle::LifecycleError),
}
