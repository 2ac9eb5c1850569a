//! Error types for the lifecycle service.

use thiserror::Error;

use ironpool_state::StateError;

/// Errors that can occur while applying lifecycle changes.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("node '{0}' is not registered")]
    UnknownNode(String),
}
