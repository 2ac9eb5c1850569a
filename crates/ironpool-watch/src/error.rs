//! Error types for the cluster watcher.

use thiserror::Error;

/// Errors raised by a watch subscription.
///
/// Data-quality problems (an undecodable line, a node missing its id
/// label or Ready condition, an unrecognized readiness value) are not
/// errors at this boundary: they are logged and the single event is
/// dropped, keeping the subscription alive.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The transport failed (connect, request, or mid-stream).
    #[error("watch transport error: {0}")]
    Transport(String),
}
