//! ironpool-watch — cluster watcher adapter.
//!
//! Maintains a live subscription to the orchestrator's node stream and
//! normalizes raw add/update/delete notifications into `ReadinessEvent`s
//! keyed by the core's node id (carried as an orchestrator-side label,
//! not the orchestrator's own node name).
//!
//! Transport failures never stop the control loop: the watcher logs,
//! sleeps a fixed backoff, and resubscribes, forever. Malformed raw nodes
//! (missing id label, missing Ready condition, unrecognized readiness
//! value) are logged and skipped one event at a time.

pub mod error;
pub mod source;
pub mod watcher;

pub use error::WatchError;
pub use source::{HttpNodeSource, NodeEventSource, RawCondition, RawNode, RawNodeEvent};
pub use watcher::{NODE_ID_LABEL, NodeWatcher, WatcherConfig, normalize};
