//! ironpool-lifecycle — node status state machine and lifecycle service.
//!
//! The lifecycle service is the single choke point for node and status
//! mutation: every status write goes through it so the data-model
//! invariants hold (1:1 status per node, `last_transition` moves only on
//! a real status change, liveness statuses stamp a heartbeat and mark the
//! node as consumed pool capacity).
//!
//! The state machine itself is a pure value translation from orchestrator
//! readiness to a node status; there is no forbidden-transition table for
//! readiness-derived statuses.

pub mod error;
pub mod event;
pub mod machine;
pub mod service;

pub use error::LifecycleError;
pub use event::{Readiness, ReadinessEvent};
pub use service::{
    CONTROLLER_POOL, NodeLifecycle, NodeRegistration, RegisteredInterface, StatusChange,
};
