//! Pure status state machine.
//!
//! Readiness mapping is value translation, not transition gating: any
//! current status may receive any readiness-derived status. The policy
//! helpers encode which statuses carry a liveness signal and which mark
//! the node as consumed pool capacity.

use ironpool_state::NodeStatus;

use crate::event::Readiness;

/// Map an orchestrator readiness value onto a node status.
pub fn map_readiness(readiness: Readiness) -> NodeStatus {
    match readiness {
        Readiness::Ready => NodeStatus::ActiveReady,
        Readiness::NotReady => NodeStatus::ActiveNotReady,
        Readiness::Unknown => NodeStatus::Unknown,
    }
}

/// Statuses that carry a liveness signal and stamp `last_heartbeat`.
pub fn heartbeat_bearing(status: NodeStatus) -> bool {
    matches!(status, NodeStatus::Booting | NodeStatus::ActiveReady)
}

/// Statuses that mark the node as consumed capacity in its pool.
///
/// A node that boots or becomes visible to the orchestrator counts toward
/// its pool before the autoscaler's bookkeeping catches up, so a
/// just-booted node cannot be selected twice.
pub fn marks_assigned(status: NodeStatus) -> bool {
    matches!(status, NodeStatus::Booting | NodeStatus::ActiveReady)
}
