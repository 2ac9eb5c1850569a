//! Readiness events — the normalized input of the reconciliation loop.

use serde::{Deserialize, Serialize};

use ironpool_state::NodeId;

/// The orchestrator's tri-state judgment of a node's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
    Unknown,
}

impl Readiness {
    /// Parse a raw Ready-condition value ("True" / "False" / "Unknown").
    ///
    /// Returns `None` for anything else; callers log and drop the event.
    pub fn from_condition(raw: &str) -> Option<Self> {
        match raw {
            "True" => Some(Readiness::Ready),
            "False" => Some(Readiness::NotReady),
            "Unknown" => Some(Readiness::Unknown),
            _ => None,
        }
    }
}

/// A normalized node-readiness observation, keyed by the core's node id
/// (not the orchestrator's node name). Transient: never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessEvent {
    pub node_id: NodeId,
    pub readiness: Readiness,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Unix timestamp when the observation was made.
    pub observed_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_values_parse() {
        assert_eq!(Readiness::from_condition("True"), Some(Readiness::Ready));
        assert_eq!(Readiness::from_condition("False"), Some(Readiness::NotReady));
        assert_eq!(
            Readiness::from_condition("Unknown"),
            Some(Readiness::Unknown)
        );
    }

    #[test]
    fn unrecognized_condition_is_rejected() {
        assert_eq!(Readiness::from_condition("true"), None);
        assert_eq!(Readiness::from_condition("Maybe"), None);
        assert_eq!(Readiness::from_condition(""), None);
    }
}
