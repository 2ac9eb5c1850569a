//! Node lifecycle service — the mutation choke point.
//!
//! Every node/status change funnels through `NodeLifecycle` so that the
//! heartbeat, transition-timestamp, and pool-assignment invariants are
//! applied uniformly. The node patch and the status write always commit
//! in the same store transaction.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use ironpool_state::{
    NetworkInterface, Node, NodePatch, NodePool, NodeRole, NodeStatus, StateStore, Status,
    StatusPatch, TransitionGuard, TransitionOutcome, WolFlag,
};

use crate::error::LifecycleError;
use crate::event::ReadinessEvent;
use crate::machine;

/// Pool holding control-plane nodes; never auto-scaled.
pub const CONTROLLER_POOL: &str = "controllers";

/// A status change request handled by the lifecycle service.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: NodeStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl StatusChange {
    pub fn new(status: NodeStatus, reason: &str) -> Self {
        Self {
            status,
            reason: Some(reason.to_string()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Interface descriptor supplied at registration time.
#[derive(Debug, Clone)]
pub struct RegisteredInterface {
    pub name: String,
    pub mac: String,
    pub speed_bps: u64,
    pub wol: Vec<WolFlag>,
}

/// Everything a node reports when it first registers.
#[derive(Debug, Clone)]
pub struct NodeRegistration {
    pub name: String,
    pub roles: Vec<NodeRole>,
    pub address: String,
    pub memory_bytes: u64,
    pub cpu_cores: u32,
    pub single_thread_score: u32,
    pub multi_thread_score: u32,
    pub min_power_mw: u32,
    pub max_power_mw: u32,
    pub interfaces: Vec<RegisteredInterface>,
}

/// Single choke point for node and status mutation.
#[derive(Clone)]
pub struct NodeLifecycle {
    state: StateStore,
}

impl NodeLifecycle {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Apply a normalized readiness event: run the status state machine
    /// and commit the resulting status write.
    pub fn apply_readiness(&self, event: &ReadinessEvent) -> Result<Status, LifecycleError> {
        let status = machine::map_readiness(event.readiness);
        debug!(
            node_id = %event.node_id,
            ?event.readiness,
            ?status,
            "applying readiness event"
        );

        let change = StatusChange {
            status,
            reason: event.reason.clone(),
            message: event.message.clone(),
        };
        match self.transition(&event.node_id, None, None, Some(change))? {
            TransitionOutcome::Applied { status, .. } => Ok(status),
            // Unreachable without a guard; kept for exhaustiveness.
            TransitionOutcome::GuardFailed { .. } => {
                Err(LifecycleError::UnknownNode(event.node_id.clone()))
            }
        }
    }

    /// Unguarded status write with the standard bookkeeping.
    pub fn apply_status(
        &self,
        node_id: &str,
        change: StatusChange,
    ) -> Result<Status, LifecycleError> {
        match self.transition(node_id, None, None, Some(change))? {
            TransitionOutcome::Applied { status, .. } => Ok(status),
            TransitionOutcome::GuardFailed { .. } => {
                Err(LifecycleError::UnknownNode(node_id.to_string()))
            }
        }
    }

    /// Guarded transition: node patch and status write in one transaction.
    ///
    /// `assigned` overrides the assignment side effect; when `None`, a
    /// liveness-bearing status (`Booting`, `ActiveReady`) marks the node
    /// assigned so a just-booted node cannot be double-selected.
    pub fn transition(
        &self,
        node_id: &str,
        guard: Option<&TransitionGuard>,
        assigned: Option<bool>,
        change: Option<StatusChange>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let assigned = match (assigned, &change) {
            (Some(explicit), _) => Some(explicit),
            (None, Some(c)) if machine::marks_assigned(c.status) => Some(true),
            (None, _) => None,
        };

        let node_patch = NodePatch {
            pool_assigned: assigned,
            ..Default::default()
        };

        let status_patch = change.map(|c| StatusPatch {
            status: c.status,
            reason: c.reason,
            message: c.message,
            last_heartbeat: machine::heartbeat_bearing(c.status).then(epoch_secs),
        });

        let outcome =
            self.state
                .transition_node(node_id, guard, &node_patch, status_patch.as_ref())?;

        if let TransitionOutcome::GuardFailed {
            actual_assigned,
            actual_status,
        } = &outcome
        {
            warn!(
                %node_id,
                actual_assigned,
                ?actual_status,
                "transition guard failed, lost race"
            );
        }

        Ok(outcome)
    }

    /// Generic attribute update (role, address, assignment flag).
    pub fn update_node(&self, node_id: &str, patch: &NodePatch) -> Result<Node, LifecycleError> {
        Ok(self.state.update_node(node_id, patch)?)
    }

    /// Register a new node: create the record, seed its status, and bind
    /// it to a pool matching its capacity profile.
    ///
    /// Workers land in a `cpu{cores}.memory{bytes}` pool; control-plane
    /// nodes in the `controllers` pool (never auto-scaled). Pools are
    /// created on first use with a floor of one node.
    pub fn register_node(&self, reg: NodeRegistration) -> Result<Node, LifecycleError> {
        let now = epoch_secs();
        let pool = self.pool_for(&reg, now)?;

        let node = Node {
            id: generate_id("node", &reg.name),
            name: reg.name,
            roles: reg.roles,
            address: reg.address,
            memory_bytes: reg.memory_bytes,
            cpu_cores: reg.cpu_cores,
            single_thread_score: reg.single_thread_score,
            multi_thread_score: reg.multi_thread_score,
            min_power_mw: reg.min_power_mw,
            max_power_mw: reg.max_power_mw,
            interfaces: reg
                .interfaces
                .into_iter()
                .map(|i| NetworkInterface {
                    name: i.name,
                    mac: i.mac,
                    speed_bps: i.speed_bps,
                    wol: i.wol,
                })
                .collect(),
            pool_id: Some(pool.id.clone()),
            // A registering node is powered on and counts as capacity.
            pool_assigned: true,
            created_at: now,
            updated_at: now,
        };
        self.state.put_node(&node)?;

        self.state.put_status(&Status {
            node_id: node.id.clone(),
            status: NodeStatus::ActiveReady,
            reason: Some("NodeRegistered".to_string()),
            message: Some("Node registered".to_string()),
            last_heartbeat: Some(now),
            last_transition: Some(now),
        })?;

        info!(node_id = %node.id, name = %node.name, pool = %pool.name, "node registered");
        Ok(node)
    }

    /// Find or create the pool matching a registration's capacity profile.
    fn pool_for(&self, reg: &NodeRegistration, now: u64) -> Result<NodePool, LifecycleError> {
        let is_worker = reg.roles.contains(&NodeRole::Worker);
        let name = if is_worker {
            format!("cpu{}.memory{}", reg.cpu_cores, reg.memory_bytes)
        } else {
            CONTROLLER_POOL.to_string()
        };

        if let Some(pool) = self.state.find_pool_by_name(&name)? {
            return Ok(pool);
        }

        let pool = NodePool {
            id: generate_id("pool", &name),
            name,
            auto_scale: is_worker,
            min_nodes: 1,
            created_at: now,
            updated_at: now,
        };
        self.state.put_pool(&pool)?;
        info!(pool_id = %pool.id, name = %pool.name, "pool created");
        Ok(pool)
    }
}

fn generate_id(prefix: &str, seed: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    epoch_secs().hash(&mut hasher);
    format!("{prefix}-{:08x}", hasher.finish() as u32)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Readiness;

    fn test_registration(name: &str, roles: Vec<NodeRole>) -> NodeRegistration {
        NodeRegistration {
            name: name.to_string(),
            roles,
            address: "10.0.0.10".to_string(),
            memory_bytes: 8 * 1024 * 1024 * 1024,
            cpu_cores: 8,
            single_thread_score: 1000,
            multi_thread_score: 8000,
            min_power_mw: 2000,
            max_power_mw: 16000,
            interfaces: vec![RegisteredInterface {
                name: "eth0".to_string(),
                mac: "46:6C:A8:E6:0C:D3".to_string(),
                speed_bps: 1_000_000_000,
                wol: vec![WolFlag::MagicPacket],
            }],
        }
    }

    fn setup() -> (StateStore, NodeLifecycle) {
        let state = StateStore::open_in_memory().unwrap();
        let lifecycle = NodeLifecycle::new(state.clone());
        (state, lifecycle)
    }

    fn readiness_event(node_id: &str, readiness: Readiness) -> ReadinessEvent {
        ReadinessEvent {
            node_id: node_id.to_string(),
            readiness,
            reason: Some("KubeletReady".to_string()),
            message: Some("kubelet is posting ready status".to_string()),
            observed_at: 2000,
        }
    }

    #[test]
    fn register_worker_creates_capacity_pool() {
        let (state, lifecycle) = setup();

        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        let pool_id = node.pool_id.clone().unwrap();
        let pool = state.get_pool(&pool_id).unwrap().unwrap();
        assert_eq!(pool.name, "cpu8.memory8589934592");
        assert!(pool.auto_scale);
        assert_eq!(pool.min_nodes, 1);

        // Registration seeds an active status and counts as capacity.
        assert!(node.pool_assigned);
        let status = state.get_status(&node.id).unwrap().unwrap();
        assert_eq!(status.status, NodeStatus::ActiveReady);
        assert_eq!(status.reason.as_deref(), Some("NodeRegistered"));
        assert!(status.last_heartbeat.is_some());
    }

    #[test]
    fn register_second_worker_reuses_pool() {
        let (state, lifecycle) = setup();

        let a = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();
        let b = lifecycle
            .register_node(test_registration("w2", vec![NodeRole::Worker]))
            .unwrap();

        assert_eq!(a.pool_id, b.pool_id);
        assert_eq!(state.list_pools().unwrap().len(), 1);
        assert_eq!(state.pool_count(a.pool_id.as_deref().unwrap()).unwrap(), 2);
    }

    #[test]
    fn register_control_plane_uses_controller_pool() {
        let (state, lifecycle) = setup();

        let node = lifecycle
            .register_node(test_registration("cp1", vec![NodeRole::ControlPlane]))
            .unwrap();

        let pool = state
            .get_pool(node.pool_id.as_deref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(pool.name, CONTROLLER_POOL);
        assert!(!pool.auto_scale);
    }

    #[test]
    fn readiness_maps_and_writes_status() {
        let (state, lifecycle) = setup();
        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        let status = lifecycle
            .apply_readiness(&readiness_event(&node.id, Readiness::NotReady))
            .unwrap();
        assert_eq!(status.status, NodeStatus::ActiveNotReady);
        assert_eq!(status.reason.as_deref(), Some("KubeletReady"));
        // Not liveness-bearing: heartbeat cleared.
        assert!(status.last_heartbeat.is_none());

        let status = lifecycle
            .apply_readiness(&readiness_event(&node.id, Readiness::Ready))
            .unwrap();
        assert_eq!(status.status, NodeStatus::ActiveReady);
        assert!(status.last_heartbeat.is_some());

        let status = lifecycle
            .apply_readiness(&readiness_event(&node.id, Readiness::Unknown))
            .unwrap();
        assert_eq!(status.status, NodeStatus::Unknown);

        // Node record still present and assigned.
        assert!(state.get_node(&node.id).unwrap().unwrap().pool_id.is_some());
    }

    #[test]
    fn readiness_for_unregistered_node_fails() {
        let (_state, lifecycle) = setup();

        let err = lifecycle.apply_readiness(&readiness_event("ghost", Readiness::Ready));
        assert!(err.is_err());
    }

    #[test]
    fn last_transition_moves_only_on_status_change() {
        let (state, lifecycle) = setup();
        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        lifecycle
            .apply_readiness(&readiness_event(&node.id, Readiness::NotReady))
            .unwrap();
        let first = state.get_status(&node.id).unwrap().unwrap();

        // Same readiness again: status value unchanged, transition stays.
        lifecycle
            .apply_readiness(&readiness_event(&node.id, Readiness::NotReady))
            .unwrap();
        let second = state.get_status(&node.id).unwrap().unwrap();
        assert_eq!(first.last_transition, second.last_transition);
    }

    #[test]
    fn liveness_status_marks_node_assigned() {
        let (state, lifecycle) = setup();
        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        // Force the node unassigned and inactive.
        lifecycle
            .update_node(
                &node.id,
                &NodePatch {
                    pool_assigned: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        lifecycle
            .apply_status(&node.id, StatusChange::new(NodeStatus::Inactive, "Test"))
            .unwrap();
        assert!(!state.get_node(&node.id).unwrap().unwrap().pool_assigned);

        // Booting marks it assigned again.
        lifecycle
            .apply_status(&node.id, StatusChange::new(NodeStatus::Booting, "ScaleUp"))
            .unwrap();
        assert!(state.get_node(&node.id).unwrap().unwrap().pool_assigned);
    }

    #[test]
    fn explicit_assignment_overrides_side_effect() {
        let (state, lifecycle) = setup();
        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        // Scale-down commit: Inactive with an explicit unassign.
        let outcome = lifecycle
            .transition(
                &node.id,
                None,
                Some(false),
                Some(StatusChange::new(NodeStatus::Inactive, "ScaleDown")),
            )
            .unwrap();
        assert!(outcome.is_applied());

        let stored = state.get_node(&node.id).unwrap().unwrap();
        assert!(!stored.pool_assigned);
        let status = state.get_status(&node.id).unwrap().unwrap();
        assert_eq!(status.status, NodeStatus::Inactive);
    }

    #[test]
    fn guarded_transition_loses_race_cleanly() {
        let (state, lifecycle) = setup();
        let node = lifecycle
            .register_node(test_registration("w1", vec![NodeRole::Worker]))
            .unwrap();

        // Guard expects an inactive unassigned node; it is active/assigned.
        let outcome = lifecycle
            .transition(
                &node.id,
                Some(&TransitionGuard {
                    expect_assigned: false,
                    expect_status: vec![NodeStatus::Inactive],
                }),
                Some(true),
                Some(StatusChange::new(NodeStatus::Booting, "ScaleUp")),
            )
            .unwrap();
        assert!(!outcome.is_applied());

        // Nothing changed.
        let status = state.get_status(&node.id).unwrap().unwrap();
        assert_eq!(status.status, NodeStatus::ActiveReady);
    }
}
