//! Pool autoscaler.
//!
//! A scale request resizes one pool to a desired node count by waking or
//! shutting down physical machines. The flow is: validate bounds, select
//! candidates in power order (all-or-nothing), then run one task per node
//! that claims the node with a guarded transition before touching power.
//!
//! The guarded claim is the only serialization point between concurrent
//! requests: a node whose claim fails was taken by another request and is
//! dropped from the batch without a replacement. Per-node power failures
//! never roll back sibling successes.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use ironpool_lifecycle::{NodeLifecycle, StatusChange};
use ironpool_power::PowerControl;
use ironpool_state::{
    Node, NodeId, NodePatch, NodePool, NodeStatus, PoolId, StateStore, TransitionGuard,
};

use crate::error::ScaleError;
use crate::selection;

/// Which way a scale request moved the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    Up,
    Down,
    Unchanged,
}

/// What a scale request accomplished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleOutcome {
    pub pool_id: PoolId,
    pub direction: ScaleDirection,
    /// Nodes whose power action and state commit both landed.
    pub succeeded: Vec<NodeId>,
    /// Nodes whose power action failed, with the failure detail.
    pub failed: Vec<(NodeId, String)>,
}

impl ScaleOutcome {
    fn unchanged(pool_id: &str) -> Self {
        Self {
            pool_id: pool_id.to_string(),
            direction: ScaleDirection::Unchanged,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Result of one per-node scale task.
enum NodeResult {
    Succeeded(NodeId),
    /// Claim guard failed: another request took the node first.
    LostRace(NodeId),
    Failed(NodeId, String),
}

/// Resizes pools by waking and shutting down their nodes.
#[derive(Clone)]
pub struct PoolScaler {
    state: StateStore,
    lifecycle: NodeLifecycle,
    power: Arc<dyn PowerControl>,
}

impl PoolScaler {
    pub fn new(state: StateStore, lifecycle: NodeLifecycle, power: Arc<dyn PowerControl>) -> Self {
        Self {
            state,
            lifecycle,
            power,
        }
    }

    /// Resize `pool_id` to `desired` assigned nodes.
    ///
    /// `desired` must lie within `min_nodes..=max_nodes`, where the upper
    /// bound is the number of nodes bound to the pool. On a partial
    /// failure the successes stay committed and the request returns
    /// `ScaleError::BatchIncomplete` carrying the full outcome.
    pub async fn scale_pool(
        &self,
        pool_id: &str,
        desired: u32,
    ) -> Result<ScaleOutcome, ScaleError> {
        let pool = self
            .state
            .get_pool(pool_id)?
            .ok_or_else(|| ScaleError::PoolNotFound(pool_id.to_string()))?;

        let max = self.state.pool_max_nodes(pool_id)?;
        if desired < pool.min_nodes || desired > max {
            return Err(ScaleError::OutOfBounds {
                pool_id: pool_id.to_string(),
                desired,
                min: pool.min_nodes,
                max,
            });
        }

        let count = self.state.pool_count(pool_id)?;
        info!(%pool_id, pool = %pool.name, count, desired, "scale request");

        match desired.cmp(&count) {
            Ordering::Equal => {
                debug!(%pool_id, count, "pool already at desired size");
                Ok(ScaleOutcome::unchanged(pool_id))
            }
            Ordering::Greater => self.scale_up(&pool, desired - count).await,
            Ordering::Less => self.scale_down(&pool, count - desired).await,
        }
    }

    /// Wake `delta` nodes, cheapest power envelope first.
    async fn scale_up(&self, pool: &NodePool, delta: u32) -> Result<ScaleOutcome, ScaleError> {
        let mut candidates = self.boot_candidates(&pool.id)?;
        if (candidates.len() as u32) < delta {
            return Err(ScaleError::Shortfall {
                pool_id: pool.id.clone(),
                needed: delta,
                available: candidates.len() as u32,
            });
        }
        candidates.truncate(delta as usize);

        let mut tasks = JoinSet::new();
        for node in candidates {
            let lifecycle = self.lifecycle.clone();
            let power = self.power.clone();
            tasks.spawn(async move { boot_one(lifecycle, power, node).await });
        }
        self.collect(pool, ScaleDirection::Up, tasks).await
    }

    /// Shut down `delta` nodes, most power-hungry first.
    async fn scale_down(&self, pool: &NodePool, delta: u32) -> Result<ScaleOutcome, ScaleError> {
        let mut candidates = self.shutdown_candidates(&pool.id)?;
        if (candidates.len() as u32) < delta {
            return Err(ScaleError::Shortfall {
                pool_id: pool.id.clone(),
                needed: delta,
                available: candidates.len() as u32,
            });
        }
        candidates.truncate(delta as usize);

        let mut tasks = JoinSet::new();
        for (node, status) in candidates {
            let lifecycle = self.lifecycle.clone();
            let power = self.power.clone();
            tasks.spawn(async move { shutdown_one(lifecycle, power, node, status).await });
        }
        self.collect(pool, ScaleDirection::Down, tasks).await
    }

    /// Nodes that can be woken: bound but unassigned, powered off, and
    /// reachable over Wake-on-LAN.
    fn boot_candidates(&self, pool_id: &str) -> Result<Vec<Node>, ScaleError> {
        let mut out = Vec::new();
        for node in self.state.list_pool_nodes(pool_id)? {
            if node.pool_assigned || !node.has_wol() {
                continue;
            }
            let Some(status) = self.state.get_status(&node.id)? else {
                continue;
            };
            if status.status == NodeStatus::Inactive {
                out.push(node);
            }
        }
        out.sort_by(selection::boot_order);
        Ok(out)
    }

    /// Nodes that can be shut down: assigned and currently active.
    fn shutdown_candidates(&self, pool_id: &str) -> Result<Vec<(Node, NodeStatus)>, ScaleError> {
        let mut out = Vec::new();
        for node in self.state.list_pool_nodes(pool_id)? {
            if !node.pool_assigned {
                continue;
            }
            let Some(status) = self.state.get_status(&node.id)? else {
                continue;
            };
            if matches!(
                status.status,
                NodeStatus::ActiveReady | NodeStatus::ActiveNotReady
            ) {
                out.push((node, status.status));
            }
        }
        out.sort_by(|a, b| selection::shutdown_order(&a.0, &b.0));
        Ok(out)
    }

    async fn collect(
        &self,
        pool: &NodePool,
        direction: ScaleDirection,
        mut tasks: JoinSet<NodeResult>,
    ) -> Result<ScaleOutcome, ScaleError> {
        let mut outcome = ScaleOutcome {
            pool_id: pool.id.clone(),
            direction,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(NodeResult::Succeeded(id)) => outcome.succeeded.push(id),
                Ok(NodeResult::LostRace(id)) => {
                    // The batch shrinks; a replacement candidate would
                    // race the very request that won this node.
                    info!(node_id = %id, "node claimed by another request, dropped from batch");
                }
                Ok(NodeResult::Failed(id, detail)) => {
                    warn!(node_id = %id, %detail, "scale action failed");
                    outcome.failed.push((id, detail));
                }
                Err(e) => warn!(error = %e, "scale task aborted"),
            }
        }

        outcome.succeeded.sort();
        outcome.failed.sort_by(|a, b| a.0.cmp(&b.0));

        if outcome.failed.is_empty() {
            info!(
                pool_id = %pool.id,
                ?direction,
                succeeded = outcome.succeeded.len(),
                "scale batch complete"
            );
            Ok(outcome)
        } else {
            Err(ScaleError::BatchIncomplete(outcome))
        }
    }
}

/// Claim, wake, and commit one node.
async fn boot_one(
    lifecycle: NodeLifecycle,
    power: Arc<dyn PowerControl>,
    node: Node,
) -> NodeResult {
    let guard = TransitionGuard {
        expect_assigned: false,
        expect_status: vec![NodeStatus::Inactive],
    };
    match lifecycle.transition(&node.id, Some(&guard), Some(true), None) {
        Ok(outcome) if !outcome.is_applied() => return NodeResult::LostRace(node.id),
        Err(e) => return NodeResult::Failed(node.id, e.to_string()),
        Ok(_) => {}
    }

    match power.boot(&node).await {
        Ok(()) => {
            let change = StatusChange::new(NodeStatus::Booting, "ScaleUp")
                .with_message("wake-on-lan packet sent");
            match lifecycle.apply_status(&node.id, change) {
                Ok(_) => NodeResult::Succeeded(node.id),
                Err(e) => NodeResult::Failed(node.id, e.to_string()),
            }
        }
        Err(e) => {
            // The wake never went out; release the claim so the node
            // stays selectable for a retry.
            let release = NodePatch {
                pool_assigned: Some(false),
                ..Default::default()
            };
            if let Err(release_err) = lifecycle.update_node(&node.id, &release) {
                warn!(node_id = %node.id, error = %release_err, "failed to release boot claim");
            }
            NodeResult::Failed(node.id, e.to_string())
        }
    }
}

/// Claim, power off, and commit one node.
///
/// The claim moves the node to `ActiveDeleting` while keeping it assigned,
/// so a concurrent scale-up never counts it as free capacity mid-shutdown.
async fn shutdown_one(
    lifecycle: NodeLifecycle,
    power: Arc<dyn PowerControl>,
    node: Node,
    previous: NodeStatus,
) -> NodeResult {
    let guard = TransitionGuard {
        expect_assigned: true,
        expect_status: vec![previous],
    };
    let claim = lifecycle.transition(
        &node.id,
        Some(&guard),
        None,
        Some(StatusChange::new(NodeStatus::ActiveDeleting, "ScaleDown")),
    );
    match claim {
        Ok(outcome) if !outcome.is_applied() => return NodeResult::LostRace(node.id),
        Err(e) => return NodeResult::Failed(node.id, e.to_string()),
        Ok(_) => {}
    }

    match power.shutdown(&node).await {
        Ok(()) => {
            let commit = lifecycle.transition(
                &node.id,
                None,
                Some(false),
                Some(StatusChange::new(NodeStatus::Inactive, "ScaleDown")
                    .with_message("node powered off")),
            );
            match commit {
                Ok(_) => NodeResult::Succeeded(node.id),
                Err(e) => NodeResult::Failed(node.id, e.to_string()),
            }
        }
        Err(e) => {
            // The node is still running; put its previous status back.
            let restore =
                StatusChange::new(previous, "ShutdownFailed").with_message(e.to_string());
            if let Err(restore_err) = lifecycle.apply_status(&node.id, restore) {
                warn!(node_id = %node.id, error = %restore_err, "failed to restore status after shutdown failure");
            }
            NodeResult::Failed(node.id, e.to_string())
        }
    }
}
