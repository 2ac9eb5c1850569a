//! Domain types for the Ironpool state store.
//!
//! These types represent the persisted state of physical nodes, node
//! pools, and per-node status records. All types are serializable to/from
//! JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

/// Unique identifier for a physical node.
pub type NodeId = String;

/// Unique identifier for a node pool.
pub type PoolId = String;

// ── Node ──────────────────────────────────────────────────────────

/// A physical machine managed by the control loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Cluster roles this node fulfils.
    pub roles: Vec<NodeRole>,
    /// Management network address (used for SSH shutdown).
    pub address: String,
    /// Installed memory in bytes.
    pub memory_bytes: u64,
    /// Physical CPU core count.
    pub cpu_cores: u32,
    /// CPU single-thread benchmark score.
    pub single_thread_score: u32,
    /// CPU multi-thread benchmark score.
    pub multi_thread_score: u32,
    /// Minimum power consumption in milliwatts (idle envelope).
    pub min_power_mw: u32,
    /// Maximum power consumption in milliwatts (load envelope).
    pub max_power_mw: u32,
    /// Network interfaces, including their Wake-on-LAN capabilities.
    pub interfaces: Vec<NetworkInterface>,
    /// Pool this node is bound to (at most one).
    pub pool_id: Option<PoolId>,
    /// Whether the node currently counts toward its pool's size.
    pub pool_assigned: bool,
    /// Unix timestamp (seconds) when this node was registered.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last mutation.
    pub updated_at: u64,
}

impl Node {
    /// Interfaces that can receive a Wake-on-LAN magic packet.
    pub fn wol_interfaces(&self) -> Vec<&NetworkInterface> {
        self.interfaces.iter().filter(|i| i.wol_capable()).collect()
    }

    /// Whether at least one interface is Wake-on-LAN capable.
    pub fn has_wol(&self) -> bool {
        self.interfaces.iter().any(|i| i.wol_capable())
    }

    pub fn is_worker(&self) -> bool {
        self.roles.contains(&NodeRole::Worker)
    }
}

/// Cluster role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

/// A network interface on a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInterface {
    /// Interface name (e.g. "eth0").
    pub name: String,
    /// MAC address, colon-separated hex (e.g. "46:6C:A8:E6:0C:D3").
    pub mac: String,
    /// Link speed in bits per second.
    pub speed_bps: u64,
    /// Wake-on-LAN flags as reported by the node (ethtool semantics).
    pub wol: Vec<WolFlag>,
}

impl NetworkInterface {
    /// Whether this interface can be woken with a magic packet.
    pub fn wol_capable(&self) -> bool {
        self.wol.contains(&WolFlag::MagicPacket) && !self.wol.contains(&WolFlag::Disabled)
    }
}

/// Wake-on-LAN flags (mirrors ethtool's `wol` modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WolFlag {
    /// Wake on ARP.
    Arp,
    /// Wake on broadcast messages.
    Broadcast,
    /// Wake-on-LAN disabled.
    Disabled,
    /// Wake on magic packet.
    MagicPacket,
    /// Wake on multicast messages.
    Multicast,
    /// Wake on PHY activity.
    Phy,
    /// SecureOn password required for magic packet.
    SecureOn,
    /// Wake on unicast messages.
    Unicast,
}

/// Partial update for a node record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub name: Option<String>,
    pub roles: Option<Vec<NodeRole>>,
    pub address: Option<String>,
    /// `Some(None)` clears the pool binding.
    pub pool_id: Option<Option<PoolId>>,
    pub pool_assigned: Option<bool>,
}

impl NodePatch {
    /// Apply this patch to a node in place.
    pub fn apply(&self, node: &mut Node, now: u64) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(roles) = &self.roles {
            node.roles = roles.clone();
        }
        if let Some(address) = &self.address {
            node.address = address.clone();
        }
        if let Some(pool_id) = &self.pool_id {
            node.pool_id = pool_id.clone();
        }
        if let Some(assigned) = self.pool_assigned {
            node.pool_assigned = assigned;
        }
        node.updated_at = now;
    }
}

// ── Pool ──────────────────────────────────────────────────────────

/// A bucket of interchangeable nodes sharing a capacity profile.
///
/// `count` (assigned nodes) and `max_nodes` (all bound nodes) are derived
/// from node records, not stored here. `min_nodes` is the hard floor a
/// scale request may never go below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePool {
    pub id: PoolId,
    pub name: String,
    /// Whether this pool participates in automatic scaling.
    pub auto_scale: bool,
    /// Hard floor on the number of assigned nodes.
    pub min_nodes: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── Status ────────────────────────────────────────────────────────

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Wake-on-LAN sent, node is powering on.
    Booting,
    /// Node is on and the orchestrator reports it ready.
    ActiveReady,
    /// Node is on but the orchestrator reports it not ready.
    ActiveNotReady,
    /// The orchestrator has not heard from the node recently.
    Unknown,
    /// Node is powered off.
    Inactive,
    /// Node is being shut down.
    ActiveDeleting,
    /// Node is in an error state requiring operator attention.
    Error,
}

/// Per-node status record (keyed 1:1 by node id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub node_id: NodeId,
    pub status: NodeStatus,
    /// Machine-readable reason (e.g. "KubeletReady").
    pub reason: Option<String>,
    /// Human-readable detail.
    pub message: Option<String>,
    /// Unix timestamp of the last liveness signal, if any.
    pub last_heartbeat: Option<u64>,
    /// Unix timestamp of the last status value change.
    pub last_transition: Option<u64>,
}

/// New status value to write for a node.
///
/// `last_transition` is computed by the store: it is updated only when the
/// status value actually changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: NodeStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Heartbeat to record, if the new status carries one.
    pub last_heartbeat: Option<u64>,
}

// ── Transition primitives ─────────────────────────────────────────

/// Expected node state, checked inside the write transaction before a
/// transition is committed. A mismatch means another caller got there
/// first (lost race).
#[derive(Debug, Clone)]
pub struct TransitionGuard {
    /// Required value of `pool_assigned`.
    pub expect_assigned: bool,
    /// Current status must be one of these.
    pub expect_status: Vec<NodeStatus>,
}

/// Result of a guarded transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The guard held (or none was given) and the change was committed.
    Applied { node: Node, status: Status },
    /// The guard failed; nothing was written.
    GuardFailed {
        actual_assigned: bool,
        actual_status: NodeStatus,
    },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}
