//! StateStore — redb-backed state persistence for Ironpool.
//!
//! Provides typed CRUD operations over nodes, pools, and statuses, plus
//! the `transition_node` primitive: a guarded read-modify-write that
//! commits a node patch and a status change in a single write transaction.
//! redb serializes write transactions, so the guard check doubles as the
//! compare-and-swap the scaling path relies on.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(POOLS).map_err(map_err!(Table))?;
        txn.open_table(STATUSES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node record.
    pub fn put_node(&self, node: &Node) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node_id = %node.id, "node stored");
        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: Node =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes.
    pub fn list_nodes(&self) -> StateResult<Vec<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: Node =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// List all nodes bound to a pool (assigned or not).
    pub fn list_pool_nodes(&self, pool_id: &str) -> StateResult<Vec<Node>> {
        Ok(self
            .list_nodes()?
            .into_iter()
            .filter(|n| n.pool_id.as_deref() == Some(pool_id))
            .collect())
    }

    /// Apply a partial update to a node. Fails if the node does not exist.
    pub fn update_node(&self, node_id: &str, patch: &NodePatch) -> StateResult<Node> {
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let node = {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut node: Node = match table.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("node '{node_id}'"))),
            };
            patch.apply(&mut node, now);
            let value = serde_json::to_vec(&node).map_err(map_err!(Serialize))?;
            table
                .insert(node_id, value.as_slice())
                .map_err(map_err!(Write))?;
            node
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%node_id, "node updated");
        Ok(node)
    }

    // ── Pools ──────────────────────────────────────────────────────

    /// Insert or update a pool record.
    pub fn put_pool(&self, pool: &NodePool) -> StateResult<()> {
        let value = serde_json::to_vec(pool).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(POOLS).map_err(map_err!(Table))?;
            table
                .insert(pool.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pool_id = %pool.id, name = %pool.name, "pool stored");
        Ok(())
    }

    /// Get a pool by id.
    pub fn get_pool(&self, pool_id: &str) -> StateResult<Option<NodePool>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        match table.get(pool_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let pool: NodePool =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(pool))
            }
            None => Ok(None),
        }
    }

    /// List all pools.
    pub fn list_pools(&self) -> StateResult<Vec<NodePool>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let pool: NodePool =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(pool);
        }
        Ok(results)
    }

    /// Find a pool by its (unique) name.
    pub fn find_pool_by_name(&self, name: &str) -> StateResult<Option<NodePool>> {
        Ok(self.list_pools()?.into_iter().find(|p| p.name == name))
    }

    /// Number of nodes currently assigned to a pool (its `count`).
    pub fn pool_count(&self, pool_id: &str) -> StateResult<u32> {
        Ok(self
            .list_pool_nodes(pool_id)?
            .iter()
            .filter(|n| n.pool_assigned)
            .count() as u32)
    }

    /// Total nodes ever bound to a pool (its `max_nodes` ceiling).
    pub fn pool_max_nodes(&self, pool_id: &str) -> StateResult<u32> {
        Ok(self.list_pool_nodes(pool_id)?.len() as u32)
    }

    // ── Statuses ───────────────────────────────────────────────────

    /// Insert or replace a status record.
    pub fn put_status(&self, status: &Status) -> StateResult<()> {
        let value = serde_json::to_vec(status).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
            table
                .insert(status.node_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get the status record for a node.
    pub fn get_status(&self, node_id: &str) -> StateResult<Option<Status>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STATUSES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let status: Status =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    // ── Guarded transition ─────────────────────────────────────────

    /// Commit a node patch and an optional status change atomically.
    ///
    /// When a `guard` is given, the node's current `pool_assigned` flag and
    /// status are re-validated inside the write transaction; on mismatch
    /// nothing is written and `GuardFailed` is returned. This is the sole
    /// serialization point between concurrent scale operations.
    ///
    /// `last_transition` on the status record is updated only when the
    /// status value actually changes.
    pub fn transition_node(
        &self,
        node_id: &str,
        guard: Option<&TransitionGuard>,
        node_patch: &NodePatch,
        status_patch: Option<&StatusPatch>,
    ) -> StateResult<TransitionOutcome> {
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut statuses = txn.open_table(STATUSES).map_err(map_err!(Table))?;

            let mut node: Node = match nodes.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("node '{node_id}'"))),
            };
            let mut status: Status = match statuses.get(node_id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => {
                    return Err(StateError::NotFound(format!("status for node '{node_id}'")));
                }
            };

            if let Some(g) = guard
                && (node.pool_assigned != g.expect_assigned
                    || !g.expect_status.contains(&status.status))
            {
                // Dropping the transaction without commit discards it.
                return Ok(TransitionOutcome::GuardFailed {
                    actual_assigned: node.pool_assigned,
                    actual_status: status.status,
                });
            }

            node_patch.apply(&mut node, now);

            if let Some(patch) = status_patch {
                if patch.status != status.status {
                    status.last_transition = Some(now);
                }
                status.status = patch.status;
                status.reason = patch.reason.clone();
                status.message = patch.message.clone();
                status.last_heartbeat = patch.last_heartbeat;
            }

            let node_value = serde_json::to_vec(&node).map_err(map_err!(Serialize))?;
            nodes
                .insert(node_id, node_value.as_slice())
                .map_err(map_err!(Write))?;
            let status_value = serde_json::to_vec(&status).map_err(map_err!(Serialize))?;
            statuses
                .insert(node_id, status_value.as_slice())
                .map_err(map_err!(Write))?;

            TransitionOutcome::Applied { node, status }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(outcome)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
