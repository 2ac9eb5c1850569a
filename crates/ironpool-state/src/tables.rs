//! redb table definitions for the Ironpool state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Nodes and pools are keyed by their id; statuses share the node id.

use redb::TableDefinition;

/// Physical node records keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Node pool records keyed by `{pool_id}`.
pub const POOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pools");

/// Per-node status records keyed by `{node_id}` (1:1 with nodes).
pub const STATUSES: TableDefinition<&str, &[u8]> = TableDefinition::new("statuses");
