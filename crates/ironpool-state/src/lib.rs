//! ironpool-state — embedded state store for Ironpool.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for nodes, node pools, and per-node status records.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Statuses are keyed 1:1 by node id; pool membership lives on the node
//! record (`pool_id` + `pool_assigned`), so pool `count` and `max_nodes`
//! are derived by scans rather than stored.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks. redb serializes write transactions,
//! which is the only mutual-exclusion point the scaling path relies on: the
//! `transition_node` primitive re-validates a node's assigned flag and
//! status inside the write transaction before committing a change.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
