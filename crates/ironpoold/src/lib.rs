//! ironpoold — library surface of the Ironpool daemon.
//!
//! The binary wires the subsystems together; the router and the
//! reconciliation loop live here so integration tests can drive them
//! without a listening socket.

pub mod api;
pub mod reconcile;
