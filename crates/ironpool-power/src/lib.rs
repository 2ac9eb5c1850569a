//! ironpool-power — per-node power actuation.
//!
//! Boots nodes with Wake-on-LAN magic packets and shuts them down over an
//! SSH session. No pool awareness and no shared state: the controller is
//! safely callable concurrently for different nodes, and retry policy
//! belongs to the caller.
//!
//! # Boot semantics
//!
//! One magic packet is sent per WoL-capable interface, concurrently.
//! The boot succeeds as soon as any single send succeeds (at least one
//! waking mechanism reached the node) and fails only when every interface
//! fails. A node without any WoL-capable interface fails before any send.

pub mod controller;
pub mod error;
pub mod wol;

pub use controller::{PowerConfig, PowerControl, PowerController, SshConfig};
pub use error::PowerError;
