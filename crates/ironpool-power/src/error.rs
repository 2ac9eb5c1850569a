//! Error types for the power controller.

use thiserror::Error;

/// Errors that can occur during power operations.
#[derive(Debug, Error)]
pub enum PowerError {
    /// The node has no interface capable of Wake-on-LAN. Configuration
    /// problem: nothing was sent.
    #[error("node '{0}' has no Wake-on-LAN capable interface")]
    NoWolInterface(String),

    /// A MAC address could not be parsed.
    #[error("interface '{interface}' has invalid MAC address '{mac}'")]
    InvalidMac { interface: String, mac: String },

    /// A single magic-packet send failed.
    #[error("magic packet send failed: {0}")]
    Send(String),

    /// Every WoL-capable interface failed.
    #[error("all wake interfaces failed for node '{node_id}': {failures}")]
    AllInterfacesFailed { node_id: String, failures: String },

    /// The SSH session could not be established or the command errored.
    #[error("shutdown session failed for node '{node_id}': {detail}")]
    Ssh { node_id: String, detail: String },

    /// The operation exceeded its configured timeout.
    #[error("{operation} timed out for node '{node_id}'")]
    Timeout { operation: String, node_id: String },
}
