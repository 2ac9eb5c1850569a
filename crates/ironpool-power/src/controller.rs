//! Power controller — boot and shutdown of a single node.
//!
//! `boot` fans out one magic-packet task per WoL-capable interface and
//! returns on the first success. `shutdown` opens an SSH session to the
//! node's management address and runs the configured power-off command.
//! Neither operation retries; the autoscaler owns retry policy.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use ironpool_state::Node;

use crate::error::PowerError;
use crate::wol::send_magic_packet;

/// SSH session settings for remote shutdown.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// User on the target node.
    pub username: String,
    /// Private key path; `None` lets ssh pick its defaults.
    pub key_path: Option<PathBuf>,
    /// Command executed to power the node off.
    pub shutdown_command: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Binary to invoke. Overridable for testing.
    pub program: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: "ironpool".to_string(),
            key_path: None,
            shutdown_command: "sudo poweroff".to_string(),
            connect_timeout: Duration::from_secs(10),
            program: "ssh".to_string(),
        }
    }
}

/// Configuration for the power controller.
#[derive(Debug, Clone)]
pub struct PowerConfig {
    /// Destination for magic packets (typically the broadcast address,
    /// port 9).
    pub wol_target: SocketAddr,
    /// Timeout per magic-packet send.
    pub boot_timeout: Duration,
    /// Timeout for the whole shutdown session.
    pub shutdown_timeout: Duration,
    pub ssh: SshConfig,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            wol_target: "255.255.255.255:9".parse().expect("valid socket addr"),
            boot_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            ssh: SshConfig::default(),
        }
    }
}

/// Boundary for per-node power actions, so callers can be tested without
/// hardware.
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Power a node on via Wake-on-LAN.
    async fn boot(&self, node: &Node) -> Result<(), PowerError>;

    /// Power a node off via a remote shutdown session.
    async fn shutdown(&self, node: &Node) -> Result<(), PowerError>;
}

/// Stateless power controller for physical nodes.
pub struct PowerController {
    config: PowerConfig,
}

impl PowerController {
    pub fn new(config: PowerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PowerControl for PowerController {
    async fn boot(&self, node: &Node) -> Result<(), PowerError> {
        let interfaces = node.wol_interfaces();
        if interfaces.is_empty() {
            return Err(PowerError::NoWolInterface(node.id.clone()));
        }

        let mut set: JoinSet<Result<String, (String, String)>> = JoinSet::new();
        for iface in interfaces {
            let name = iface.name.clone();
            let mac = iface.mac.clone();
            let target = self.config.wol_target;
            let timeout = self.config.boot_timeout;

            set.spawn(async move {
                match tokio::time::timeout(timeout, send_magic_packet(&name, &mac, target)).await
                {
                    Ok(Ok(())) => Ok(name),
                    Ok(Err(e)) => Err((name, e.to_string())),
                    Err(_) => Err((name, "send timed out".to_string())),
                }
            });
        }

        // First success wins: one waking mechanism reaching the node is
        // enough. Remaining sends are abandoned.
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(interface)) => {
                    info!(node_id = %node.id, %interface, "wake-on-lan sent");
                    set.abort_all();
                    return Ok(());
                }
                Ok(Err((interface, error))) => {
                    warn!(node_id = %node.id, %interface, %error, "wake interface failed");
                    failures.push(format!("{interface}: {error}"));
                }
                Err(e) => failures.push(format!("task: {e}")),
            }
        }

        Err(PowerError::AllInterfacesFailed {
            node_id: node.id.clone(),
            failures: failures.join("; "),
        })
    }

    async fn shutdown(&self, node: &Node) -> Result<(), PowerError> {
        let ssh = &self.config.ssh;

        let mut cmd = Command::new(&ssh.program);
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                ssh.connect_timeout.as_secs()
            ));
        if let Some(key) = &ssh.key_path {
            cmd.arg("-i").arg(key);
        }
        cmd.arg(format!("{}@{}", ssh.username, node.address))
            .arg(&ssh.shutdown_command)
            .kill_on_drop(true);

        debug!(node_id = %node.id, address = %node.address, "opening shutdown session");

        let output = tokio::time::timeout(self.config.shutdown_timeout, cmd.output())
            .await
            .map_err(|_| PowerError::Timeout {
                operation: "shutdown".to_string(),
                node_id: node.id.clone(),
            })?
            .map_err(|e| PowerError::Ssh {
                node_id: node.id.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PowerError::Ssh {
                node_id: node.id.clone(),
                detail: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        info!(node_id = %node.id, "shutdown command delivered");
        Ok(())
    }
}
