//! Reconciliation loop — drains normalized readiness events into the
//! lifecycle service.
//!
//! A failed event (unregistered node, store error) is logged and skipped;
//! one bad node must never stall status reconciliation for the rest of
//! the cluster.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ironpool_lifecycle::{NodeLifecycle, ReadinessEvent};

/// Spawn the reconciliation loop.
///
/// Runs until `shutdown` flips or the event channel closes.
pub fn spawn(
    lifecycle: NodeLifecycle,
    mut events: mpsc::Receiver<ReadinessEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("reconciliation loop started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("event stream closed, reconciliation loop stopping");
                        return;
                    };
                    match lifecycle.apply_readiness(&event) {
                        Ok(status) => debug!(
                            node_id = %event.node_id,
                            status = ?status.status,
                            "status reconciled"
                        ),
                        Err(e) => warn!(
                            node_id = %event.node_id,
                            error = %e,
                            "failed to apply readiness event"
                        ),
                    }
                }
                _ = shutdown.changed() => {
                    info!("reconciliation loop stopping");
                    return;
                }
            }
        }
    })
}
