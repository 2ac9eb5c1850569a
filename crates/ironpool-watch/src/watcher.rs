//! Watch loop — normalization and reconnect-with-backoff.
//!
//! The watcher owns one `NodeEventSource` and republishes its raw events
//! as normalized `ReadinessEvent`s. When the source ends or fails it is
//! restarted after a fixed backoff, indefinitely: availability of the
//! control loop takes priority over failing fast.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ironpool_lifecycle::{Readiness, ReadinessEvent};

use crate::source::{NodeEventSource, RawNode, RawNodeEvent};

/// Label on the orchestrator node carrying the core's node id.
pub const NODE_ID_LABEL: &str = "ironpool.io/node-id";

/// Condition type inspected for readiness.
const READY_CONDITION: &str = "Ready";

/// Configuration for the watch loop.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Delay before resubscribing after a disconnect.
    pub reconnect_backoff: Duration,
    /// Capacity of the normalized event channel.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(3),
            channel_capacity: 64,
        }
    }
}

/// The cluster watcher adapter.
pub struct NodeWatcher {
    source: Arc<dyn NodeEventSource>,
    config: WatcherConfig,
}

impl NodeWatcher {
    pub fn new(source: Arc<dyn NodeEventSource>, config: WatcherConfig) -> Self {
        Self { source, config }
    }

    /// Start the watch.
    ///
    /// Returns the normalized event stream and the loop handle. The loop
    /// runs until `shutdown` flips; dropping the receiver also winds the
    /// loop down on its next send.
    pub fn start(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<ReadinessEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let source = self.source.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            run_watch_loop(source, config, tx, shutdown).await;
        });

        info!("cluster watcher started");
        (rx, handle)
    }
}

async fn run_watch_loop(
    source: Arc<dyn NodeEventSource>,
    config: WatcherConfig,
    tx: mpsc::Sender<ReadinessEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let (raw_tx, mut raw_rx) = mpsc::channel(config.channel_capacity);
        let mut subscription = Box::pin(source.run(raw_tx));

        loop {
            tokio::select! {
                result = &mut subscription => {
                    match result {
                        Ok(()) => debug!("watch stream ended"),
                        Err(e) => warn!(error = %e, "watch stream failed"),
                    }
                    break;
                }
                raw = raw_rx.recv() => {
                    let Some(raw) = raw else { break };
                    if let Some(event) = normalize(&raw)
                        && tx.send(event).await.is_err()
                    {
                        debug!("event consumer gone, watcher stopping");
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    info!("cluster watcher stopping");
                    return;
                }
            }
        }

        // Restart forever; there is no max-retry cutoff.
        warn!(
            backoff_secs = config.reconnect_backoff.as_secs(),
            "restarting watch subscription"
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_backoff) => {}
            _ = shutdown.changed() => {
                info!("cluster watcher stopping");
                return;
            }
        }
    }
}

/// Normalize a raw orchestrator notification into a readiness event.
///
/// Returns `None` (with a logged warning) for raw nodes missing the id
/// label or the Ready condition, or carrying an unrecognized readiness
/// value. These are recoverable data-quality issues; the single event is
/// dropped and the watch continues.
pub fn normalize(raw: &RawNodeEvent) -> Option<ReadinessEvent> {
    match raw {
        RawNodeEvent::Applied { node } => {
            let node_id = node_id_of(node)?;
            let condition = node
                .conditions
                .iter()
                .find(|c| c.condition_type == READY_CONDITION);
            let Some(condition) = condition else {
                warn!(node = %node.name, "raw node has no Ready condition, skipping");
                return None;
            };

            let Some(readiness) = Readiness::from_condition(&condition.status) else {
                warn!(
                    node = %node.name,
                    value = %condition.status,
                    "unrecognized readiness value, dropping event"
                );
                return None;
            };

            Some(ReadinessEvent {
                node_id,
                readiness,
                reason: condition.reason.clone(),
                message: condition.message.clone(),
                observed_at: epoch_secs(),
            })
        }
        // The node left the orchestrator's view: best-effort readiness
        // loss, not deregistration.
        RawNodeEvent::Deleted { node } => {
            let node_id = node_id_of(node)?;
            Some(ReadinessEvent {
                node_id,
                readiness: Readiness::Unknown,
                reason: Some("NodeDeleted".to_string()),
                message: Some("node removed from orchestrator view".to_string()),
                observed_at: epoch_secs(),
            })
        }
    }
}

fn node_id_of(node: &RawNode) -> Option<String> {
    match node.labels.get(NODE_ID_LABEL) {
        Some(id) => Some(id.clone()),
        None => {
            warn!(node = %node.name, label = NODE_ID_LABEL, "raw node has no id label, skipping");
            None
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::source::RawCondition;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn raw_node(id: Option<&str>, status: Option<&str>) -> RawNode {
        let mut labels = HashMap::new();
        if let Some(id) = id {
            labels.insert(NODE_ID_LABEL.to_string(), id.to_string());
        }
        let conditions = status
            .map(|s| {
                vec![RawCondition {
                    condition_type: "Ready".to_string(),
                    status: s.to_string(),
                    reason: Some("KubeletReady".to_string()),
                    message: None,
                }]
            })
            .unwrap_or_default();
        RawNode {
            name: "worker-0".to_string(),
            labels,
            conditions,
        }
    }

    #[test]
    fn normalize_ready_values() {
        for (raw, expected) in [
            ("True", Readiness::Ready),
            ("False", Readiness::NotReady),
            ("Unknown", Readiness::Unknown),
        ] {
            let event = normalize(&RawNodeEvent::Applied {
                node: raw_node(Some("n1"), Some(raw)),
            })
            .unwrap();
            assert_eq!(event.node_id, "n1");
            assert_eq!(event.readiness, expected);
            assert_eq!(event.reason.as_deref(), Some("KubeletReady"));
        }
    }

    #[test]
    fn normalize_drops_unlabeled_node() {
        let event = normalize(&RawNodeEvent::Applied {
            node: raw_node(None, Some("True")),
        });
        assert!(event.is_none());
    }

    #[test]
    fn normalize_drops_node_without_ready_condition() {
        let event = normalize(&RawNodeEvent::Applied {
            node: raw_node(Some("n1"), None),
        });
        assert!(event.is_none());
    }

    #[test]
    fn normalize_drops_unrecognized_readiness_value() {
        let event = normalize(&RawNodeEvent::Applied {
            node: raw_node(Some("n1"), Some("Perhaps")),
        });
        assert!(event.is_none());
    }

    #[test]
    fn normalize_delete_synthesizes_readiness_loss() {
        let event = normalize(&RawNodeEvent::Deleted {
            node: raw_node(Some("n1"), None),
        })
        .unwrap();
        assert_eq!(event.readiness, Readiness::Unknown);
        assert_eq!(event.reason.as_deref(), Some("NodeDeleted"));
    }

    /// Source that replays one batch per subscription, then fails.
    struct ReplaySource {
        batches: Mutex<Vec<Vec<RawNodeEvent>>>,
        subscriptions: AtomicU32,
    }

    #[async_trait]
    impl NodeEventSource for ReplaySource {
        async fn run(&self, tx: mpsc::Sender<RawNodeEvent>) -> Result<(), WatchError> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            let batch = {
                let mut batches = self.batches.lock().unwrap();
                if batches.is_empty() {
                    Vec::new()
                } else {
                    batches.remove(0)
                }
            };
            for event in batch {
                let _ = tx.send(event).await;
            }
            Err(WatchError::Transport("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn watch_loop_forwards_and_reconnects() {
        let source = Arc::new(ReplaySource {
            batches: Mutex::new(vec![
                vec![RawNodeEvent::Applied {
                    node: raw_node(Some("n1"), Some("True")),
                }],
                vec![RawNodeEvent::Applied {
                    node: raw_node(Some("n2"), Some("False")),
                }],
            ]),
            subscriptions: AtomicU32::new(0),
        });

        let watcher = NodeWatcher::new(
            source.clone(),
            WatcherConfig {
                reconnect_backoff: Duration::from_millis(10),
                channel_capacity: 8,
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut events, handle) = watcher.start(shutdown_rx);

        // Events from both subscriptions arrive despite the failure in
        // between.
        let first = events.recv().await.unwrap();
        assert_eq!(first.node_id, "n1");
        assert_eq!(first.readiness, Readiness::Ready);

        let second = events.recv().await.unwrap();
        assert_eq!(second.node_id, "n2");
        assert_eq!(second.readiness, Readiness::NotReady);

        assert!(source.subscriptions.load(Ordering::SeqCst) >= 2);

        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn watch_loop_stops_on_shutdown() {
        let source = Arc::new(ReplaySource {
            batches: Mutex::new(Vec::new()),
            subscriptions: AtomicU32::new(0),
        });
        let watcher = NodeWatcher::new(source, WatcherConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_events, handle) = watcher.start(shutdown_rx);

        let _ = shutdown_tx.send(true);
        // The loop must exit promptly even while backing off.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }
}
