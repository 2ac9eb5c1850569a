//! Raw node event sources.
//!
//! A `NodeEventSource` is one subscription attempt: it delivers raw
//! orchestrator node notifications into a channel until the stream ends
//! or the transport fails. Reconnection lives in the watcher, not here.
//!
//! `HttpNodeSource` consumes an NDJSON watch endpoint (one JSON-encoded
//! `RawNodeEvent` per line) over a plain HTTP/1 connection.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::WatchError;

/// A condition reported on a raw orchestrator node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    /// Condition type (the watcher looks for "Ready").
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Raw value: "True", "False", or "Unknown".
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// A node as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    /// The orchestrator's own node name.
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<RawCondition>,
}

/// A raw notification from the orchestrator's node stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RawNodeEvent {
    /// Node added or updated.
    Applied { node: RawNode },
    /// Node removed from the orchestrator's view.
    Deleted { node: RawNode },
}

/// One subscription to the orchestrator's node stream.
#[async_trait]
pub trait NodeEventSource: Send + Sync {
    /// Deliver raw events into `tx` until the stream ends or fails.
    ///
    /// A closed receiver is a clean stop, not an error.
    async fn run(&self, tx: mpsc::Sender<RawNodeEvent>) -> Result<(), WatchError>;
}

/// NDJSON watch stream over HTTP/1.
pub struct HttpNodeSource {
    /// Endpoint address (host:port).
    address: String,
    /// Watch path (e.g. "/v1/nodes/watch").
    path: String,
}

impl HttpNodeSource {
    pub fn new(address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl NodeEventSource for HttpNodeSource {
    async fn run(&self, tx: mpsc::Sender<RawNodeEvent>) -> Result<(), WatchError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        // Drive the connection; it finishes when the stream closes.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "watch connection closed");
            }
        });

        let request = http::Request::builder()
            .uri(&self.path)
            .header(http::header::HOST, &self.address)
            .body(Empty::<Bytes>::new())
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| WatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WatchError::Transport(format!(
                "watch endpoint returned {}",
                response.status()
            )));
        }

        debug!(address = %self.address, path = %self.path, "watch stream connected");

        let mut body = response.into_body();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| WatchError::Transport(e.to_string()))?;
            let Some(data) = frame.data_ref() else {
                continue;
            };
            buffer.extend_from_slice(data);

            // Emit every complete line in the buffer.
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_slice::<RawNodeEvent>(line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            // Receiver gone: the watcher is shutting down.
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        // One bad line is a data-quality issue, not fatal.
                        warn!(error = %e, "dropping undecodable watch line");
                    }
                }
            }
        }

        Ok(())
    }
}
