//! Downstream change coalescing.
//!
//! A tree-rendering observer subscribed to many nodes would otherwise
//! repaint once per node event. The coalescer buffers nodes pushed within
//! a short quiet window, deduplicates them by id, and delivers one batch
//! per window. Each push restarts the window, so a burst of refreshes
//! lands as a single signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::node::{Node, NodeId};

/// Default quiet window between the last push and delivery.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(5);

/// Debouncing batcher for node change signals.
pub struct ChangeCoalescer {
    tx: mpsc::UnboundedSender<Arc<Node>>,
    task: JoinHandle<()>,
}

impl ChangeCoalescer {
    /// Create a coalescer with the given quiet window. Returns the
    /// coalescer and the receiver the delivery batches arrive on.
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<Arc<Node>>>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Node>>();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut seen: Vec<NodeId> = vec![first.id()];
                let mut batch: Vec<Arc<Node>> = vec![first];
                loop {
                    let wait = tokio::time::sleep(window);
                    tokio::pin!(wait);
                    tokio::select! {
                        more = rx.recv() => match more {
                            Some(node) => {
                                if !seen.contains(&node.id()) {
                                    seen.push(node.id());
                                    batch.push(node);
                                }
                            }
                            None => break,
                        },
                        _ = &mut wait => break,
                    }
                }
                if out_tx.send(batch).is_err() {
                    return;
                }
            }
        });

        (Self { tx, task }, out_rx)
    }

    /// Buffer a changed node into the current window.
    pub fn push(&self, node: Arc<Node>) {
        let _ = self.tx.send(node);
    }
}

impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
