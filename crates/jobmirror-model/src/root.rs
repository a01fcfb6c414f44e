//! The process-scoped model context.
//!
//! Owns the root aggregate above all configured server subtrees and the
//! background task that re-runs the root refresh on configuration
//! changes. Constructed explicitly and torn down on drop; there is no
//! implicit global instance.

use std::sync::Arc;

use tokio::task::JoinHandle;

use jobmirror_protocol::ObjectKind;

use crate::config::ConfigSource;
use crate::error::ModelError;
use crate::node::{ModelShared, Node};
use crate::remote::RemoteService;

/// The mirror of one set of configured servers.
pub struct Model {
    root: Arc<Node>,
    watcher: JoinHandle<()>,
}

impl Model {
    /// Build a model over the given collaborators and start watching the
    /// configuration source for changes.
    pub fn new(remote: Arc<dyn RemoteService>, config: Arc<dyn ConfigSource>) -> Self {
        let mut rx = config.watch();
        let shared = Arc::new(ModelShared { remote, config });
        let root = Node::new_root(shared);

        let weak_root = Arc::downgrade(&root);
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(root) = weak_root.upgrade() else {
                    return;
                };
                tracing::debug!("configuration changed, refreshing root aggregate");
                if let Err(e) = root.refresh_data().await {
                    tracing::warn!(error = %e, "configuration-triggered refresh failed");
                }
            }
        });

        Self { root, watcher }
    }

    /// The root aggregate. Follows the same node contract as every other
    /// node; its refresh reads the configuration source instead of the
    /// remote service.
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// The configured server nodes currently mirrored.
    pub fn servers(&self) -> Vec<Arc<Node>> {
        self.root.children()
    }

    /// Refresh every distinct parent of an unknown placeholder.
    ///
    /// Used after the operator promotes a class name through the override
    /// tables: the parents' next reconciliation replaces the placeholders
    /// with typed nodes. Returns the first failure after attempting all.
    pub async fn refresh_unknown_parents(&self) -> Result<(), ModelError> {
        let mut parents: Vec<Arc<Node>> = Vec::new();
        for placeholder in self.root.descendants(Some(ObjectKind::Unknown)) {
            if let Some(parent) = placeholder.parent() {
                if !parents.iter().any(|p| p.id() == parent.id()) {
                    parents.push(parent);
                }
            }
        }
        let results =
            futures::future::join_all(parents.iter().map(|p| p.refresh_data())).await;
        results.into_iter().collect()
    }

    /// Stop the configuration watcher and cancel timers in the tree.
    pub fn shutdown(&self) {
        self.watcher.abort();
        self.root.dispose();
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.shutdown();
    }
}
