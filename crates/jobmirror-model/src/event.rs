//! Per-node change notification.
//!
//! Every node carries its own [`ChangeEmitter`]. Observers subscribe
//! explicitly and must release the subscription with
//! [`ChangeEmitter::unsubscribe`] when done; nothing is reclaimed
//! automatically.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::node::Node;

/// The observable properties of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Expanded,
    Children,
    LoadState,
    LastError,
    Label,
    Description,
    Status,
    Buildable,
    Health,
}

/// A change to a node's observable properties.
///
/// `properties` of `None` is the sentinel for "treat every property as
/// changed", used for state transitions and structural replacement signals.
#[derive(Debug, Clone)]
pub struct NodeChange {
    /// The node that changed.
    pub node: Arc<Node>,
    /// The deduplicated set of changed properties, or `None` for all.
    pub properties: Option<Vec<Property>>,
}

impl NodeChange {
    /// Whether `prop` should be considered changed by this event.
    pub fn property_changed(&self, prop: Property) -> bool {
        match &self.properties {
            None => true,
            Some(props) => props.contains(&prop),
        }
    }
}

/// Identifies one subscription on one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription: the id to release it with and the event stream.
pub struct Subscription {
    /// Pass to [`ChangeEmitter::unsubscribe`] to release the subscription.
    pub id: SubscriptionId,
    /// Stream of change events for the node.
    pub rx: mpsc::UnboundedReceiver<NodeChange>,
}

struct EmitterInner {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<NodeChange>)>,
}

/// Publish/subscribe channel for one node's change events.
pub struct ChangeEmitter {
    inner: Mutex<EmitterInner>,
}

impl ChangeEmitter {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(EmitterInner {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, tx));
        Subscription { id, rx }
    }

    /// Release a subscription. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub(crate) fn emit(&self, change: NodeChange) {
        let inner = self.inner.lock();
        for (_, tx) in &inner.subscribers {
            // A closed receiver just drops the event; the slot stays until
            // the observer releases it.
            let _ = tx.send(change.clone());
        }
    }
}
