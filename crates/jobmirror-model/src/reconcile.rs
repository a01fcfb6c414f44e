//! Identity-preserving child reconciliation.
//!
//! Applied whenever a container node's refresh returns a fresh listing of
//! its children. Existing children are matched by the composite key
//! `(classification, URL)`: a match keeps the same node object, so its
//! subtree, load state, and observer-side state survive the refresh; a
//! miss constructs a new node seeded from the listing. The server's order
//! is authoritative. The composite key means a placeholder that gets
//! reclassified through the override tables can never match its old self;
//! it is deliberately replaced by a freshly constructed typed node, and
//! any placeholder-side state is discarded.

use std::collections::HashMap;
use std::sync::Arc;

use jobmirror_protocol::{KindOverrides, Listing, ObjectKind};

use crate::event::Property;
use crate::node::{Node, NodeState};

/// Structural-change predicate: the child list counts as changed when the
/// length differs or any position's URL differs. Identity preservation
/// alone never fires a structural event.
pub(crate) fn children_changed(old: &[Arc<Node>], new: &[Arc<Node>]) -> bool {
    old.len() != new.len() || old.iter().zip(new.iter()).any(|(a, b)| a.url() != b.url())
}

/// Reconcile `parent`'s children against a fresh listing.
///
/// Must run inside a batch scope on `parent` with its state locked; the
/// `Children` change is queued into the pending set when the structural
/// predicate holds. Old children absent from the listing are disposed so
/// their poll timers cannot leak.
pub(crate) fn reconcile_children(
    parent: &Arc<Node>,
    st: &mut NodeState,
    listings: &[Listing],
    overrides: &KindOverrides,
) {
    let mut by_key: HashMap<(ObjectKind, String), Arc<Node>> = st
        .children
        .iter()
        .map(|c| ((c.kind(), c.url().to_string()), Arc::clone(c)))
        .collect();

    let new_children: Vec<Arc<Node>> = listings
        .iter()
        .map(|listing| {
            let key = (listing.kind(overrides), listing.url().to_string());
            match by_key.remove(&key) {
                Some(existing) => existing,
                None => Node::from_listing(parent, listing, key.0),
            }
        })
        .collect();

    if children_changed(&st.children, &new_children) {
        st.pending.insert(Property::Children);
    }
    if !by_key.is_empty() {
        tracing::debug!(
            parent = %parent.url(),
            dropped = by_key.len(),
            "reconciliation dropped children no longer listed"
        );
    }
    st.children = new_children;
    for (_, dropped) in by_key {
        dropped.dispose();
    }
}
