//! JobMirror model - the lazy synchronization engine.
//!
//! Mirrors a remote hierarchical object graph (server -> job container ->
//! job -> build) inside the client process without ever holding the whole
//! remote graph in memory. Nodes are expanded lazily, refreshed
//! independently with at most one fetch in flight per node, and their
//! children are reconciled by identity so observer-side state on unchanged
//! children survives a refresh. Property and structural changes are
//! coalesced into batched notifications.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod reconcile;
pub mod remote;
pub mod root;

pub use coalesce::{ChangeCoalescer, COALESCE_WINDOW};
pub use config::{ConfigSource, ServerEntry};
pub use error::ModelError;
pub use event::{ChangeEmitter, NodeChange, Property, Subscription, SubscriptionId};
pub use node::{BatchGuard, LoadState, Node, NodeId, RUNNING_BUILD_REFRESH};
pub use remote::RemoteService;
pub use root::Model;
