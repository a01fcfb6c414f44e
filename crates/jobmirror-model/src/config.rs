//! The configuration seam.
//!
//! The root aggregate rebuilds its children from this source instead of a
//! remote fetch, and re-runs its refresh whenever the source signals a
//! change.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use jobmirror_protocol::KindOverrides;

/// One configured server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// The server's base URL; identity key for root reconciliation.
    pub url: Url,
    /// The label shown for the server.
    pub label: String,
}

/// Read access to the mirror's configuration.
pub trait ConfigSource: Send + Sync {
    /// The ordered list of configured servers.
    fn servers(&self) -> Vec<ServerEntry>;

    /// The current class-name override sets.
    fn overrides(&self) -> KindOverrides;

    /// A receiver signalled after every configuration change.
    fn watch(&self) -> watch::Receiver<()>;
}
