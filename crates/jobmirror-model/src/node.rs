//! The mirrored node and its load-state machine.
//!
//! A [`Node`] is the client-side mirror of one remote object. It starts
//! `sparse` (only the listing from its parent is known), loads lazily on
//! first expansion, and keeps at most one refresh in flight; callers that
//! ask for a refresh while one is running are joined onto the in-flight
//! future and receive the same outcome. All property mutations performed
//! by a refresh cycle are collected in a batch scope and flushed as a
//! single change event when the cycle finishes, on success and failure
//! alike.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use jobmirror_protocol::{
    BuildListing, BuildOutcome, BuildRecord, ContainerRecord, JobListing, JobRecord, JobStatus,
    Listing, ObjectKind, ServerRecord,
};

use crate::config::{ConfigSource, ServerEntry};
use crate::error::ModelError;
use crate::event::{ChangeEmitter, NodeChange, Property, Subscription, SubscriptionId};
use crate::reconcile::{children_changed, reconcile_children};
use crate::remote::RemoteService;

/// Time between self-scheduled refreshes for builds that are still running.
pub const RUNNING_BUILD_REFRESH: Duration = Duration::from_secs(3);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique node identity. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The load states of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Only the listing from the parent is known; never refreshed.
    Sparse,
    /// A refresh is in flight.
    Loading,
    /// A refresh has succeeded at least once.
    Loaded,
    /// The most recent refresh failed; previous data, if any, is retained.
    Error,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sparse => "sparse",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Kind-specific payload. Closed set; the only construction dispatch point
/// is [`Node::from_listing`].
pub(crate) enum KindState {
    Root,
    Server {
        entry: ServerEntry,
        data: Option<ServerRecord>,
    },
    Container {
        listing: JobListing,
        data: Option<ContainerRecord>,
    },
    Job {
        listing: JobListing,
        data: Option<JobRecord>,
    },
    Build {
        listing: BuildListing,
        data: Option<BuildRecord>,
        poll: Option<JoinHandle<()>>,
    },
    Unknown {
        listing: JobListing,
    },
}

pub(crate) struct NodeState {
    pub(crate) expanded: bool,
    pub(crate) load_state: LoadState,
    pub(crate) last_error: String,
    pub(crate) children: Vec<Arc<Node>>,
    pub(crate) batch_depth: u32,
    pub(crate) pending: HashSet<Property>,
    pub(crate) kind: KindState,
}

/// Shared collaborators handed to every node of one model tree.
pub(crate) struct ModelShared {
    pub(crate) remote: Arc<dyn RemoteService>,
    pub(crate) config: Arc<dyn ConfigSource>,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<(), ModelError>>>;

/// The client-side mirror of one remote object.
pub struct Node {
    id: NodeId,
    kind: ObjectKind,
    url: Url,
    parent: Weak<Node>,
    pub(crate) shared: Arc<ModelShared>,
    pub(crate) state: Mutex<NodeState>,
    emitter: ChangeEmitter,
    inflight: Mutex<Option<RefreshFuture>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Node {
    fn new(
        kind: ObjectKind,
        url: Url,
        parent: Weak<Node>,
        shared: Arc<ModelShared>,
        kind_state: KindState,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            kind,
            url,
            parent,
            shared,
            state: Mutex::new(NodeState {
                expanded: false,
                load_state: LoadState::Sparse,
                last_error: String::new(),
                children: Vec::new(),
                batch_depth: 0,
                pending: HashSet::new(),
                kind: kind_state,
            }),
            emitter: ChangeEmitter::new(),
            inflight: Mutex::new(None),
        })
    }

    pub(crate) fn new_root(shared: Arc<ModelShared>) -> Arc<Self> {
        let url = Url::parse("jobmirror://servers/").expect("static url");
        Self::new(ObjectKind::Root, url, Weak::new(), shared, KindState::Root)
    }

    pub(crate) fn new_server(parent: &Arc<Node>, entry: ServerEntry) -> Arc<Self> {
        Self::new(
            ObjectKind::Server,
            entry.url.clone(),
            Arc::downgrade(parent),
            Arc::clone(&parent.shared),
            KindState::Server { entry, data: None },
        )
    }

    /// Construct a node for a listing entry classified as `kind`.
    ///
    /// Classifications a listing cannot satisfy (a job listing classified
    /// as a build, or vice versa) degrade to the unknown placeholder
    /// instead of failing the parent's refresh.
    pub(crate) fn from_listing(
        parent: &Arc<Node>,
        listing: &Listing,
        kind: ObjectKind,
    ) -> Arc<Self> {
        let parent_weak = Arc::downgrade(parent);
        let shared = Arc::clone(&parent.shared);
        match (kind, listing) {
            (ObjectKind::JobContainer, Listing::Job(l)) => Self::new(
                ObjectKind::JobContainer,
                l.url.clone(),
                parent_weak,
                shared,
                KindState::Container {
                    listing: l.clone(),
                    data: None,
                },
            ),
            (ObjectKind::Job, Listing::Job(l)) => Self::new(
                ObjectKind::Job,
                l.url.clone(),
                parent_weak,
                shared,
                KindState::Job {
                    listing: l.clone(),
                    data: None,
                },
            ),
            (ObjectKind::Build, Listing::Build(l)) => Self::new(
                ObjectKind::Build,
                l.url.clone(),
                parent_weak,
                shared,
                KindState::Build {
                    listing: l.clone(),
                    data: None,
                    poll: None,
                },
            ),
            (_, Listing::Job(l)) => Self::new(
                ObjectKind::Unknown,
                l.url.clone(),
                parent_weak,
                shared,
                KindState::Unknown { listing: l.clone() },
            ),
            (_, Listing::Build(l)) => Self::new(
                ObjectKind::Build,
                l.url.clone(),
                parent_weak,
                shared,
                KindState::Build {
                    listing: l.clone(),
                    data: None,
                    poll: None,
                },
            ),
        }
    }

    /// The unique id of this node instance. Useful for tracking
    /// subscriptions to a specific instance.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The kind of remote object this node mirrors.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The URL of the mirrored object. Immutable for the node's lifetime.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The parent node, `None` only for the root aggregate.
    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    /// The label to display for the node. Falls back to listing-derived
    /// values until the node's own refresh has succeeded.
    pub fn label(&self) -> String {
        let st = self.state.lock();
        match &st.kind {
            KindState::Root => String::new(),
            KindState::Server { entry, .. } => entry.label.clone(),
            KindState::Container { listing, data } => data
                .as_ref()
                .map(|d| d.display_name.clone())
                .unwrap_or_else(|| listing.name.clone()),
            KindState::Job { listing, data } => data
                .as_ref()
                .and_then(|d| d.display_name.clone())
                .unwrap_or_else(|| listing.name.clone()),
            KindState::Build { listing, data, .. } => data
                .as_ref()
                .and_then(|d| d.display_name.clone())
                .unwrap_or_else(|| format!("#{}", listing.number)),
            KindState::Unknown { listing } => listing.name.clone(),
        }
    }

    /// A longer description of the node, empty until loaded.
    pub fn description(&self) -> String {
        let st = self.state.lock();
        let desc = match &st.kind {
            KindState::Root => None,
            KindState::Server { data, .. } => data.as_ref().and_then(|d| d.description.clone()),
            KindState::Container { data, .. } => data.as_ref().and_then(|d| d.description.clone()),
            KindState::Job { data, .. } => data.as_ref().and_then(|d| d.description.clone()),
            KindState::Build { data, .. } => data.as_ref().and_then(|d| d.description.clone()),
            KindState::Unknown { .. } => None,
        };
        desc.unwrap_or_default()
    }

    /// The node's load state.
    pub fn load_state(&self) -> LoadState {
        self.state.lock().load_state
    }

    /// The message of the most recent refresh failure. Cleared when the
    /// next refresh starts.
    pub fn last_error(&self) -> String {
        self.state.lock().last_error.clone()
    }

    /// Whether the node has been expanded.
    pub fn expanded(&self) -> bool {
        self.state.lock().expanded
    }

    /// The current child list. Replaced only by reconciliation.
    pub fn children(&self) -> Vec<Arc<Node>> {
        self.state.lock().children.clone()
    }

    /// The raw remote class name, for unknown placeholders.
    pub fn class_name(&self) -> Option<String> {
        match &self.state.lock().kind {
            KindState::Unknown { listing } => Some(listing.class_name.clone()),
            _ => None,
        }
    }

    /// Whether a job node is buildable; false until loaded.
    pub fn buildable(&self) -> bool {
        match &self.state.lock().kind {
            KindState::Job { data, .. } => data.as_ref().map(|d| d.buildable).unwrap_or(false),
            _ => false,
        }
    }

    /// The worst health score of a job node, 100 until loaded.
    pub fn health(&self) -> i64 {
        match &self.state.lock().kind {
            KindState::Job { data, .. } => data.as_ref().map(|d| d.health()).unwrap_or(100),
            _ => 100,
        }
    }

    /// The status of a job node, `None` until loaded or for other kinds.
    pub fn job_status(&self) -> Option<JobStatus> {
        match &self.state.lock().kind {
            KindState::Job { data, .. } => data.as_ref().map(|d| d.status()),
            _ => None,
        }
    }

    /// The outcome of a build node, `None` until loaded or for other kinds.
    pub fn build_outcome(&self) -> Option<BuildOutcome> {
        match &self.state.lock().kind {
            KindState::Build { data, .. } => data.as_ref().map(|d| d.outcome()),
            _ => None,
        }
    }

    /// A snapshot of a build node's record, `None` until loaded.
    pub fn build_record(&self) -> Option<BuildRecord> {
        match &self.state.lock().kind {
            KindState::Build { data, .. } => data.clone(),
            _ => None,
        }
    }

    /// Subscribe to change events for this node. The subscription must be
    /// released with [`Node::unsubscribe`]; nothing is reclaimed
    /// automatically.
    pub fn subscribe(&self) -> Subscription {
        self.emitter.subscribe()
    }

    /// Release a subscription taken with [`Node::subscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.emitter.unsubscribe(id)
    }

    /// Number of live subscriptions on this node.
    pub fn subscriber_count(&self) -> usize {
        self.emitter.subscriber_count()
    }

    /// All descendants, depth-first, optionally filtered by kind.
    pub fn descendants(&self, kind: Option<ObjectKind>) -> Vec<Arc<Node>> {
        let children = self.children();
        let mut out: Vec<Arc<Node>> = children
            .iter()
            .filter(|c| kind.map_or(true, |k| c.kind() == k))
            .cloned()
            .collect();
        for child in &children {
            out.extend(child.descendants(kind));
        }
        out
    }

    /// Expand the node: mark it expanded, notify, and load its data.
    ///
    /// Idempotent; a second call while already expanded does nothing.
    pub async fn expand(self: &Arc<Self>) -> Result<(), ModelError> {
        {
            let mut st = self.state.lock();
            if st.expanded {
                return Ok(());
            }
            st.expanded = true;
        }
        self.notify_property(Property::Expanded);
        self.refresh_data().await
    }

    /// Refresh the node's own data and, for containers, its child list.
    ///
    /// Does nothing if the node has never been expanded. If a refresh is
    /// already in flight the caller is joined onto it and receives the
    /// same outcome; exactly one fetch happens per cycle.
    pub async fn refresh_data(self: &Arc<Self>) -> Result<(), ModelError> {
        let fut = {
            if !self.state.lock().expanded {
                return Ok(());
            }
            let mut inflight = self.inflight.lock();
            match &*inflight {
                Some(f) => f.clone(),
                None => {
                    let f = Arc::clone(self).run_refresh().boxed().shared();
                    *inflight = Some(f.clone());
                    f
                }
            }
        };
        fut.await
    }

    /// Fire-and-forget trigger of a new build. Only meaningful for job
    /// nodes; the server decides what to do with anything else.
    pub async fn trigger(&self) -> Result<(), ModelError> {
        tracing::debug!(url = %self.url, "triggering build");
        self.shared.remote.trigger_build(&self.url).await
    }

    /// One full refresh cycle. Everything runs inside a single batch scope
    /// so observers see one coalesced event per cycle, also when the fetch
    /// fails or unwinds.
    async fn run_refresh(self: Arc<Self>) -> Result<(), ModelError> {
        tracing::debug!(id = self.id.value(), url = %self.url, kind = %self.kind, "refresh started");
        let batch = self.batch();
        {
            let mut st = self.state.lock();
            st.load_state = LoadState::Loading;
            st.pending.insert(Property::LoadState);
            if !st.last_error.is_empty() {
                st.last_error.clear();
                st.pending.insert(Property::LastError);
            }
        }
        let result = self.do_refresh().await;
        {
            let mut st = self.state.lock();
            match &result {
                Ok(()) => {
                    st.load_state = LoadState::Loaded;
                }
                Err(e) => {
                    st.load_state = LoadState::Error;
                    st.last_error = e.to_string();
                    st.pending.insert(Property::LastError);
                }
            }
            st.pending.insert(Property::LoadState);
        }
        drop(batch);
        *self.inflight.lock() = None;
        if let Err(e) = &result {
            tracing::warn!(id = self.id.value(), url = %self.url, error = %e, "refresh failed");
        }
        result
    }

    /// Kind dispatch for the fetch-and-apply step.
    async fn do_refresh(self: &Arc<Self>) -> Result<(), ModelError> {
        match self.kind {
            ObjectKind::Root => {
                self.apply_root();
                Ok(())
            }
            ObjectKind::Server => {
                let rec = self.shared.remote.fetch_server(&self.url).await?;
                self.apply_server(rec);
                Ok(())
            }
            ObjectKind::JobContainer => {
                let rec = self.shared.remote.fetch_container(&self.url).await?;
                self.apply_container(rec);
                Ok(())
            }
            ObjectKind::Job => {
                let rec = self.shared.remote.fetch_job(&self.url).await?;
                self.apply_job(rec);
                Ok(())
            }
            ObjectKind::Build => {
                let rec = self.shared.remote.fetch_build(&self.url).await?;
                self.apply_build(rec);
                Ok(())
            }
            // Placeholders have nothing to fetch.
            ObjectKind::Unknown => Ok(()),
        }
    }

    /// Rebuild the root aggregate's children from configuration.
    ///
    /// Matched servers keep their identity; a matched server whose
    /// configured label changed is updated in place and notifies on its
    /// own emitter.
    fn apply_root(self: &Arc<Self>) {
        let entries = self.shared.config.servers();
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let mut by_url: std::collections::HashMap<String, Arc<Node>> = st
            .children
            .iter()
            .map(|c| (c.url().to_string(), Arc::clone(c)))
            .collect();
        let new_children: Vec<Arc<Node>> = entries
            .into_iter()
            .map(|entry| match by_url.remove(entry.url.as_str()) {
                Some(existing) => {
                    existing.update_entry(entry);
                    existing
                }
                None => Node::new_server(self, entry),
            })
            .collect();

        if children_changed(&st.children, &new_children) {
            st.pending.insert(Property::Children);
        }
        st.children = new_children;
        drop(guard);
        for (_, dropped) in by_url {
            dropped.dispose();
        }
    }

    fn apply_server(self: &Arc<Self>, rec: ServerRecord) {
        let overrides = self.shared.config.overrides();
        let listings: Vec<Listing> = rec.jobs.iter().cloned().map(Listing::from).collect();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if let KindState::Server { data, .. } = &mut st.kind {
            if changed(data.as_ref().map(|o| &o.description), &rec.description) {
                st.pending.insert(Property::Description);
            }
            *data = Some(rec);
        }
        reconcile_children(self, st, &listings, &overrides);
    }

    fn apply_container(self: &Arc<Self>, rec: ContainerRecord) {
        let overrides = self.shared.config.overrides();
        let listings: Vec<Listing> = rec.jobs.iter().cloned().map(Listing::from).collect();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if let KindState::Container { data, .. } = &mut st.kind {
            if changed(data.as_ref().map(|o| &o.description), &rec.description) {
                st.pending.insert(Property::Description);
            }
            if changed(data.as_ref().map(|o| &o.display_name), &rec.display_name) {
                st.pending.insert(Property::Label);
            }
            *data = Some(rec);
        }
        reconcile_children(self, st, &listings, &overrides);
    }

    fn apply_job(self: &Arc<Self>, rec: JobRecord) {
        let overrides = self.shared.config.overrides();
        let listings: Vec<Listing> = rec.builds.iter().cloned().map(Listing::from).collect();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if let KindState::Job { data, .. } = &mut st.kind {
            if changed(data.as_ref().map(|o| &o.buildable), &rec.buildable) {
                st.pending.insert(Property::Buildable);
            }
            if changed(data.as_ref().map(|o| &o.description), &rec.description) {
                st.pending.insert(Property::Description);
            }
            if changed(data.as_ref().map(|o| &o.display_name), &rec.display_name) {
                st.pending.insert(Property::Label);
            }
            if changed(data.as_ref().map(|o| &o.color), &rec.color) {
                st.pending.insert(Property::Status);
            }
            if changed(data.as_ref().map(|o| o.health()).as_ref(), &rec.health()) {
                st.pending.insert(Property::Health);
            }
            *data = Some(rec);
        }
        reconcile_children(self, st, &listings, &overrides);
    }

    /// Apply a fetched build record and manage the self-poll timer: the
    /// previous timer is cancelled first, and a new one is scheduled only
    /// while the build reports it is still running.
    fn apply_build(self: &Arc<Self>, rec: BuildRecord) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let KindState::Build { data, poll, .. } = &mut st.kind else {
            return;
        };
        if let Some(handle) = poll.take() {
            handle.abort();
        }
        if changed(data.as_ref().map(|o| &o.building), &rec.building)
            || changed(data.as_ref().map(|o| &o.result), &rec.result)
        {
            st.pending.insert(Property::Status);
        }
        if changed(data.as_ref().map(|o| &o.description), &rec.description) {
            st.pending.insert(Property::Description);
        }
        if changed(data.as_ref().map(|o| &o.display_name), &rec.display_name) {
            st.pending.insert(Property::Label);
        }
        let building = rec.building;
        *data = Some(rec);
        if building {
            let weak = Arc::downgrade(self);
            tracing::debug!(id = self.id.value(), "build still running, scheduling self-poll");
            *poll = Some(tokio::spawn(async move {
                tokio::time::sleep(RUNNING_BUILD_REFRESH).await;
                if let Some(node) = weak.upgrade() {
                    // A failed poll records the error on the node and does
                    // not reschedule; the next user-driven refresh resumes.
                    if let Err(e) = node.refresh_data().await {
                        tracing::debug!(id = node.id.value(), error = %e, "self-poll failed");
                    }
                }
            }));
        }
    }

    /// Cancel timers in this subtree. Called for nodes dropped by
    /// reconciliation and on model shutdown.
    pub(crate) fn dispose(&self) {
        let children = {
            let mut st = self.state.lock();
            if let KindState::Build { poll, .. } = &mut st.kind {
                if let Some(handle) = poll.take() {
                    handle.abort();
                }
            }
            st.children.clone()
        };
        for child in children {
            child.dispose();
        }
    }

    /// Replace a server node's configuration entry, notifying when the
    /// label changed. The URL never changes here; root reconciliation only
    /// matches entries by URL.
    fn update_entry(self: &Arc<Self>, entry: ServerEntry) {
        let label_changed = {
            let mut st = self.state.lock();
            match &mut st.kind {
                KindState::Server { entry: current, .. } => {
                    let differs = current.label != entry.label;
                    *current = entry;
                    differs
                }
                _ => false,
            }
        };
        if label_changed {
            self.notify_property(Property::Label);
        }
    }

    /// Open a batch scope. While any scope is open, property notifications
    /// accumulate into a deduplicated pending set; one event carrying the
    /// whole set fires when the outermost scope closes. The guard flushes
    /// on drop, so the event fires on error and unwind paths too.
    pub fn batch(self: &Arc<Self>) -> BatchGuard {
        self.state.lock().batch_depth += 1;
        BatchGuard {
            node: Arc::clone(self),
        }
    }

    /// Send, or queue when inside a batch, a single property change.
    pub(crate) fn notify_property(self: &Arc<Self>, prop: Property) {
        let immediate = {
            let mut st = self.state.lock();
            if st.batch_depth > 0 {
                st.pending.insert(prop);
                false
            } else {
                true
            }
        };
        if immediate {
            self.emitter.emit(NodeChange {
                node: Arc::clone(self),
                properties: Some(vec![prop]),
            });
        }
    }
}

fn changed<T: PartialEq>(old: Option<&T>, new: &T) -> bool {
    old.map_or(true, |o| o != new)
}

/// RAII batch scope. See [`Node::batch`].
pub struct BatchGuard {
    node: Arc<Node>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let pending = {
            let mut st = self.node.state.lock();
            st.batch_depth -= 1;
            if st.batch_depth == 0 && !st.pending.is_empty() {
                Some(st.pending.drain().collect::<Vec<_>>())
            } else {
                None
            }
        };
        if let Some(props) = pending {
            self.node.emitter.emit(NodeChange {
                node: Arc::clone(&self.node),
                properties: Some(props),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::watch;

    struct NullRemote;

    #[async_trait]
    impl RemoteService for NullRemote {
        async fn fetch_server(&self, _url: &Url) -> Result<ServerRecord, ModelError> {
            Err(ModelError::Fetch("unreachable".into()))
        }
        async fn fetch_container(&self, _url: &Url) -> Result<ContainerRecord, ModelError> {
            Err(ModelError::Fetch("unreachable".into()))
        }
        async fn fetch_job(&self, _url: &Url) -> Result<JobRecord, ModelError> {
            Err(ModelError::Fetch("unreachable".into()))
        }
        async fn fetch_build(&self, _url: &Url) -> Result<BuildRecord, ModelError> {
            Err(ModelError::Fetch("unreachable".into()))
        }
        async fn trigger_build(&self, _url: &Url) -> Result<(), ModelError> {
            Ok(())
        }
    }

    struct EmptyConfig {
        tx: watch::Sender<()>,
    }

    impl EmptyConfig {
        fn new() -> Self {
            Self {
                tx: watch::channel(()).0,
            }
        }
    }

    impl ConfigSource for EmptyConfig {
        fn servers(&self) -> Vec<ServerEntry> {
            Vec::new()
        }
        fn overrides(&self) -> jobmirror_protocol::KindOverrides {
            jobmirror_protocol::KindOverrides::default()
        }
        fn watch(&self) -> watch::Receiver<()> {
            self.tx.subscribe()
        }
    }

    fn test_node() -> Arc<Node> {
        let shared = Arc::new(ModelShared {
            remote: Arc::new(NullRemote),
            config: Arc::new(EmptyConfig::new()),
        });
        Node::new_root(shared)
    }

    #[test]
    fn node_ids_are_unique_and_monotonic() {
        let a = test_node();
        let b = test_node();
        assert!(b.id().value() > a.id().value());
    }

    #[tokio::test]
    async fn nested_batches_flush_once_with_union() {
        let node = test_node();
        let mut sub = node.subscribe();

        {
            let _outer = node.batch();
            node.notify_property(Property::Label);
            {
                let _inner = node.batch();
                node.notify_property(Property::Description);
                node.notify_property(Property::Label);
            }
            // Inner exit must not flush; still inside the outer scope.
            assert!(
                sub.rx.try_recv().is_err(),
                "no event before the outermost exit"
            );
            node.notify_property(Property::Status);
        }

        let change = sub.rx.try_recv().expect("one event after outermost exit");
        let props = change.properties.expect("explicit property set");
        assert_eq!(props.len(), 3, "deduplicated union: {props:?}");
        for p in [Property::Label, Property::Description, Property::Status] {
            assert!(props.contains(&p), "missing {p:?}");
        }
        assert!(sub.rx.try_recv().is_err(), "exactly one event");
        node.unsubscribe(sub.id);
    }

    #[tokio::test]
    async fn empty_batch_emits_nothing() {
        let node = test_node();
        let mut sub = node.subscribe();
        {
            let _b = node.batch();
        }
        assert!(sub.rx.try_recv().is_err());
        node.unsubscribe(sub.id);
    }

    #[tokio::test]
    async fn notification_outside_batch_is_immediate() {
        let node = test_node();
        let mut sub = node.subscribe();
        node.notify_property(Property::Label);
        let change = sub.rx.try_recv().expect("immediate event");
        assert!(change.property_changed(Property::Label));
        assert!(!change.property_changed(Property::Status));
        node.unsubscribe(sub.id);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let node = test_node();
        let mut sub = node.subscribe();
        assert_eq!(node.subscriber_count(), 1);
        assert!(node.unsubscribe(sub.id));
        assert!(!node.unsubscribe(sub.id), "double release returns false");
        assert_eq!(node.subscriber_count(), 0);
        node.notify_property(Property::Label);
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_on_unexpanded_node_is_a_noop() {
        let node = test_node();
        assert!(node.refresh_data().await.is_ok());
        assert_eq!(node.load_state(), LoadState::Sparse);
    }
}
