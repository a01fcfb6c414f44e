//! Shared test doubles: a scripted remote service and an in-memory
//! configuration source.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{watch, Notify};
use url::Url;

use jobmirror_model::{ConfigSource, ModelError, RemoteService, ServerEntry};
use jobmirror_protocol::{BuildRecord, ContainerRecord, JobRecord, KindOverrides, ServerRecord};

/// One scripted response: a raw JSON payload or a failure message.
type Scripted = Result<serde_json::Value, String>;

#[derive(Default)]
struct Script {
    queue: VecDeque<Scripted>,
    /// Repeated once the queue runs dry.
    last: Option<Scripted>,
}

impl Script {
    fn next(&mut self) -> Option<Scripted> {
        match self.queue.pop_front() {
            Some(s) => {
                self.last = Some(s.clone());
                Some(s)
            }
            None => self.last.clone(),
        }
    }
}

#[derive(Default)]
struct MockInner {
    responses: HashMap<String, Script>,
    fetches: HashMap<String, usize>,
    total_fetches: usize,
}

/// Scripted [`RemoteService`] with fetch counting and an optional gate
/// that holds fetches open until released.
#[derive(Default)]
pub struct MockRemote {
    inner: Mutex<MockInner>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON response for `url`.
    pub fn script(&self, url: &str, value: serde_json::Value) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .entry(url.to_string())
            .or_default()
            .queue
            .push_back(Ok(value));
    }

    /// Queue a failure for `url`.
    pub fn script_error(&self, url: &str, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .entry(url.to_string())
            .or_default()
            .queue
            .push_back(Err(message.to_string()));
    }

    /// Total fetches served for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        *self.inner.lock().unwrap().fetches.get(url).unwrap_or(&0)
    }

    /// Total fetches served across all URLs.
    pub fn total_fetches(&self) -> usize {
        self.inner.lock().unwrap().total_fetches
    }

    /// Hold every subsequent fetch open until [`MockRemote::release`].
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Release held fetches and stop gating.
    pub fn release(&self, gate: &Notify) {
        *self.gate.lock().unwrap() = None;
        gate.notify_waiters();
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ModelError> {
        let (scripted, gate) = {
            let mut inner = self.inner.lock().unwrap();
            inner.total_fetches += 1;
            *inner.fetches.entry(url.to_string()).or_insert(0) += 1;
            let scripted = inner
                .responses
                .get_mut(url.as_str())
                .and_then(|s| s.next());
            (scripted, self.gate.lock().unwrap().clone())
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match scripted {
            Some(Ok(value)) => serde_json::from_value(value)
                .map_err(|e| ModelError::Malformed(e.to_string())),
            Some(Err(message)) => Err(ModelError::Fetch(message)),
            None => Err(ModelError::Fetch(format!("no script for {url}"))),
        }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn fetch_server(&self, url: &Url) -> Result<ServerRecord, ModelError> {
        self.fetch(url).await
    }
    async fn fetch_container(&self, url: &Url) -> Result<ContainerRecord, ModelError> {
        self.fetch(url).await
    }
    async fn fetch_job(&self, url: &Url) -> Result<JobRecord, ModelError> {
        self.fetch(url).await
    }
    async fn fetch_build(&self, url: &Url) -> Result<BuildRecord, ModelError> {
        self.fetch(url).await
    }
    async fn trigger_build(&self, url: &Url) -> Result<(), ModelError> {
        let mut inner = self.inner.lock().unwrap();
        inner.total_fetches += 1;
        *inner.fetches.entry(url.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

/// Mutable in-memory [`ConfigSource`].
pub struct MemoryConfig {
    state: Mutex<(Vec<ServerEntry>, KindOverrides)>,
    tx: watch::Sender<()>,
}

impl MemoryConfig {
    pub fn new(servers: Vec<ServerEntry>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((servers, KindOverrides::default())),
            tx: watch::channel(()).0,
        })
    }

    pub fn set_servers(&self, servers: Vec<ServerEntry>) {
        self.state.lock().unwrap().0 = servers;
        let _ = self.tx.send(());
    }

    pub fn force_job(&self, class_name: &str) {
        self.state.lock().unwrap().1.force_job(class_name);
        let _ = self.tx.send(());
    }

    pub fn force_container(&self, class_name: &str) {
        self.state.lock().unwrap().1.force_container(class_name);
        let _ = self.tx.send(());
    }
}

impl ConfigSource for MemoryConfig {
    fn servers(&self) -> Vec<ServerEntry> {
        self.state.lock().unwrap().0.clone()
    }
    fn overrides(&self) -> KindOverrides {
        self.state.lock().unwrap().1.clone()
    }
    fn watch(&self) -> watch::Receiver<()> {
        self.tx.subscribe()
    }
}

pub fn entry(url: &str, label: &str) -> ServerEntry {
    ServerEntry {
        url: url.parse().expect("test url"),
        label: label.to_string(),
    }
}

// ─── JSON fixtures ───────────────────────────────────────────────────────────

pub fn job_listing(class: &str, name: &str, url: &str) -> serde_json::Value {
    serde_json::json!({"_class": class, "name": name, "url": url})
}

pub fn server_json(url: &str, jobs: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "nodeName": "ci",
        "description": "test server",
        "jobs": jobs,
        "url": url
    })
}

pub fn container_json(url: &str, name: &str, jobs: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "displayName": name,
        "fullDisplayName": name,
        "fullName": name,
        "name": name,
        "jobs": jobs,
        "url": url
    })
}

pub fn job_json(url: &str, name: &str, builds: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "buildable": true,
        "builds": builds,
        "color": "blue",
        "name": name,
        "url": url
    })
}

pub fn build_listing(number: u32, url: &str) -> serde_json::Value {
    serde_json::json!({"number": number, "url": url})
}

pub fn build_json(url: &str, number: u32, building: bool) -> serde_json::Value {
    let mut v = serde_json::json!({
        "building": building,
        "duration": if building { 0 } else { 42000 },
        "estimatedDuration": 42000,
        "id": number.to_string(),
        "number": number,
        "timestamp": 1700000000000i64,
        "url": url
    });
    if !building {
        v["result"] = serde_json::json!("SUCCESS");
    }
    v
}

/// Let spawned tasks run to completion on the cooperative test runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
