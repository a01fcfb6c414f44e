//! Lazy loading, single-flight refresh, and failure handling.

mod common;

use std::sync::Arc;

use common::*;
use jobmirror_model::{LoadState, Model, ModelError, Node, Property};
use jobmirror_protocol::{BuildOutcome, JobStatus, ObjectKind};

const SRV: &str = "https://ci.example.com/";
const JOB_CLASS: &str = "org.jenkinsci.plugins.workflow.job.WorkflowJob";
const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";

fn model_for(remote: &Arc<MockRemote>, config: Arc<MemoryConfig>) -> Model {
    Model::new(
        Arc::clone(remote) as Arc<dyn jobmirror_model::RemoteService>,
        config as Arc<dyn jobmirror_model::ConfigSource>,
    )
}

#[tokio::test]
async fn concurrent_refreshes_share_one_fetch() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    remote.script(
        SRV,
        server_json(
            SRV,
            vec![job_listing(JOB_CLASS, "a", "https://ci.example.com/job/a/")],
        ),
    );
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");

    let gate = remote.hold();
    let first = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.expand().await }
    });
    settle().await;
    assert_eq!(remote.fetch_count(SRV), 1);
    assert_eq!(server.load_state(), LoadState::Loading);

    // Joined onto the in-flight cycle, no second fetch.
    let second = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.refresh_data().await }
    });
    settle().await;
    assert_eq!(remote.fetch_count(SRV), 1);

    remote.release(&gate);
    first.await.expect("join").expect("first refresh");
    second.await.expect("join").expect("joined refresh");
    assert_eq!(remote.fetch_count(SRV), 1, "exactly one fetch for the cycle");
    assert_eq!(server.load_state(), LoadState::Loaded);
    assert_eq!(server.children().len(), 1);
}

#[tokio::test]
async fn expand_is_idempotent() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    remote.script(SRV, server_json(SRV, vec![]));
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");

    server.expand().await.expect("first expand");
    server.expand().await.expect("second expand");
    assert_eq!(remote.fetch_count(SRV), 1, "re-expanding does not refetch");
    assert!(server.expanded());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_children() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    remote.script(
        SRV,
        server_json(
            SRV,
            vec![job_listing(JOB_CLASS, "a", "https://ci.example.com/job/a/")],
        ),
    );
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");
    server.expand().await.expect("initial load");
    let id = server.children()[0].id();

    remote.script_error(SRV, "connection refused");
    let mut sub = server.subscribe();
    let err = server
        .refresh_data()
        .await
        .expect_err("scripted failure must surface");
    assert!(matches!(err, ModelError::Fetch(_)), "got {err:?}");

    assert_eq!(server.load_state(), LoadState::Error);
    assert!(server.last_error().contains("connection refused"));
    assert_eq!(server.children()[0].id(), id, "stale data is retained");

    let change = sub.rx.try_recv().expect("one event for the failed cycle");
    assert!(change.property_changed(Property::LoadState));
    assert!(change.property_changed(Property::LastError));
    assert!(!change.property_changed(Property::Children));
    server.unsubscribe(sub.id);
}

#[tokio::test]
async fn recovery_clears_the_recorded_error() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    remote.script_error(SRV, "boom");
    remote.script(SRV, server_json(SRV, vec![]));
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");

    assert!(server.expand().await.is_err());
    assert!(server.last_error().contains("boom"));

    let mut sub = server.subscribe();
    server.refresh_data().await.expect("recovery refresh");
    assert_eq!(server.load_state(), LoadState::Loaded);
    assert_eq!(server.last_error(), "");

    let change = sub.rx.try_recv().expect("event");
    assert!(
        change.property_changed(Property::LastError),
        "clearing the error is itself a change"
    );
    server.unsubscribe(sub.id);
}

#[tokio::test]
async fn malformed_response_is_a_refresh_failure() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    remote.script(SRV, serde_json::json!([1, 2, 3]));
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");

    let err = server.expand().await.expect_err("shape mismatch");
    assert!(matches!(err, ModelError::Malformed(_)), "got {err:?}");
    assert_eq!(server.load_state(), LoadState::Error);
}

#[tokio::test]
async fn expand_chain_down_to_a_finished_build() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    let folder_url = "https://ci.example.com/job/tools/";
    let job_url = "https://ci.example.com/job/tools/job/deploy/";
    let build_url = "https://ci.example.com/job/tools/job/deploy/7/";
    remote.script(
        SRV,
        server_json(SRV, vec![job_listing(FOLDER_CLASS, "tools", folder_url)]),
    );
    remote.script(
        folder_url,
        container_json(folder_url, "Tools", vec![job_listing(JOB_CLASS, "deploy", job_url)]),
    );
    remote.script(job_url, job_json(job_url, "deploy", vec![build_listing(7, build_url)]));
    remote.script(build_url, build_json(build_url, 7, false));

    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");
    server.expand().await.expect("server expand");
    let folder = server.children().pop().expect("folder");
    folder.expand().await.expect("folder expand");
    let job = folder.children().pop().expect("job");
    job.expand().await.expect("job expand");
    let build = job.children().pop().expect("build");
    build.expand().await.expect("build expand");

    assert_eq!(folder.kind(), ObjectKind::JobContainer);
    assert_eq!(folder.label(), "Tools");
    assert_eq!(job.kind(), ObjectKind::Job);
    assert!(job.buildable());
    assert_eq!(job.job_status(), Some(JobStatus::Succeeded));
    assert_eq!(job.health(), 100, "no health report defaults to 100");
    assert_eq!(build.kind(), ObjectKind::Build);
    assert_eq!(build.label(), "#7", "builds label by number until named");
    assert_eq!(build.build_outcome(), Some(BuildOutcome::Succeeded));
    assert_eq!(
        build.parent().expect("parent").id(),
        job.id(),
        "parent chain stays intact"
    );
}

#[tokio::test]
async fn sparse_nodes_never_fetch() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    let job_url = "https://ci.example.com/job/a/";
    remote.script(SRV, server_json(SRV, vec![job_listing(JOB_CLASS, "a", job_url)]));
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");
    server.expand().await.expect("server expand");

    let job = server.children().pop().expect("job");
    assert_eq!(job.load_state(), LoadState::Sparse);
    job.refresh_data().await.expect("noop refresh");
    assert_eq!(remote.fetch_count(job_url), 0, "unexpanded nodes stay sparse");
    assert_eq!(job.load_state(), LoadState::Sparse);
    assert_eq!(job.label(), "a", "listing data serves the label meanwhile");
}

#[tokio::test]
async fn trigger_posts_to_the_job() {
    let remote = MockRemote::new();
    let config = MemoryConfig::new(vec![entry(SRV, "ci")]);
    let job_url = "https://ci.example.com/job/a/";
    remote.script(SRV, server_json(SRV, vec![job_listing(JOB_CLASS, "a", job_url)]));
    let model = model_for(&remote, config);
    model.root().expand().await.expect("root expand");
    let server = model.servers().pop().expect("server");
    server.expand().await.expect("server expand");

    let job: Arc<Node> = server.children().pop().expect("job");
    job.trigger().await.expect("trigger");
    assert_eq!(remote.fetch_count(job_url), 1, "trigger hits the job url");
}
