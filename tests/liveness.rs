//! Liveness evaluation against a mock control plane.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use livenessd::cluster::{LxdMembershipProber, NodeIdentity};
use livenessd::config::DaemonConfig;
use livenessd::health::{
    LeniencyState, LivenessEvaluator, ManualClock, Pgrep, QuorumLeniencyGate, Verdict,
};
use livenessd::lxd::{DatabaseLister, LxdClient};
use livenessd::{Daemon, HttpServer, Shutdown};

mod common;

const TIMEOUT: Duration = Duration::from_secs(2);
const THREE_MEMBERS: &str = "echo '+-----------------+'
echo '|     ADDRESS     |'
echo '+-----------------+'
echo '| 10.0.0.1:8443   |'
echo '+-----------------+'
echo '| 10.0.0.2:8443   |'
echo '+-----------------+'
echo '| 10.0.0.3:8443   |'
echo '+-----------------+'";

fn members_reply(members: Value) -> (u16, Value) {
    common::sync_ok(members)
}

fn running() -> Pgrep {
    Pgrep::new("lxd", TIMEOUT).with_program("true")
}

fn prober(socket: &Path, database: &Path) -> LxdMembershipProber {
    LxdMembershipProber::new(
        LxdClient::new(socket, TIMEOUT),
        DatabaseLister::new(database.to_string_lossy(), TIMEOUT),
    )
}

fn evaluator(
    replica: u32,
    socket: &Path,
    database: &Path,
    window: Duration,
) -> LivenessEvaluator<LxdMembershipProber, Pgrep> {
    LivenessEvaluator::new(
        NodeIdentity::new(replica),
        running(),
        prober(socket, database),
        QuorumLeniencyGate::new(window),
    )
}

#[tokio::test]
async fn initialized_cluster_is_healthy() {
    let lxd = common::start_mock_lxd(|_, path, _| {
        assert_eq!(path, "/1.0/cluster/members");
        members_reply(json!([
            "/1.0/cluster/members/lxd-0",
            "/1.0/cluster/members/lxd-1",
            "/1.0/cluster/members/lxd-2",
        ]))
    })
    .await;
    let db = common::write_script(lxd.dir(), "lxd", "exit 1");

    let eval = evaluator(2, lxd.socket(), &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Healthy);
    assert_eq!(eval.gate().state(), LeniencyState::Cleared);
    assert_eq!(lxd.requests_with("GET").len(), 1);
}

#[tokio::test]
async fn placeholder_member_is_unhealthy() {
    let lxd =
        common::start_mock_lxd(|_, _, _| members_reply(json!(["/1.0/cluster/members/none"]))).await;
    let db = common::write_script(lxd.dir(), "lxd", "exit 1");

    let eval = evaluator(0, lxd.socket(), &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    assert_eq!(eval.gate().state(), LeniencyState::Unset);
}

#[tokio::test]
async fn empty_and_null_member_lists_are_unhealthy() {
    for metadata in [json!([]), Value::Null] {
        let lxd = common::start_mock_lxd(move |_, _, _| members_reply(metadata.clone())).await;
        let db = common::write_script(lxd.dir(), "lxd", "exit 1");

        let eval = evaluator(0, lxd.socket(), &db, Duration::from_secs(300));
        assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    }
}

#[tokio::test]
async fn error_envelope_is_unhealthy() {
    let lxd = common::start_mock_lxd(|_, _, _| common::error_reply(500, "not ready")).await;
    let db = common::write_script(lxd.dir(), "lxd", THREE_MEMBERS);

    let eval = evaluator(0, lxd.socket(), &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
}

#[tokio::test]
async fn undecodable_reply_does_not_fall_back() {
    let lxd = common::start_mock_lxd(|_, _, _| (200, json!("garbage"))).await;
    let marker = lxd.dir().join("database-was-read");
    let db = common::write_script(
        lxd.dir(),
        "lxd",
        &format!("touch {}\n{THREE_MEMBERS}", marker.display()),
    );

    let eval = evaluator(0, lxd.socket(), &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    assert!(!marker.exists());
}

#[tokio::test]
async fn missing_process_skips_the_api() {
    let lxd = common::start_mock_lxd(|_, _, _| {
        members_reply(json!(["/1.0/cluster/members/lxd-0"]))
    })
    .await;
    let db = common::write_script(lxd.dir(), "lxd", THREE_MEMBERS);

    let eval = LivenessEvaluator::new(
        NodeIdentity::new(0),
        Pgrep::new("lxd", TIMEOUT).with_program("false"),
        prober(lxd.socket(), &db),
        QuorumLeniencyGate::new(Duration::from_secs(300)),
    );
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    assert!(lxd.requests().is_empty());
}

#[tokio::test]
async fn minority_is_lenient_when_api_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.socket");
    let db = common::write_script(dir.path(), "lxd", THREE_MEMBERS);

    let eval = evaluator(0, &socket, &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Healthy);
    assert!(matches!(eval.gate().state(), LeniencyState::GrantedAt(_)));

    // The grant persists across checks within the window.
    assert_eq!(eval.evaluate().await, Verdict::Healthy);
}

#[tokio::test]
async fn majority_is_not_lenient_when_api_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.socket");
    let db = common::write_script(dir.path(), "lxd", THREE_MEMBERS);

    for replica in [1, 2] {
        let eval = evaluator(replica, &socket, &db, Duration::from_secs(300));
        assert_eq!(eval.evaluate().await, Verdict::Unhealthy, "replica {replica}");
        assert_eq!(eval.gate().state(), LeniencyState::Unset);
    }
}

#[tokio::test]
async fn failed_database_read_is_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.socket");
    let db = common::write_script(dir.path(), "lxd", "echo 'no database' >&2\nexit 1");

    let eval = evaluator(0, &socket, &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
}

#[tokio::test]
async fn leniency_expires() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.socket");
    let db = common::write_script(dir.path(), "lxd", THREE_MEMBERS);
    let clock = Arc::new(ManualClock::new());

    let eval = LivenessEvaluator::new(
        NodeIdentity::new(0),
        running(),
        prober(&socket, &db),
        QuorumLeniencyGate::with_clock(Duration::from_secs(60), clock.clone()),
    );

    assert_eq!(eval.evaluate().await, Verdict::Healthy);
    clock.advance(Duration::from_secs(59));
    assert_eq!(eval.evaluate().await, Verdict::Healthy);
    clock.advance(Duration::from_secs(1));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    clock.advance(Duration::from_secs(3600));
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
}

#[tokio::test]
async fn leniency_is_revoked_once_initialized() {
    let lxd = common::start_mock_lxd(|_, _, _| {
        members_reply(json!([
            "/1.0/cluster/members/lxd-0",
            "/1.0/cluster/members/lxd-1",
            "/1.0/cluster/members/lxd-2",
        ]))
    })
    .await;
    let db = common::write_script(lxd.dir(), "lxd", THREE_MEMBERS);

    let eval = evaluator(0, lxd.socket(), &db, Duration::from_secs(300));
    assert_eq!(eval.evaluate().await, Verdict::Healthy);
    assert_eq!(eval.gate().state(), LeniencyState::Cleared);

    // Unlinking the socket makes the API unreachable; the minority replica
    // no longer gets leniency.
    std::fs::remove_file(lxd.socket()).unwrap();
    assert_eq!(eval.evaluate().await, Verdict::Unhealthy);
    assert_eq!(eval.gate().state(), LeniencyState::Cleared);
}

#[tokio::test]
async fn http_endpoint_serves_verdicts_and_drains() {
    let lxd = common::start_mock_lxd(|_, _, _| {
        members_reply(json!(["/1.0/cluster/members/lxd-0"]))
    })
    .await;
    let db = common::write_script(lxd.dir(), "lxd", "exit 1");
    let eval = Arc::new(evaluator(0, lxd.socket(), &db, Duration::from_secs(300)));

    let config = DaemonConfig::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(eval, &config.listener);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/liveness"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    assert!(res.text().await.unwrap().is_empty());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn daemon_serves_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DaemonConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.lxd.socket = dir.path().join("absent.socket").to_string_lossy().into_owned();
    config.lxd.binary = dir.path().join("absent-lxd").to_string_lossy().into_owned();
    config.lxd.process_name = "no-such-proc".to_string();
    config.liveness.replica = Some(0);

    let daemon = Daemon::new(config);
    assert_eq!(daemon.liveness().identity().replica, 0);
    let listener = daemon.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(daemon.run(listener, &shutdown));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/liveness"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap()
        .unwrap();
}
