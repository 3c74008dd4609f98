//! End-to-end sync scenarios against an in-process fake daemon.

mod fixtures;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use fixtures::fake_server::FakeServer;
use skein_client::api::mutate;
use skein_client::config::Config;
use skein_client::{IssueId, QuerySpec, Status, SubKey, SyncClient};

fn key(s: &str) -> SubKey {
    SubKey::new(s).unwrap()
}

fn connect() -> (FakeServer, SyncClient) {
    let (server, transport) = FakeServer::new();
    let mut config = Config::default();
    config.reconnect.backoff_base_ms = 1;
    config.reconnect.backoff_max_ms = 2;
    let client = SyncClient::connect(Box::new(transport), &config).expect("connect");
    (server, client)
}

fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn snapshot_then_upsert_converges_in_order() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");

    server.push_snapshot("tab:issues", json!([{"id": "I-1", "status": "open"}]));
    client.pump().expect("pump");

    let snapshot = client.snapshot_for(&k);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id.as_str(), "I-1");
    assert_eq!(snapshot[0].status, Status::Open);

    server.push_upsert("tab:issues", json!([{"id": "I-1", "status": "in_progress"}]));
    client.pump().expect("pump");

    let snapshot = client.snapshot_for(&k);
    assert_eq!(snapshot.len(), 1, "membership order and size unchanged");
    assert_eq!(snapshot[0].status, Status::InProgress);
    assert_eq!(client.membership_size(&k), Some(1));
}

#[test]
fn initial_snapshot_is_never_lost() {
    let (server, client) = connect();
    let k = key("tab:issues");

    // The daemon seeds every fresh subscription with a snapshot right after
    // the ack - exactly the push that would vanish if the store were
    // registered after subscribing.
    server.auto_snapshot(
        "tab:issues",
        json!([{"id": "I-1", "status": "open"}, {"id": "I-2", "status": "open"}]),
    );

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    client.pump().expect("pump");

    assert_eq!(client.membership_size(&k), Some(2));
}

#[test]
fn released_views_ignore_stale_pushes() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    client.release_view(&k).expect("release");

    // Queued by the server before it processed the release.
    server.push_upsert("tab:issues", json!([{"id": "I-1", "status": "open"}]));
    let applied = client.pump().expect("pump");

    assert_eq!(applied, 0);
    assert!(client.snapshot_for(&k).is_empty());
    assert_eq!(client.membership_size(&k), None);
    assert_eq!(server.ops().last().map(String::as_str), Some("release"));
}

#[test]
fn spec_change_unsubscribes_then_resubscribes() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    client
        .subscribe_view(&k, QuerySpec::new("closed-issues"))
        .expect("resubscribe");

    assert_eq!(server.ops(), vec!["subscribe", "release", "subscribe"]);
    assert_eq!(server.spec_for("tab:issues").unwrap()["kind"], "closed-issues");
    assert_eq!(client.registry().spec_for(&k).unwrap().kind, "closed-issues");
}

#[test]
fn equal_spec_resubscribe_is_a_noop() {
    let (server, client) = connect();
    let k = key("tab:issues");

    let spec = QuerySpec::new("all-issues").with_param("limit", 100i64);
    let first = client.subscribe_view(&k, spec.clone()).expect("subscribe");
    let second = client.subscribe_view(&k, spec).expect("resubscribe");

    assert_eq!(first, second);
    assert_eq!(server.subscribe_count(), 1);
}

#[test]
fn concurrent_subscribes_share_one_round_trip() {
    let (server, client) = connect();
    let client = Arc::new(client);
    let k = key("tab:issues");

    server.hold_acks(true);

    let client_a = Arc::clone(&client);
    let key_a = k.clone();
    let thread_a = std::thread::spawn(move || {
        client_a.subscribe_view(&key_a, QuerySpec::new("all-issues"))
    });

    wait_until(|| server.subscribe_count() == 1);

    let client_b = Arc::clone(&client);
    let key_b = k.clone();
    let thread_b = std::thread::spawn(move || {
        client_b.subscribe_view(&key_b, QuerySpec::new("all-issues"))
    });

    // Give the second caller time to join the pending attempt, then let the
    // single ack through.
    std::thread::sleep(Duration::from_millis(50));
    server.hold_acks(false);
    server.release_held_acks();

    let first = thread_a.join().unwrap().expect("first subscribe");
    let second = thread_b.join().unwrap().expect("second subscribe");

    assert_eq!(first, second, "both callers share one release handle");
    assert_eq!(server.subscribe_count(), 1);
}

#[test]
fn reconnect_resubscribes_and_snapshot_replaces_stale_state() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    server.push_snapshot("tab:issues", json!([{"id": "I-1", "status": "open"}]));
    client.pump().expect("pump");
    assert_eq!(client.membership_size(&k), Some(1));

    server.disconnect();
    assert!(client.pump().is_err(), "dead session surfaces on pump");

    client.recover().expect("recover");
    assert_eq!(server.open_count(), 2, "session reopened once");
    assert_eq!(server.subscribe_count(), 2, "active subscription re-established");

    server.push_snapshot("tab:issues", json!([{"id": "I-2", "status": "open"}]));
    client.pump().expect("pump");

    let snapshot = client.snapshot_for(&k);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id.as_str(), "I-2", "post-reconnect snapshot wins");
}

#[test]
fn mutations_are_not_applied_optimistically() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    server.push_snapshot("tab:issues", json!([{"id": "I-1", "status": "open"}]));
    client.pump().expect("pump");

    mutate::update_status(
        client.connection(),
        IssueId::new("I-1").unwrap(),
        Status::InProgress,
    )
    .expect("mutation call");

    // The call succeeded, but the mirror only moves on the echoed upsert.
    assert_eq!(client.snapshot_for(&k)[0].status, Status::Open);

    server.push_upsert("tab:issues", json!([{"id": "I-1", "status": "in_progress"}]));
    client.pump().expect("pump");
    assert_eq!(client.snapshot_for(&k)[0].status, Status::InProgress);
}

#[test]
fn delete_envelopes_shrink_membership() {
    let (server, client) = connect();
    let k = key("tab:issues");

    client
        .subscribe_view(&k, QuerySpec::new("all-issues"))
        .expect("subscribe");
    server.push_snapshot(
        "tab:issues",
        json!([{"id": "I-1", "status": "open"}, {"id": "I-2", "status": "open"}]),
    );
    server.push_delete("tab:issues", json!(["I-1"]));
    server.push_delete("tab:issues", json!(["I-1"]));
    client.pump().expect("pump");

    let snapshot = client.snapshot_for(&k);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id.as_str(), "I-2");
}

#[test]
fn out_of_band_notices_bypass_the_mirrors() {
    let (server, client) = connect();

    server.queue_event("workspace_changed", json!({"path": "/w/alpha"}));
    let applied = client.pump().expect("pump");

    assert_eq!(applied, 0);
    let notice = client.poll_notice().expect("notice queued");
    assert_eq!(notice.name, "workspace_changed");
    assert_eq!(notice.data["path"], "/w/alpha");
}
