//! End-to-end poll cycle tests against mock JSON-RPC nodes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use consensus_proxy::blockchain::BlockNumber;
use consensus_proxy::config::BackendRole;
use consensus_proxy::health::BanReason;
use consensus_proxy::lifecycle::Shutdown;
use consensus_proxy::load_balancer::{BackendGroup, RequestContext, RoutingError};

mod common;
use common::MockNode;

fn names(group: &BackendGroup) -> Vec<String> {
    group
        .consensus_group()
        .iter()
        .map(|b| b.name.clone())
        .collect()
}

#[tokio::test]
async fn test_two_backend_scenario() {
    let a = MockNode::start("node1").await;
    let b = MockNode::start("node2").await;
    a.set_peer_count(0);
    b.set_peer_count(0);

    let config = common::config(&[(&a, BackendRole::Primary), (&b, BackendRole::Primary)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    // Both nodes below the peer minimum: empty group, fallback mode.
    group.force_update().await.unwrap();
    assert!(group.consensus_group().is_empty());
    assert!(group.fallback_mode());

    // No fallback backend configured, so nothing can serve.
    let err = group.select_backend(&RequestContext::default()).unwrap_err();
    assert_eq!(err, RoutingError::NoEligibleBackend { fallback_mode: true });

    // Healthy data on both, after a reset.
    a.set_peer_count(10);
    b.set_peer_count(10);
    a.set_heads(0x101, 0xe1, 0xc1);
    b.set_heads(0x101, 0xe1, 0xc1);
    group.reset().await;
    group.force_update().await.unwrap();

    assert_eq!(group.latest_block_number(), BlockNumber(0x101));
    assert_eq!(group.safe_block_number(), BlockNumber(0xe1));
    assert_eq!(group.finalized_block_number(), BlockNumber(0xc1));
    assert_eq!(names(&group), vec!["node1", "node2"]);
    assert!(!group.fallback_mode());

    // node1 moves ahead, node2 lags outside the zero tolerance window.
    a.set_heads(0x110, 0xe8, 0xc8);
    group.force_update().await.unwrap();

    assert_eq!(group.latest_block_number(), BlockNumber(0x110));
    assert_eq!(names(&group), vec!["node1"]);
    let lagging = group.backend("node2").unwrap().health();
    assert!(!lagging.is_banned());
    assert!(lagging.is_candidate());
    assert_eq!(group.safe_block_number(), BlockNumber(0xe8));
    assert_eq!(group.finalized_block_number(), BlockNumber(0xc8));
}

#[tokio::test]
async fn test_tolerance_keeps_lagging_backend_in_group() {
    let a = MockNode::start("node1").await;
    let b = MockNode::start("node2").await;
    a.set_heads(0x105, 0xe1, 0xc1);

    let mut config = common::config(&[(&a, BackendRole::Primary), (&b, BackendRole::Primary)]);
    config.consensus.block_tolerance = 4;
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    assert_eq!(group.latest_block_number(), BlockNumber(0x105));
    assert_eq!(names(&group), vec!["node1", "node2"]);
}

#[tokio::test]
async fn test_safe_and_finalized_never_decrease() {
    let a = MockNode::start("node1").await;
    let config = common::config(&[(&a, BackendRole::Primary)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    assert_eq!(group.safe_block_number(), BlockNumber(0xe1));

    a.set_heads(0x102, 0xd0, 0xb0);
    group.force_update().await.unwrap();

    assert_eq!(group.latest_block_number(), BlockNumber(0x102));
    assert_eq!(group.safe_block_number(), BlockNumber(0xe1));
    assert_eq!(group.finalized_block_number(), BlockNumber(0xc1));
}

#[tokio::test]
async fn test_banned_backend_recovers_after_ban_period() {
    let a = MockNode::start("node1").await;
    a.set_peer_count(1);

    let mut config = common::config(&[(&a, BackendRole::Primary)]);
    config.consensus.ban_period_secs = 0;
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    let health = group.backend("node1").unwrap().health();
    assert!(health.is_banned());
    assert_eq!(health.ban_reason, Some(BanReason::LowPeerCount));
    assert!(group.fallback_mode());

    a.set_peer_count(10);
    group.force_update().await.unwrap();
    assert!(!group.backend("node1").unwrap().health().is_banned());
    assert_eq!(names(&group), vec!["node1"]);
    assert!(!group.fallback_mode());
}

#[tokio::test]
async fn test_syncing_backend_is_banned() {
    let a = MockNode::start("node1").await;
    let b = MockNode::start("node2").await;
    b.set_syncing(true);

    let config = common::config(&[(&a, BackendRole::Primary), (&b, BackendRole::Primary)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    assert_eq!(names(&group), vec!["node1"]);
    let health = group.backend("node2").unwrap().health();
    assert_eq!(health.ban_reason, Some(BanReason::Syncing));
}

#[tokio::test]
async fn test_slow_backend_does_not_stall_cycle() {
    let a = MockNode::start("node1").await;
    let b = MockNode::start("node2").await;
    b.set_delay(Duration::from_secs(2));

    let mut config = common::config(&[(&a, BackendRole::Primary), (&b, BackendRole::Primary)]);
    config.consensus.cycle_timeout_ms = 300;
    config.consensus.rpc_timeout_ms = 1_000;
    let group = BackendGroup::from_config("main", &config).unwrap();

    let start = Instant::now();
    group.force_update().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(900));

    assert_eq!(names(&group), vec!["node1"]);
    let slow = group.backend("node2").unwrap().health();
    assert_eq!(slow.consecutive_errors, 1);
    assert!(slow.last_error.is_some());
    assert!(!slow.is_banned());
}

#[tokio::test]
async fn test_failing_member_leaves_group_next_cycle() {
    let a = MockNode::start("node1").await;
    let b = MockNode::start("node2").await;

    let config = common::config(&[(&a, BackendRole::Primary), (&b, BackendRole::Primary)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    assert_eq!(names(&group), vec!["node1", "node2"]);

    b.set_failing(true);
    let snapshot = group.force_update().await.unwrap();
    assert_eq!(names(&group), vec!["node1"]);
    assert!(snapshot.eligible.iter().all(|b| b.name == "node1"));

    let failing = group.backend("node2").unwrap().health();
    assert_eq!(failing.consecutive_errors, 1);
    assert!(failing.unreachable);
    assert!(!failing.is_banned());
    assert_eq!(failing.latest.as_ref().map(|b| b.number), Some(BlockNumber(0x101)));

    for _ in 0..10 {
        let chosen = group.select_backend(&RequestContext::default()).unwrap();
        assert_eq!(chosen.name, "node1");
    }

    b.set_failing(false);
    group.force_update().await.unwrap();
    assert_eq!(names(&group), vec!["node1", "node2"]);
}

#[tokio::test]
async fn test_fallback_routing_stays_within_consensus_group() {
    let p = MockNode::start("primary").await;
    let f1 = MockNode::start("fallback1").await;
    let f2 = MockNode::start("fallback2").await;
    p.set_failing(true);
    f2.set_heads(0x50, 0x40, 0x30);

    let config = common::config(&[
        (&p, BackendRole::Primary),
        (&f1, BackendRole::Fallback),
        (&f2, BackendRole::Fallback),
    ]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    let snapshot = group.force_update().await.unwrap();
    assert!(snapshot.fallback_mode);
    assert_eq!(snapshot.heights.latest, BlockNumber(0x101));
    assert_eq!(names(&group), vec!["fallback1"]);
    assert!(snapshot.eligible.iter().all(|b| snapshot.contains(&b.name)));

    for _ in 0..20 {
        let chosen = group.select_backend(&RequestContext::default()).unwrap();
        assert_eq!(chosen.name, "fallback1");
    }
}

#[tokio::test]
async fn test_fallback_backend_serves_while_primary_is_down() {
    let p = MockNode::start("primary").await;
    let f = MockNode::start("fallback").await;
    p.set_failing(true);

    let config = common::config(&[(&p, BackendRole::Primary), (&f, BackendRole::Fallback)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    group.force_update().await.unwrap();
    assert!(group.fallback_mode());
    let chosen = group.select_backend(&RequestContext::default()).unwrap();
    assert_eq!(chosen.name, "fallback");

    p.set_failing(false);
    group.force_update().await.unwrap();
    assert!(!group.fallback_mode());
    assert_eq!(names(&group), vec!["primary", "fallback"]);
    for _ in 0..10 {
        let chosen = group.select_backend(&RequestContext::default()).unwrap();
        assert_eq!(chosen.name, "primary");
    }
}

#[tokio::test]
async fn test_listeners_notified_in_order() {
    let a = MockNode::start("node1").await;
    let config = common::config(&[(&a, BackendRole::Primary)]);
    let group = BackendGroup::from_config("main", &config).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    for id in 0..2 {
        let seen = seen.clone();
        group.on_consensus_change(move |snapshot| {
            seen.lock().unwrap().push((id, snapshot.cycle, snapshot.heights.latest));
        });
    }

    group.force_update().await.unwrap();
    group.force_update().await.unwrap();
    let latest = BlockNumber(0x101);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(0, 1, latest), (1, 1, latest), (0, 2, latest), (1, 2, latest)]
    );

    group.clear_listeners();
    group.force_update().await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reset_waits_for_listeners_of_finished_cycle() {
    let a = MockNode::start("node1").await;
    let config = common::config(&[(&a, BackendRole::Primary)]);
    let group = Arc::new(BackendGroup::from_config("main", &config).unwrap());

    let events = Arc::new(Mutex::new(Vec::new()));
    let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
    let entered_tx = Mutex::new(Some(entered_tx));
    {
        let events = events.clone();
        group.on_consensus_change(move |snapshot| {
            events.lock().unwrap().push(format!("notified {}", snapshot.cycle));
            if let Some(tx) = entered_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            std::thread::sleep(Duration::from_millis(300));
            events.lock().unwrap().push(format!("done {}", snapshot.cycle));
        });
    }

    let task = tokio::spawn({
        let group = group.clone();
        async move { group.force_update().await }
    });
    entered_rx.await.unwrap();

    group.reset().await;
    events.lock().unwrap().push("reset".to_string());

    assert!(task.await.unwrap().is_some());
    assert_eq!(*events.lock().unwrap(), vec!["notified 1", "done 1", "reset"]);
    assert_eq!(group.current_consensus().cycle, 0);
}

#[tokio::test]
async fn test_reset_aborts_in_flight_cycle() {
    let a = MockNode::start("node1").await;
    a.set_delay(Duration::from_secs(2));

    let mut config = common::config(&[(&a, BackendRole::Primary)]);
    config.consensus.poll_interval_ms = 10_000;
    config.consensus.cycle_timeout_ms = 5_000;
    config.consensus.rpc_timeout_ms = 5_000;
    let group = Arc::new(BackendGroup::from_config("main", &config).unwrap());

    let start = Instant::now();
    let task = tokio::spawn({
        let group = group.clone();
        async move { group.force_update().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    group.reset().await;
    assert!(task.await.unwrap().is_none());
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(group.current_consensus().cycle, 0);
    assert_eq!(group.backend("node1").unwrap().health().consecutive_errors, 0);
}

#[tokio::test]
async fn test_poll_loop_runs_until_shutdown() {
    let a = MockNode::start("node1").await;
    let config = common::config(&[(&a, BackendRole::Primary)]);
    let group = Arc::new(BackendGroup::from_config("main", &config).unwrap());

    let shutdown = Shutdown::new();
    let poller = tokio::spawn(group.clone().run(shutdown.subscribe()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while group.current_consensus().cycle < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("poller should complete two cycles");
    assert_eq!(group.latest_block_number(), BlockNumber(0x101));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), poller)
        .await
        .expect("poller should stop")
        .unwrap();
}
