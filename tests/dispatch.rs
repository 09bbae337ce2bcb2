//! Request dispatch through a balancer: distribution, fencing, and the
//! canned 503.

use axum::http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use traffic_balancer::{Balancer, ServerHandle, StrategyKind};

mod common;

fn wrr_balancer() -> Balancer {
    Balancer::new("web", StrategyKind::Wrr.build(None), None, false)
}

#[tokio::test]
async fn test_empty_pool_returns_503() {
    let balancer = wrr_balancer();
    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(common::body_string(resp).await, "no available server\n");
}

#[tokio::test]
async fn test_all_down_returns_503() {
    let balancer = wrr_balancer();
    balancer.add("a", common::named_handler("a"), 1.0, false);
    balancer.add("b", common::named_handler("b"), 1.0, false);
    balancer.set_status("a", false);
    balancer.set_status("b", false);

    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_all_fenced_returns_503() {
    let balancer = wrr_balancer();
    balancer.add("a", common::named_handler("a"), 1.0, true);

    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_response_passes_through_untouched() {
    let balancer = wrr_balancer();
    balancer.add("alpha", common::named_handler("alpha"), 1.0, false);

    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(common::body_string(resp).await, "alpha");
}

#[tokio::test]
async fn test_wrr_distributes_by_weight() {
    let balancer = wrr_balancer();
    let a_hits = Arc::new(AtomicUsize::new(0));
    let b_hits = Arc::new(AtomicUsize::new(0));
    balancer.add("a", common::counting_handler(Arc::clone(&a_hits)), 3.0, false);
    balancer.add("b", common::counting_handler(Arc::clone(&b_hits)), 1.0, false);

    for _ in 0..40 {
        balancer.dispatch(common::get_request()).await;
    }

    let a = a_hits.load(Ordering::SeqCst);
    let b = b_hits.load(Ordering::SeqCst);
    assert_eq!(a + b, 40);
    // Deadline ties at integer boundaries can shift a single pick.
    assert!((29..=31).contains(&a), "weight-3 server got {a}/40");
}

#[tokio::test]
async fn test_fenced_server_gets_no_new_traffic() {
    let balancer = wrr_balancer();
    let live_hits = Arc::new(AtomicUsize::new(0));
    let fenced_hits = Arc::new(AtomicUsize::new(0));
    balancer.add("live", common::counting_handler(Arc::clone(&live_hits)), 1.0, false);
    balancer.add(
        "draining",
        common::counting_handler(Arc::clone(&fenced_hits)),
        1.0,
        true,
    );

    for _ in 0..20 {
        balancer.dispatch(common::get_request()).await;
    }

    assert_eq!(live_hits.load(Ordering::SeqCst), 20);
    assert_eq!(fenced_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recovery_restores_traffic() {
    let balancer = wrr_balancer();
    balancer.add("only", common::named_handler("only"), 1.0, false);

    balancer.set_status("only", false);
    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    balancer.set_status("only", true);
    let resp = balancer.dispatch(common::get_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_inflight_finalized_when_handler_panics() {
    let handler = common::named_handler("x");
    let server = Arc::new(ServerHandle::new("x", handler, 1.0));

    let task_server = Arc::clone(&server);
    let joined = tokio::spawn(async move {
        let _guard = task_server.begin_request();
        panic!("backend blew up");
    })
    .await;

    assert!(joined.is_err());
    assert_eq!(server.inflight(), 0);
}
