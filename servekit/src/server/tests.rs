//! Tests for server start-up, supervision and shutdown.

use super::*;
use crate::app::HttpModule;
use crate::config::HttpSettings;
use rstest::{fixture, rstest};
use std::io;

#[fixture]
fn state() -> StateTx {
    Arc::new(watch::Sender::new(LifecycleState::Serving))
}

#[rstest]
#[tokio::test]
async fn accept_loop_failure_requests_shutdown_once(state: StateTx) {
    let shutdown = Shutdown::new();

    let first = supervise(
        async { Err(io::Error::other("accept failed")) },
        state.clone(),
        shutdown.clone(),
    )
    .await;
    assert!(matches!(first, Err(LifecycleError::Serve(_))));
    assert_eq!(*state.borrow(), LifecycleState::Failed);
    assert!(shutdown.is_requested());

    // A second failure reports again but the signal has already fired.
    state.send_replace(LifecycleState::Serving);
    let second = supervise(
        async { Err(io::Error::other("accept failed again")) },
        state.clone(),
        shutdown.clone(),
    )
    .await;
    assert!(second.is_err());
    assert!(!shutdown.request(), "shutdown must only fire once");
}

#[rstest]
#[tokio::test]
async fn errors_during_shutdown_are_not_failures(state: StateTx) {
    let shutdown = Shutdown::new();
    state.send_replace(LifecycleState::ShuttingDown);

    let outcome = supervise(
        async { Err(io::Error::other("listener closed")) },
        state.clone(),
        shutdown.clone(),
    )
    .await;
    assert!(outcome.is_ok());
    assert_eq!(*state.borrow(), LifecycleState::ShuttingDown);
    assert!(!shutdown.is_requested());
}

#[rstest]
#[tokio::test]
async fn clean_exit_leaves_shutdown_untouched(state: StateTx) {
    let shutdown = Shutdown::new();

    let outcome = supervise(async { Ok(()) }, state.clone(), shutdown.clone()).await;
    assert!(outcome.is_ok());
    assert_eq!(*state.borrow(), LifecycleState::Serving);
    assert!(!shutdown.is_requested());
}

#[tokio::test]
async fn requested_resolves_after_request() {
    let shutdown = Shutdown::new();
    let waiter = shutdown.clone();
    let wait = tokio::spawn(async move { waiter.requested().await });

    assert!(shutdown.request());
    tokio::time::timeout(Duration::from_secs(1), wait)
        .await
        .expect("waiter resolves")
        .expect("waiter task");
}

#[rstest]
#[case("127.0.0.1:99999")]
#[case("not an address")]
#[actix_rt::test]
async fn bind_failure_is_fatal(#[case] address: &str) {
    let err = HttpModule::new(HttpSettings::new(address))
        .start()
        .err()
        .expect("start must fail");

    assert!(
        matches!(&err, LifecycleError::Bind { address: failed, .. } if failed == address),
        "unexpected error: {err}"
    );
}

#[actix_rt::test]
async fn start_then_stop_walks_the_lifecycle() {
    let probe = Arc::new(LifecycleProbe::new());
    let server = HttpModule::new(HttpSettings::new("127.0.0.1:0"))
        .with_lifecycle_probe(probe.clone())
        .start()
        .expect("server starts");

    assert_eq!(server.state(), LifecycleState::Serving);
    assert!(probe.is_ready());
    assert!(server.addrs().iter().all(|addr| addr.port() != 0));
    let mut states = server.subscribe();

    server.stop(Duration::from_secs(5)).await.expect("clean stop");
    assert!(!probe.is_alive());
    assert_eq!(*states.borrow_and_update(), LifecycleState::Stopped);
}

#[rstest]
#[case(Duration::ZERO, 0)]
#[case(Duration::from_millis(200), 1)]
#[case(Duration::from_secs(5), 5)]
#[case(Duration::from_millis(5_001), 6)]
fn worker_drain_rounds_up_to_whole_seconds(#[case] grace: Duration, #[case] secs: u64) {
    assert_eq!(worker_shutdown_secs(grace), secs);
}
