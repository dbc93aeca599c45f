//! Two-actor lock negotiation against an in-memory lock server.
//!
//! Verifies mutual exclusion across interleavings, the bounded-timeout
//! denial path, re-grant after release, and the disconnected case.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use callsheet_sync::locks::LockCoordinator;

use common::{init_tracing, ClientTransport, LockServer};

const SCOPE: i64 = 5;

async fn two_actors() -> (
    Arc<LockCoordinator>,
    Arc<LockCoordinator>,
    Arc<LockServer>,
    Arc<ClientTransport>,
    Arc<ClientTransport>,
) {
    init_tracing();
    let server = LockServer::new(SCOPE);
    let transport_a = ClientTransport::new(server.clone(), 1, "Ada");
    let transport_b = ClientTransport::new(server.clone(), 2, "Grace");
    let actor_a = Arc::new(LockCoordinator::new(1, transport_a.clone()));
    let actor_b = Arc::new(LockCoordinator::new(2, transport_b.clone()));
    actor_a.set_active_scope(SCOPE).await;
    actor_b.set_active_scope(SCOPE).await;
    server.register(actor_a.clone()).await;
    server.register(actor_b.clone()).await;
    (actor_a, actor_b, server, transport_a, transport_b)
}

// ---------------------------------------------------------------------------
// Test: at most one concurrent acquire succeeds
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_acquires_grant_at_most_one() {
    let (actor_a, actor_b, _, _, _) = two_actors().await;

    for round in 0..10 {
        let a = actor_a.clone();
        let b = actor_b.clone();
        let (got_a, got_b) = tokio::join!(
            tokio::spawn(async move { a.acquire_lock(42).await }),
            tokio::spawn(async move { b.acquire_lock(42).await }),
        );
        let got_a = got_a.unwrap();
        let got_b = got_b.unwrap();

        assert!(
            !(got_a && got_b),
            "both actors won the lock in round {round}"
        );
        assert!(got_a || got_b, "nobody won the lock in round {round}");

        if got_a {
            actor_a.release_lock(42).await;
        } else {
            actor_b.release_lock(42).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Test: contended acquire times out, then succeeds after release
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn contended_acquire_times_out_then_regrants_after_release() {
    let (actor_a, actor_b, _, _, _) = two_actors().await;

    assert!(actor_a.acquire_lock(7).await);

    // B's request is silently denied and must give up at the timeout.
    assert!(!actor_b.acquire_lock(7).await);

    // B observes A's lock and can name the holder.
    let observed = actor_b.get_lock(7).await.expect("B should observe A's lock");
    assert_eq!(observed.holder_id, 1);
    assert_eq!(observed.holder_name, "Ada");

    actor_a.release_lock(7).await;
    assert!(actor_b.acquire_lock(7).await);
}

// ---------------------------------------------------------------------------
// Test: disconnected actor cannot negotiate at all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnected_acquire_fails_without_negotiation() {
    let (_, actor_b, server, _, transport_b) = two_actors().await;
    transport_b.connected.store(false, Ordering::SeqCst);

    assert!(!actor_b.acquire_lock(7).await);
    // Nothing reached the server's lock table.
    assert_eq!(server.holder_of(7).await, None);
    assert!(!actor_b.is_locked(7).await);
}

// ---------------------------------------------------------------------------
// Test: server-side connection drop releases locks for everyone else
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn server_dropping_a_connection_frees_its_locks() {
    let (actor_a, actor_b, server, _, _) = two_actors().await;

    assert!(actor_a.acquire_lock(7).await);
    assert!(actor_b.is_locked(7).await);

    // A's connection dies: the server drops its locks and A forfeits.
    server.drop_locks_of(1).await;
    actor_a.connection_lost().await;

    assert!(!actor_b.is_locked(7).await);
    assert!(actor_b.acquire_lock(7).await);
}
