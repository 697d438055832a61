//! Unit tests for the mutation coordinator
//!
//! End-to-end flows through `SyncEngine` live in the top-level tests
//! directory.

use std::time::Duration;

use crate::app::broadcast::ChangeBroadcaster;
use crate::app::models::ReservationKind;
use crate::app::store::{DurableKeyValueStore, MemoryStore};
use crate::app::testing::{remote, FakeGateway};

use super::*;

const GRACE: Duration = Duration::from_secs(60);

struct Harness {
    gateway: Arc<FakeGateway>,
    cache: Arc<ReservationCache>,
    reads: Arc<TtlReadCache>,
    store: Arc<MemoryStore>,
    stats: Arc<EngineStats>,
    coordinator: Arc<MutationCoordinator>,
    owner: OwnerIdentity,
}

/// Coordinator wired to a scripted gateway, with the background refresh
/// after create turned off so gateway call counts stay deterministic
async fn harness() -> Harness {
    let gateway = Arc::new(FakeGateway::new());
    let stats = Arc::new(EngineStats::new());
    let cache = Arc::new(ReservationCache::new(Arc::new(ChangeBroadcaster::new())));
    let reads = Arc::new(TtlReadCache::new(
        Duration::from_secs(30),
        gateway.clone(),
        stats.clone(),
    ));
    let store = Arc::new(MemoryStore::new());
    let persistence = Arc::new(PersistenceAdapter::new(store.clone()));
    let reconciler = Arc::new(ReconciliationEngine::new(
        gateway.clone(),
        cache.clone(),
        Some(persistence.clone()),
        stats.clone(),
        GRACE,
    ));
    let coordinator = Arc::new(
        MutationCoordinator::new(
            gateway.clone(),
            cache.clone(),
            reads.clone(),
            reconciler,
            Some(persistence),
            stats.clone(),
        )
        .with_refresh_after_create(false),
    );

    let owner = OwnerIdentity::new("owner-a");
    cache.activate(&owner).await;

    Harness {
        gateway,
        cache,
        reads,
        store,
        stats,
        coordinator,
        owner,
    }
}

fn slot(day: u32, hour: u32) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 11, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_create_inserts_record_and_invalidates_reads() {
    let h = harness().await;
    h.reads
        .get(&h.owner, ReservationStatus::Upcoming, None)
        .await
        .unwrap();
    h.gateway.push_create(Ok(101));

    let request = CreateReservation::personal("coach-7", slot(9, 14), slot(9, 15));
    let id = h.coordinator.create(&h.owner, request).await.unwrap();

    assert_eq!(id, 101);
    let snapshot = h.cache.snapshot().await;
    assert_eq!(snapshot.ids(), vec![101]);
    assert_eq!(snapshot.get(101).unwrap().counterpart_id, "coach-7");
    assert!(h.reads.is_empty().await);
    assert_eq!(h.stats.snapshot().creates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_persists_owner_records() {
    let h = harness().await;
    h.gateway.push_create(Ok(7));

    h.coordinator
        .create(&h.owner, CreateReservation::group("class-1"))
        .await
        .unwrap();

    assert!(h.store.load(&h.owner.key()).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_transport_failure_has_no_cache_effect() {
    let h = harness().await;
    h.gateway.push_create(Err(GatewayError::Transport {
        reason: "connection refused".to_string(),
    }));

    let result = h
        .coordinator
        .create(&h.owner, CreateReservation::group("55"))
        .await;

    assert!(matches!(result, Err(SyncError::Transport { .. })));
    assert!(h.cache.snapshot().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_conflict_with_listed_booking_is_success() {
    let h = harness().await;
    h.gateway.push_create(Err(GatewayError::Conflict {
        diagnostic: "duplicate key value violates unique constraint".to_string(),
    }));
    h.gateway
        .set_server(vec![remote(55, ReservationKind::Group, "")]);

    let id = h
        .coordinator
        .create(&h.owner, CreateReservation::group("55"))
        .await
        .unwrap();

    assert_eq!(id, 55);
    assert!(h.cache.snapshot().await.contains(55));
    assert_eq!(h.stats.snapshot().conflicts_resolved, 1);
}

#[tokio::test(start_paused = true)]
async fn test_conflict_without_match_is_already_reserved() {
    let h = harness().await;
    let diagnostic = "ERROR: 23505 duplicate key".to_string();
    h.gateway.push_create(Err(GatewayError::Conflict {
        diagnostic: diagnostic.clone(),
    }));
    h.gateway
        .set_server(vec![remote(9, ReservationKind::Personal, "coach-2")]);

    let result = h
        .coordinator
        .create(&h.owner, CreateReservation::group("55"))
        .await;

    match result {
        Err(SyncError::AlreadyReserved { diagnostic: raw }) => assert_eq!(raw, diagnostic),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(h.cache.snapshot().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_conflict_verification_failure_is_already_reserved() {
    let h = harness().await;
    h.gateway.push_create(Err(GatewayError::Conflict {
        diagnostic: "duplicate".to_string(),
    }));
    h.gateway.push_list_failure(GatewayError::Transport {
        reason: "offline".to_string(),
    });

    let result = h
        .coordinator
        .create(&h.owner, CreateReservation::group("55"))
        .await;
    assert!(matches!(result, Err(SyncError::AlreadyReserved { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_success_removes_record() {
    let h = harness().await;
    h.gateway.push_create(Ok(101));
    h.coordinator
        .create(&h.owner, CreateReservation::group("class-1"))
        .await
        .unwrap();

    h.coordinator.cancel(&h.owner, 101).await.unwrap();
    assert!(h.cache.snapshot().await.is_empty());
    assert_eq!(h.stats.snapshot().cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_cancel_of_absent_record_succeeds() {
    let h = harness().await;
    h.gateway.push_cancel(Err(GatewayError::Ambiguous {
        reason: "unparsable response".to_string(),
    }));

    h.coordinator.cancel(&h.owner, 42).await.unwrap();
    assert_eq!(h.stats.snapshot().ambiguous_resolved, 1);
    // Heuristic is local only
    assert_eq!(h.gateway.list_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_cancel_of_present_record_fails() {
    let h = harness().await;
    h.gateway.push_create(Ok(42));
    h.coordinator
        .create(&h.owner, CreateReservation::group("class-1"))
        .await
        .unwrap();
    h.gateway.push_cancel(Err(GatewayError::Ambiguous {
        reason: "connection dropped".to_string(),
    }));

    let result = h.coordinator.cancel(&h.owner, 42).await;
    assert!(matches!(result, Err(SyncError::Ambiguous { id: 42, .. })));
    assert!(h.cache.snapshot().await.contains(42));
    assert_eq!(h.stats.snapshot().ambiguous_unresolved, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_cancel_is_unknown_failure() {
    let h = harness().await;
    h.gateway.push_cancel(Err(GatewayError::Rejected {
        status: 403,
        body: "forbidden".to_string(),
    }));

    let result = h.coordinator.cancel(&h.owner, 42).await;
    assert!(matches!(
        result,
        Err(SyncError::Unknown(GatewayError::Rejected { status: 403, .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_mutations_of_one_owner_are_serialized() {
    let h = harness().await;
    h.gateway.set_delay(Duration::from_millis(50));

    let mut handles = Vec::new();
    for i in 0..3 {
        let coordinator = Arc::clone(&h.coordinator);
        let owner = h.owner.clone();
        h.gateway.push_create(Ok(200 + i));
        handles.push(tokio::spawn(async move {
            coordinator
                .create(&owner, CreateReservation::group(format!("class-{i}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.gateway.max_in_flight(), 1);
    assert_eq!(h.cache.snapshot().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_different_owners_run_concurrently() {
    let h = harness().await;
    h.gateway.set_delay(Duration::from_millis(50));
    let other = OwnerIdentity::new("owner-b");

    let first = {
        let coordinator = Arc::clone(&h.coordinator);
        let owner = h.owner.clone();
        tokio::spawn(async move { coordinator.cancel(&owner, 1).await })
    };
    let second = {
        let coordinator = Arc::clone(&h.coordinator);
        tokio::spawn(async move { coordinator.cancel(&other, 2).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(h.gateway.max_in_flight(), 2);
    assert_eq!(h.coordinator.queue_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_owner_switch_mid_create_leaves_new_owner_clean() {
    let h = harness().await;
    h.gateway.set_delay(Duration::from_millis(50));
    h.gateway.push_create(Ok(101));

    let pending = {
        let coordinator = Arc::clone(&h.coordinator);
        let owner = h.owner.clone();
        tokio::spawn(async move {
            coordinator
                .create(&owner, CreateReservation::group("class-1"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let other = OwnerIdentity::new("owner-b");
    h.cache.activate(&other).await;

    assert_eq!(pending.await.unwrap().unwrap(), 101);
    assert!(h.cache.snapshot().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_mutation_for_inactive_owner_leaves_reads_alone() {
    let h = harness().await;
    h.reads
        .get(&h.owner, ReservationStatus::Upcoming, None)
        .await
        .unwrap();
    h.cache.activate(&OwnerIdentity::new("owner-b")).await;
    h.gateway.push_create(Ok(101));

    let id = h
        .coordinator
        .create(&h.owner, CreateReservation::group("class-1"))
        .await
        .unwrap();

    assert_eq!(id, 101);
    assert_eq!(h.reads.len().await, 1);
    assert!(h.store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_release_drops_queue() {
    let h = harness().await;
    h.coordinator.cancel(&h.owner, 1).await.unwrap();
    assert!(h.coordinator.release(&h.owner.key()).await);
    assert!(!h.coordinator.release(&h.owner.key()).await);
    assert_eq!(h.coordinator.queue_count().await, 0);
}
