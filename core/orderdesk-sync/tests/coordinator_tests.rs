use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use orderdesk_sync::{
    MemoryStore, Operation, RemoteStore, RetryPolicy, SnapshotStore, SyncConfig, SyncCoordinator,
    SyncError,
};
use orderdesk_types::{
    NewOrder, NewPayment, Order, OrderId, Payment, PaymentId, PaymentType, RecipientKind,
    ServiceType,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn test_config() -> SyncConfig {
    SyncConfig {
        record_deadline: Duration::from_secs(5),
        op_deadline: Duration::from_secs(5),
        retry: RetryPolicy::new(3).with_base_delay(Duration::from_millis(5)),
        watch_retry_delay: Duration::from_millis(5),
        idle_timeout: Duration::from_secs(5),
    }
}

fn setup() -> (SyncCoordinator, Arc<MemoryStore>, TempDir) {
    let store = Arc::new(MemoryStore::new());
    let dir = TempDir::new().unwrap();
    let coordinator = SyncCoordinator::with_config(
        Arc::clone(&store) as Arc<dyn RemoteStore>,
        SnapshotStore::new(dir.path()),
        test_config(),
    );
    (coordinator, store, dir)
}

fn channel_callback() -> (
    impl Fn(Vec<Order>) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Vec<Order>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |orders| {
            let _ = tx.send(orders);
        },
        rx,
    )
}

async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Vec<Order>>) -> Vec<Order> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a watch delivery")
        .expect("watch channel closed")
}

fn order_created_at(name: &str, created_at: DateTime<Utc>) -> Order {
    NewOrder::new(name, ServiceType::Other).into_order(OrderId::generate(), created_at)
}

fn payment(name: &str) -> Payment {
    NewPayment::new(RecipientKind::Worker, name, 100.0, PaymentType::Partial, "admin")
        .into_payment(PaymentId::generate(), Utc::now())
}

// ── Orders: add ──────────────────────────────────────────────────

#[tokio::test]
async fn add_order_returns_key_and_creation_time() {
    let (coordinator, store, _dir) = setup();

    let order = coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other).with_price(1000.0))
        .await
        .unwrap();

    assert!(!order.id.as_str().is_empty());
    assert_eq!(store.order_count(), 1);

    // The record arrives through the subscription.
    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;
    let first = next_delivery(&mut deliveries).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, order.id);
    assert_eq!(first[0].customer_name, "Ali");
}

#[tokio::test]
async fn add_order_does_not_splice_the_cache() {
    let (coordinator, _store, _dir) = setup();

    coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other))
        .await
        .unwrap();

    // Visibility comes from the watch, not from an optimistic insert.
    assert!(coordinator.orders().await.is_empty());
}

#[tokio::test]
async fn blank_customer_name_fails_before_any_store_call() {
    let (coordinator, store, _dir) = setup();

    let error = coordinator
        .add_order(NewOrder::new("", ServiceType::Other))
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::Validation(_)));

    let error = coordinator
        .add_order(NewOrder::new("   ", ServiceType::Other))
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::Validation(_)));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn explicit_creation_time_is_preserved_on_add() {
    let (coordinator, _store, _dir) = setup();
    let stamped = Utc.with_ymd_and_hms(2024, 12, 24, 18, 0, 0).unwrap();

    let order = coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other).with_created_at(stamped))
        .await
        .unwrap();

    assert_eq!(order.created_at, stamped);
}

// ── Orders: update ───────────────────────────────────────────────

#[tokio::test]
async fn update_of_unknown_id_fails_not_found_and_creates_nothing() {
    let (coordinator, store, _dir) = setup();

    let order = NewOrder::new("Sara", ServiceType::Design)
        .into_order(OrderId::new("abc123").unwrap(), Utc::now());

    match coordinator.update_order(order).await.unwrap_err() {
        SyncError::NotFound(id) => assert_eq!(id, "abc123"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.order_count(), 0);
}

#[tokio::test]
async fn update_requires_an_id_and_customer_name() {
    let (coordinator, store, _dir) = setup();

    // An empty id can only arrive via deserialized foreign data.
    let record: Order = serde_json::from_value(serde_json::json!({
        "id": "",
        "customerName": "Sara",
        "price": 100.0,
        "serviceType": "design",
        "date": "2025-01-01T00:00:00Z",
        "createdAt": "2025-01-01T00:00:00Z"
    }))
    .unwrap();
    assert!(matches!(
        coordinator.update_order(record).await.unwrap_err(),
        SyncError::Validation(_)
    ));

    let nameless =
        NewOrder::new("", ServiceType::Design).into_order(OrderId::new("ord-1").unwrap(), Utc::now());
    assert!(matches!(
        coordinator.update_order(nameless).await.unwrap_err(),
        SyncError::Validation(_)
    ));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn update_splices_the_cache_without_waiting_for_the_watch() {
    let (coordinator, _store, _dir) = setup();

    let created = coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other))
        .await
        .unwrap();

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;
    let first = next_delivery(&mut deliveries).await;
    assert_eq!(first.len(), 1);

    let mut changed = created.clone();
    changed.customer_name = "Sara".into();
    coordinator.update_order(changed).await.unwrap();

    let cached = coordinator.orders().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].customer_name, "Sara");
    assert!(cached[0].updated_at.is_some());
}

// ── Orders: delete ───────────────────────────────────────────────

#[tokio::test]
async fn deleting_missing_records_is_idempotent() {
    let (coordinator, _store, _dir) = setup();

    coordinator
        .delete_order(&OrderId::new("ghost").unwrap())
        .await
        .unwrap();
    coordinator
        .delete_payment(&PaymentId::new("ghost").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_removes_the_record_and_the_cache_entry() {
    let (coordinator, store, _dir) = setup();

    let created = coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other))
        .await
        .unwrap();

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;
    next_delivery(&mut deliveries).await;

    coordinator.delete_order(&created.id).await.unwrap();

    assert_eq!(store.order_count(), 0);
    assert!(coordinator.orders().await.is_empty());
}

// ── Retry budget ─────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_recover_within_the_retry_budget() {
    let (coordinator, store, _dir) = setup();
    store.fail_next(2);

    coordinator
        .delete_order(&OrderId::new("ord-1").unwrap())
        .await
        .unwrap();

    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn persistent_failure_consumes_exactly_the_attempt_budget() {
    let (coordinator, store, _dir) = setup();
    store.fail_next(10);

    match coordinator
        .delete_order(&OrderId::new("ord-1").unwrap())
        .await
        .unwrap_err()
    {
        SyncError::Exhausted {
            operation,
            attempts,
            ..
        } => {
            assert_eq!(operation, Operation::DeleteOrder);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.calls(), 3);
}

// ── Offline fail-fast ────────────────────────────────────────────

#[tokio::test]
async fn offline_order_writes_fail_fast_without_store_calls() {
    let (coordinator, store, _dir) = setup();
    coordinator.set_online(false).await;

    let add = coordinator
        .add_order(NewOrder::new("Ali", ServiceType::Other))
        .await;
    assert!(matches!(add.unwrap_err(), SyncError::Offline));

    let order = NewOrder::new("Sara", ServiceType::Design)
        .into_order(OrderId::new("ord-1").unwrap(), Utc::now());
    let update = coordinator.update_order(order).await;
    assert!(matches!(update.unwrap_err(), SyncError::Offline));

    let delete = coordinator.delete_order(&OrderId::new("ord-1").unwrap()).await;
    assert!(matches!(delete.unwrap_err(), SyncError::Offline));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn payments_do_not_consult_the_online_flag() {
    let (coordinator, store, _dir) = setup();
    coordinator.set_online(false).await;

    let id = coordinator
        .add_payment(NewPayment::new(
            RecipientKind::Worker,
            "Sara",
            250.0,
            PaymentType::Full,
            "admin",
        ))
        .await
        .unwrap();

    assert!(!id.as_str().is_empty());
    assert_eq!(store.payment_count(), 1);
}

// ── Watch deliveries ─────────────────────────────────────────────

#[tokio::test]
async fn watch_deliveries_replace_the_cache_wholesale() {
    let (coordinator, store, _dir) = setup();
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;
    assert!(next_delivery(&mut deliveries).await.is_empty());

    let first = order_created_at("first", base);
    store.insert_order(first.clone());
    assert_eq!(next_delivery(&mut deliveries).await.len(), 1);

    let second = order_created_at("second", base + ChronoDuration::hours(1));
    store.insert_order(second.clone());
    assert_eq!(next_delivery(&mut deliveries).await.len(), 2);

    store.remove_order_direct(&first.id);
    let final_delivery = next_delivery(&mut deliveries).await;

    // Nothing from the earlier snapshot survives.
    assert_eq!(final_delivery.len(), 1);
    assert_eq!(final_delivery[0].id, second.id);
    assert_eq!(coordinator.orders().await, final_delivery);
}

#[tokio::test]
async fn watch_deliveries_are_sorted_newest_first() {
    let (coordinator, store, _dir) = setup();
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    store.insert_order(order_created_at("oldest", base));
    store.insert_order(order_created_at("middle", base + ChronoDuration::hours(1)));
    store.insert_order(order_created_at("newest", base + ChronoDuration::hours(2)));

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;

    let delivered = next_delivery(&mut deliveries).await;
    let names: Vec<&str> = delivered.iter().map(|o| o.customer_name.as_str()).collect();
    assert_eq!(names, ["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn watch_establishment_failure_delivers_an_empty_list_once() {
    let (coordinator, store, _dir) = setup();
    store.fail_next(3);

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;

    let delivered = next_delivery(&mut deliveries).await;
    assert!(delivered.is_empty());
    assert_eq!(store.calls(), 3);

    // The watch gave up; nothing further arrives.
    assert!(
        tokio::time::timeout(Duration::from_millis(100), deliveries.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn unsubscribe_stops_deliveries() {
    let (coordinator, store, _dir) = setup();

    let (callback, mut deliveries) = channel_callback();
    let watch = coordinator.subscribe_orders(callback).await;
    next_delivery(&mut deliveries).await;

    watch.unsubscribe().await;
    store.insert_order(order_created_at("late", Utc::now()));

    assert!(
        tokio::time::timeout(Duration::from_millis(100), deliveries.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn subscribing_offline_serves_the_cached_list_and_defers() {
    let (coordinator, store, dir) = setup();

    // Seed the snapshot the way a previous session would have left it.
    let snapshots = SnapshotStore::new(dir.path());
    let base = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
    snapshots
        .save_orders(&[
            order_created_at("cached-1", base),
            order_created_at("cached-2", base + ChronoDuration::hours(1)),
        ])
        .await
        .unwrap();
    coordinator.start().await;
    coordinator.set_online(false).await;

    let (callback, mut deliveries) = channel_callback();
    let _watch = coordinator.subscribe_orders(callback).await;

    let cached = next_delivery(&mut deliveries).await;
    assert_eq!(cached.len(), 2);
    assert_eq!(store.calls(), 0);

    // Reconnecting establishes the deferred watch against live data.
    store.insert_order(order_created_at("remote", Utc::now()));
    coordinator.set_online(true).await;

    let live = next_delivery(&mut deliveries).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].customer_name, "remote");
}

// ── Payments ─────────────────────────────────────────────────────

#[tokio::test]
async fn add_payment_returns_key_and_updates_cache() {
    let (coordinator, store, _dir) = setup();

    let id = coordinator
        .add_payment(NewPayment::new(
            RecipientKind::Worker,
            "Sara",
            250.0,
            PaymentType::Full,
            "admin",
        ))
        .await
        .unwrap();

    assert!(!id.as_str().is_empty());
    assert_eq!(store.payment_count(), 1);

    let cached = coordinator.payments().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, id);
    assert_eq!(cached[0].recipient_name, "Sara");
}

#[tokio::test]
async fn get_all_payments_caches_and_persists() {
    let (coordinator, store, dir) = setup();
    store.insert_payment(payment("Sara"));
    store.insert_payment(payment("Omar"));

    let fetched = coordinator.get_all_payments().await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(coordinator.payments().await.len(), 2);

    // The snapshot now holds the fetched collection.
    let snapshots = SnapshotStore::new(dir.path());
    assert_eq!(snapshots.load_payments().await.unwrap().unwrap().len(), 2);
}

#[tokio::test]
async fn payment_fetch_falls_back_to_the_snapshot() {
    let (coordinator, store, dir) = setup();

    let snapshots = SnapshotStore::new(dir.path());
    let cached: Vec<Payment> = (0..5).map(|i| payment(&format!("w{i}"))).collect();
    snapshots.save_payments(&cached).await.unwrap();

    store.fail_next(1);
    let served = coordinator.get_all_payments().await.unwrap();
    assert_eq!(served.len(), 5);
    assert_eq!(coordinator.payments().await.len(), 5);
}

#[tokio::test]
async fn payment_fetch_without_a_snapshot_surfaces_the_failure() {
    let (coordinator, store, _dir) = setup();
    store.fail_next(1);

    match coordinator.get_all_payments().await.unwrap_err() {
        SyncError::Exhausted { operation, .. } => {
            assert_eq!(operation, Operation::FetchPayments);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn refresh_retries_and_degrades_to_the_cached_list() {
    let (coordinator, store, dir) = setup();

    let snapshots = SnapshotStore::new(dir.path());
    snapshots
        .save_payments(&[payment("Sara"), payment("Omar")])
        .await
        .unwrap();

    store.fail_next(10);
    let served = coordinator.refresh_payments().await.unwrap();

    // Stale-over-nothing: the cached list comes back, after the full budget.
    assert_eq!(served.len(), 2);
    assert_eq!(store.calls(), 3);
}

#[tokio::test]
async fn refresh_updates_cache_on_success() {
    let (coordinator, store, _dir) = setup();
    store.insert_payment(payment("Sara"));

    let refreshed = coordinator.refresh_payments().await.unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(coordinator.payments().await.len(), 1);
}

#[tokio::test]
async fn delete_all_payments_clears_collection_and_cache() {
    let (coordinator, store, _dir) = setup();
    for name in ["Sara", "Omar"] {
        coordinator
            .add_payment(NewPayment::new(
                RecipientKind::Worker,
                name,
                100.0,
                PaymentType::Partial,
                "admin",
            ))
            .await
            .unwrap();
    }
    assert_eq!(store.payment_count(), 2);

    coordinator.delete_all_payments().await.unwrap();

    assert_eq!(store.payment_count(), 0);
    assert!(coordinator.payments().await.is_empty());
}

#[tokio::test]
async fn recipient_query_filters_fetched_payments() {
    let (coordinator, store, _dir) = setup();
    store.insert_payment(payment("Sara"));
    store.insert_payment(payment("Omar"));
    store.insert_payment(
        NewPayment::new(RecipientKind::Partner, "Sara", 500.0, PaymentType::Full, "admin")
            .into_payment(PaymentId::generate(), Utc::now()),
    );

    let matched = coordinator
        .payments_for_recipient(RecipientKind::Worker, "Sara")
        .await
        .unwrap();

    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].recipient, RecipientKind::Worker);
}

// ── Startup seeding ──────────────────────────────────────────────

#[tokio::test]
async fn start_seeds_caches_from_snapshots() {
    let (coordinator, _store, dir) = setup();

    let snapshots = SnapshotStore::new(dir.path());
    snapshots
        .save_orders(&[order_created_at("cached", Utc::now())])
        .await
        .unwrap();
    snapshots
        .save_payments(&[payment("Sara")])
        .await
        .unwrap();

    coordinator.start().await;

    assert_eq!(coordinator.orders().await.len(), 1);
    assert_eq!(coordinator.payments().await.len(), 1);
}
