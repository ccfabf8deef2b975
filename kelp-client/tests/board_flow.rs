//! End-to-end board flows over an in-memory feed and a scripted store
//!
//! Drives the real engine: seeding, optimistic moves with rollback,
//! reconciliation against the change feed, counter maintenance, bulk
//! actions and offline fallback.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use kelp_client::{
    BoardConfig, BoardEngine, BoardHandle, BulkAction, ClientResult, ConnectionState,
    EngineError, FeedConnector, FeedError, MemoryConnector, OrderFilters, OrderStore, StoreError,
};
use kelp_client::feed::transport::FeedTransport;
use shared::feed::{ChangeEvent, FeedMessage, RecordTable};
use shared::models::order::{Order, OrderItem, OrderStatus};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Scriptable store: per-id failure injection and call counting
struct MockStore {
    orders: Mutex<HashMap<String, Order>>,
    fail_status_for: Mutex<HashSet<String>>,
    status_calls: AtomicU32,
}

impl MockStore {
    fn with_orders(orders: Vec<Order>) -> Arc<Self> {
        Arc::new(Self {
            orders: Mutex::new(orders.into_iter().map(|o| (o.id.clone(), o)).collect()),
            fail_status_for: Mutex::new(HashSet::new()),
            status_calls: AtomicU32::new(0),
        })
    }

    fn fail_status(&self, id: &str) {
        self.fail_status_for.lock().unwrap().insert(id.to_string());
    }

    fn insert(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    fn status_of(&self, id: &str) -> Option<OrderStatus> {
        self.orders.lock().unwrap().get(id).map(|o| o.status)
    }

    fn active_snapshot(&self, restaurant_id: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.restaurant_id == restaurant_id && o.status.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }
}

#[async_trait]
impl OrderStore for MockStore {
    async fn fetch_active_orders(
        &self,
        restaurant_id: &str,
        _filters: &OrderFilters,
    ) -> ClientResult<Vec<Order>> {
        Ok(self.active_snapshot(restaurant_id))
    }

    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status_for.lock().unwrap().contains(order_id) {
            return Err(StoreError::Internal("injected failure".to_string()));
        }
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) => {
                order.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(order_id.to_string())),
        }
    }

    async fn fetch_order(&self, order_id: &str) -> ClientResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn delete_order(&self, order_id: &str) -> ClientResult<()> {
        self.orders.lock().unwrap().remove(order_id);
        Ok(())
    }
}

/// Connector that never succeeds (offline scenarios)
struct DeadConnector;

#[async_trait]
impl FeedConnector for DeadConnector {
    async fn connect(&self) -> Result<FeedTransport, FeedError> {
        Err(FeedError::Connection("no route to store".to_string()))
    }
}

/// In-memory stand-in for the store-side feed publisher
struct FeedHarness {
    from_store_tx: broadcast::Sender<FeedMessage>,
    to_store_tx: broadcast::Sender<FeedMessage>,
    // Both receivers stay alive: pushes must not error before the
    // client connects, and handshake/presence writes need a reader
    _keep_from: broadcast::Receiver<FeedMessage>,
    _keep_to: broadcast::Receiver<FeedMessage>,
}

impl FeedHarness {
    fn new() -> Self {
        let (from_store_tx, _keep_from) = broadcast::channel(256);
        let (to_store_tx, _keep_to) = broadcast::channel(256);
        Self {
            from_store_tx,
            to_store_tx,
            _keep_from,
            _keep_to,
        }
    }

    fn connector(&self) -> Arc<MemoryConnector> {
        Arc::new(MemoryConnector::new(
            self.from_store_tx.clone(),
            self.to_store_tx.clone(),
        ))
    }

    fn push(&self, event: &ChangeEvent) {
        self.from_store_tx
            .send(FeedMessage::change(event))
            .expect("feed has no subscribers");
    }
}

// ---------------------------------------------------------------------------
// Fixtures and helpers
// ---------------------------------------------------------------------------

fn order(id: &str, status: OrderStatus, created_at: i64) -> Order {
    Order {
        id: id.to_string(),
        restaurant_id: "rest-1".to_string(),
        table_name: Some("T1".to_string()),
        customer_name: None,
        status,
        total: 18.0,
        currency: "EUR".to_string(),
        order_number: format!("A-{id}"),
        notes: None,
        created_at,
        updated_at: created_at,
    }
}

fn item(id: &str, order_id: &str) -> OrderItem {
    OrderItem {
        id: id.to_string(),
        order_id: order_id.to_string(),
        menu_item_id: "m-1".to_string(),
        name: "Ramen".to_string(),
        quantity: 2,
        unit_price: 9.0,
        modifiers: vec!["extra nori".to_string()],
        notes: None,
    }
}

fn fast_config() -> BoardConfig {
    BoardConfig::new("rest-1", "http://localhost:8080")
        .with_retry(Duration::from_millis(10), 5)
        .with_heartbeat(Duration::from_millis(200))
}

async fn wait_until(mut pred: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_connected(handle: &BoardHandle) {
    let handle = handle.clone();
    wait_until(move || handle.connection().state == ConnectionState::Connected).await;
}

fn status_in(handle: &BoardHandle, id: &str) -> Option<OrderStatus> {
    handle.orders().iter().find(|o| o.id == id).map(|o| o.status)
}

async fn start_board(
    store: Arc<MockStore>,
    harness: &FeedHarness,
) -> BoardHandle {
    let handle = BoardEngine::start(fast_config(), store, harness.connector())
        .await
        .expect("engine start");
    wait_connected(&handle).await;
    handle
}

// ---------------------------------------------------------------------------
// Seeding and projections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_seed_populates_projections() {
    let store = MockStore::with_orders(vec![
        order("o-1", OrderStatus::Pending, 100),
        order("o-2", OrderStatus::Pending, 200),
        order("o-3", OrderStatus::Preparing, 300),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    let orders = handle.orders();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].id, "o-1"); // oldest first

    let counts = handle.counts();
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.preparing, 1);
    assert_eq!(counts.active_total, 3);

    handle.shutdown();
}

// ---------------------------------------------------------------------------
// Moves: validation, optimism, rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rejected_move_touches_nothing() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    // pending -> ready is not adjacent
    let result = handle.move_order("o-1", OrderStatus::Ready).await;
    assert!(matches!(result, Err(EngineError::IllegalMove { .. })));

    assert_eq!(status_in(&handle, "o-1"), Some(OrderStatus::Pending));
    // No persistence call was issued for the rejected move
    assert_eq!(store.status_calls.load(Ordering::SeqCst), 0);

    handle.shutdown();
}

#[tokio::test]
async fn test_move_applies_optimistically_and_persists() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    handle.move_order("o-1", OrderStatus::Preparing).await.unwrap();

    assert_eq!(status_in(&handle, "o-1"), Some(OrderStatus::Preparing));
    assert_eq!(store.status_of("o-1"), Some(OrderStatus::Preparing));
    let counts = handle.counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.preparing, 1);

    handle.shutdown();
}

#[tokio::test]
async fn test_failed_persistence_rolls_back() {
    // Scenario: O starts pending; ready is rejected outright, then a
    // legal move to preparing fails persistence and snaps back.
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    let rejected = handle.move_order("o-1", OrderStatus::Ready).await;
    assert!(matches!(rejected, Err(EngineError::IllegalMove { .. })));
    assert_eq!(status_in(&handle, "o-1"), Some(OrderStatus::Pending));

    store.fail_status("o-1");
    let failed = handle.move_order("o-1", OrderStatus::Preparing).await;
    assert!(matches!(failed, Err(EngineError::Store(_))));

    // Reverted to the pre-mutation value, counters included
    assert_eq!(status_in(&handle, "o-1"), Some(OrderStatus::Pending));
    assert_eq!(store.status_of("o-1"), Some(OrderStatus::Pending));
    let counts = handle.counts();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.preparing, 0);
    assert_eq!(counts.active_sum(), counts.active_total);

    handle.shutdown();
}

#[tokio::test]
async fn test_move_of_unknown_order_is_rejected() {
    let store = MockStore::with_orders(vec![]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    let result = handle.move_order("ghost", OrderStatus::Preparing).await;
    assert!(matches!(result, Err(EngineError::UnknownOrder(_))));

    handle.shutdown();
}

// ---------------------------------------------------------------------------
// Feed reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remote_update_moves_buckets_without_changing_total() {
    // preparing=5, ready=2; a remote client moves one order to ready
    let mut seed = vec![];
    for i in 0..5 {
        seed.push(order(&format!("p-{i}"), OrderStatus::Preparing, i));
    }
    for i in 0..2 {
        seed.push(order(&format!("r-{i}"), OrderStatus::Ready, 10 + i));
    }
    let store = MockStore::with_orders(seed);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;
    assert_eq!(handle.counts().preparing, 5);
    assert_eq!(handle.counts().ready, 2);

    let old = order("p-0", OrderStatus::Preparing, 0);
    let mut new = old.clone();
    new.status = OrderStatus::Ready;
    harness.push(&ChangeEvent::update(RecordTable::Orders, &old, &new));

    let h = handle.clone();
    wait_until(move || h.counts().ready == 3).await;

    let counts = handle.counts();
    assert_eq!(counts.preparing, 4);
    assert_eq!(counts.ready, 3);
    assert_eq!(counts.active_total, 7);
    assert_eq!(status_in(&handle, "p-0"), Some(OrderStatus::Ready));

    handle.shutdown();
}

#[tokio::test]
async fn test_duplicate_deliveries_do_not_drift_counters() {
    let store = MockStore::with_orders(vec![
        order("o-1", OrderStatus::Pending, 100),
        order("o-2", OrderStatus::Preparing, 200),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    let old = order("o-1", OrderStatus::Pending, 100);
    let mut new = old.clone();
    new.status = OrderStatus::Preparing;
    let event = ChangeEvent::update(RecordTable::Orders, &old, &new);

    // A reconnect replays the same notification twice
    harness.push(&event);
    harness.push(&event);
    harness.push(&event);

    let h = handle.clone();
    wait_until(move || status_in(&h, "o-1") == Some(OrderStatus::Preparing)).await;
    // Let the replays drain
    tokio::time::sleep(Duration::from_millis(30)).await;

    let counts = handle.counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.preparing, 2);
    assert_eq!(counts.active_total, 2);
    assert_eq!(counts.active_sum(), counts.active_total);

    handle.shutdown();
}

#[tokio::test]
async fn test_own_echo_confirms_optimistic_move() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    handle.move_order("o-1", OrderStatus::Preparing).await.unwrap();

    // The store echoes our own committed change back over the feed
    let old = order("o-1", OrderStatus::Pending, 100);
    let mut new = old.clone();
    new.status = OrderStatus::Preparing;
    new.updated_at = 999;
    harness.push(&ChangeEvent::update(RecordTable::Orders, &old, &new));

    let h = handle.clone();
    wait_until(move || {
        h.orders()
            .iter()
            .any(|o| o.id == "o-1" && o.updated_at == 999)
    })
    .await;

    // No double counting from the echo
    let counts = handle.counts();
    assert_eq!(counts.preparing, 1);
    assert_eq!(counts.active_total, 1);

    handle.shutdown();
}

#[tokio::test]
async fn test_insert_event_adds_new_order() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    // An extra subscriber rides the same connection as the engine
    let mut raw_events = handle.subscribe_events();

    harness.push(&ChangeEvent::insert(
        RecordTable::Orders,
        &order("o-2", OrderStatus::Pending, 200),
    ));

    let h = handle.clone();
    wait_until(move || h.orders().len() == 2).await;
    assert_eq!(handle.counts().pending, 2);

    let raw = raw_events.try_recv().expect("raw subscriber sees the event");
    assert_eq!(raw.new_as::<Order>().unwrap().id, "o-2");

    handle.shutdown();
}

#[tokio::test]
async fn test_completion_event_leaves_the_board() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Served, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;
    assert_eq!(handle.counts().active_total, 1);

    let old = order("o-1", OrderStatus::Served, 100);
    let mut new = old.clone();
    new.status = OrderStatus::Completed;
    harness.push(&ChangeEvent::update(RecordTable::Orders, &old, &new));

    let h = handle.clone();
    wait_until(move || h.counts().active_total == 0).await;

    let counts = handle.counts();
    assert_eq!(counts.served, 0);
    assert_eq!(counts.completed, 1);
    assert!(handle.orders().is_empty());

    handle.shutdown();
}

#[tokio::test]
async fn test_detail_event_for_unseeded_order_fills_the_cache() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    // An order created after the seed; its item event arrives first
    store.insert(order("o-2", OrderStatus::Pending, 200));
    harness.push(&ChangeEvent::insert(RecordTable::OrderItems, &item("i-1", "o-2")));

    // Cache miss triggered fetch-and-insert rather than a dropped event
    let h = handle.clone();
    wait_until(move || h.orders().iter().any(|o| o.id == "o-2")).await;
    assert_eq!(handle.counts().pending, 2);

    handle.shutdown();
}

// ---------------------------------------------------------------------------
// Bulk actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bulk_set_status_partial_success() {
    // Scenario: B fails persistence; A and C go through
    let store = MockStore::with_orders(vec![
        order("a", OrderStatus::Pending, 100),
        order("b", OrderStatus::Pending, 200),
        order("c", OrderStatus::Pending, 300),
    ]);
    store.fail_status("b");
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    let outcome = handle
        .bulk_apply(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            BulkAction::SetStatus(OrderStatus::Preparing),
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, vec!["a", "c"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, "b");
    assert_eq!(outcome.summary(), "2 succeeded, 1 failed");

    // Local store reflects exactly the succeeded subset
    assert_eq!(status_in(&handle, "a"), Some(OrderStatus::Preparing));
    assert_eq!(status_in(&handle, "b"), Some(OrderStatus::Pending));
    assert_eq!(status_in(&handle, "c"), Some(OrderStatus::Preparing));

    let counts = handle.counts();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.preparing, 2);
    assert_eq!(counts.active_sum(), counts.active_total);

    handle.shutdown();
}

#[tokio::test]
async fn test_bulk_delete_removes_rows() {
    let store = MockStore::with_orders(vec![
        order("a", OrderStatus::Pending, 100),
        order("b", OrderStatus::Ready, 200),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    let outcome = handle
        .bulk_apply(
            vec!["a".to_string(), "ghost".to_string()],
            BulkAction::Delete,
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, vec!["a"]);
    assert_eq!(outcome.failed[0].id, "ghost");
    assert_eq!(handle.orders().len(), 1);
    assert!(store.status_of("a").is_none());
    assert_eq!(handle.counts().active_total, 1);

    handle.shutdown();
}

#[tokio::test]
async fn test_bulk_export_resolves_cached_orders() {
    let store = MockStore::with_orders(vec![
        order("a", OrderStatus::Pending, 100),
        order("b", OrderStatus::Ready, 200),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    let outcome = handle
        .bulk_apply(
            vec!["a".to_string(), "b".to_string(), "ghost".to_string()],
            BulkAction::Export,
        )
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, vec!["a", "b"]);
    assert_eq!(outcome.exported.len(), 2);
    assert_eq!(outcome.failed[0].id, "ghost");

    handle.shutdown();
}

// ---------------------------------------------------------------------------
// Refresh, drift and offline fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_converges_to_fresh_snapshot() {
    let store = MockStore::with_orders(vec![
        order("o-1", OrderStatus::Pending, 100),
        order("o-2", OrderStatus::Preparing, 200),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    // Drift: the store changes without any feed notification
    store.insert(order("o-3", OrderStatus::Ready, 300));
    {
        let mut orders = store.orders.lock().unwrap();
        orders.get_mut("o-1").unwrap().status = OrderStatus::Completed;
    }
    assert_eq!(handle.orders().len(), 2); // stale

    handle.refresh().await.unwrap();

    let snapshot = store.active_snapshot("rest-1");
    assert_eq!(handle.orders(), snapshot);
    let counts = handle.counts();
    assert_eq!(counts.active_total, snapshot.len() as u32);
    assert_eq!(counts.active_sum(), counts.active_total);

    handle.shutdown();
}

#[tokio::test]
async fn test_offline_after_exhausted_retries_refresh_still_works() {
    // Scenario: the feed is unreachable; after the retry budget the
    // client reports offline, and a manual refresh still succeeds via
    // a one-off fetch independent of the channel.
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let handle = BoardEngine::start(fast_config(), store.clone(), Arc::new(DeadConnector))
        .await
        .expect("engine start");

    let h = handle.clone();
    wait_until(move || h.connection().retries_exhausted).await;

    let status = handle.connection();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.attempts, 5);
    assert!(!status.is_live());

    // Data is still served from the cache, clearly not "live"
    assert_eq!(handle.orders().len(), 1);

    store.insert(order("o-2", OrderStatus::Pending, 200));
    handle.refresh().await.unwrap();
    assert_eq!(handle.orders().len(), 2);

    handle.shutdown();
}

/// Feed whose store-side sender can be swapped between connects,
/// simulating a dropped and re-established connection
struct SwappableFeed {
    current: Mutex<broadcast::Sender<FeedMessage>>,
    to_store_tx: broadcast::Sender<FeedMessage>,
}

#[async_trait]
impl FeedConnector for SwappableFeed {
    async fn connect(&self) -> Result<FeedTransport, FeedError> {
        let tx = self.current.lock().unwrap().clone();
        let connector = MemoryConnector::new(tx, self.to_store_tx.clone());
        connector.connect().await
    }
}

#[tokio::test]
async fn test_reconnect_catches_up_with_fresh_snapshot() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let (first_tx, _) = broadcast::channel::<FeedMessage>(64);
    let (to_store_tx, _keep_to) = broadcast::channel::<FeedMessage>(64);
    let feed = Arc::new(SwappableFeed {
        current: Mutex::new(first_tx.clone()),
        to_store_tx,
    });

    let handle = BoardEngine::start(fast_config(), store.clone(), feed.clone())
        .await
        .expect("engine start");
    wait_connected(&handle).await;
    // Let the engine observe the first connect before breaking it
    tokio::time::sleep(Duration::from_millis(20)).await;

    // A change lands while the feed is about to be down; no event for it
    store.insert(order("o-2", OrderStatus::Pending, 200));

    // Break the current connection; the supervisor rebuilds on the new sender
    let (second_tx, _keep_second) = broadcast::channel::<FeedMessage>(64);
    *feed.current.lock().unwrap() = second_tx;
    drop(first_tx);

    // The engine catches up from a fresh snapshot without a manual refresh
    let h = handle.clone();
    wait_until(move || h.orders().len() == 2).await;
    assert_eq!(handle.counts().pending, 2);

    handle.shutdown();
}

#[tokio::test]
async fn test_shutdown_makes_commands_fail_fast() {
    let store = MockStore::with_orders(vec![order("o-1", OrderStatus::Pending, 100)]);
    let harness = FeedHarness::new();
    let handle = start_board(store, &harness).await;

    handle.shutdown();
    // Give the engine task a turn to observe the cancellation
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = handle.move_order("o-1", OrderStatus::Preparing).await;
    assert!(matches!(result, Err(EngineError::Stopped)));

    handle.shutdown();
}

#[tokio::test]
async fn test_mixed_sequence_keeps_sum_invariant_then_converges() {
    let store = MockStore::with_orders(vec![
        order("o-1", OrderStatus::Pending, 100),
        order("o-2", OrderStatus::Preparing, 200),
        order("o-3", OrderStatus::Ready, 300),
    ]);
    let harness = FeedHarness::new();
    let handle = start_board(store.clone(), &harness).await;

    // Local optimistic move
    handle.move_order("o-1", OrderStatus::Preparing).await.unwrap();

    // Remote events, including a duplicate and a deletion
    let old2 = order("o-2", OrderStatus::Preparing, 200);
    let mut new2 = old2.clone();
    new2.status = OrderStatus::Ready;
    harness.push(&ChangeEvent::update(RecordTable::Orders, &old2, &new2));
    harness.push(&ChangeEvent::update(RecordTable::Orders, &old2, &new2));
    harness.push(&ChangeEvent::delete(
        RecordTable::Orders,
        &order("o-3", OrderStatus::Ready, 300),
    ));
    harness.push(&ChangeEvent::insert(
        RecordTable::Orders,
        &order("o-4", OrderStatus::Pending, 400),
    ));

    let h = handle.clone();
    wait_until(move || h.orders().iter().any(|o| o.id == "o-4")).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let counts = handle.counts();
    assert_eq!(counts.active_sum(), counts.active_total);
    assert_eq!(counts.active_total, 3); // o-1, o-2, o-4

    // Convergence: refresh always lands exactly on a fresh snapshot
    store.insert(order("o-2", OrderStatus::Ready, 200));
    handle.refresh().await.unwrap();
    assert_eq!(handle.orders(), store.active_snapshot("rest-1"));

    handle.shutdown();
}
