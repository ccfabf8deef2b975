//! Kitchen board demo over an in-process feed
//!
//! Seeds a small in-memory store, starts the engine, then plays a few
//! remote changes and an optimistic move while printing the
//! projections the UI would render.
//!
//! Run with: cargo run -p kelp-client --example board_demo

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use kelp_client::{
    BoardConfig, BoardEngine, BoardHandle, BulkAction, ClientResult, MemoryConnector,
    OrderFilters, OrderStore, StoreError,
};
use shared::feed::{ChangeEvent, FeedMessage, RecordTable};
use shared::models::order::{Order, OrderStatus};

/// Minimal in-memory store standing in for the real persistence layer
struct DemoStore {
    orders: Mutex<HashMap<String, Order>>,
}

#[async_trait]
impl OrderStore for DemoStore {
    async fn fetch_active_orders(
        &self,
        restaurant_id: &str,
        _filters: &OrderFilters,
    ) -> ClientResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.restaurant_id == restaurant_id && o.status.is_active())
            .cloned()
            .collect())
    }

    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
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

fn demo_order(id: &str, table: &str, status: OrderStatus, created_at: i64) -> Order {
    Order {
        id: id.to_string(),
        restaurant_id: "demo-restaurant".to_string(),
        table_name: Some(table.to_string()),
        customer_name: None,
        status,
        total: 32.5,
        currency: "EUR".to_string(),
        order_number: format!("A-{id}"),
        notes: None,
        created_at,
        updated_at: created_at,
    }
}

fn print_board(handle: &BoardHandle, label: &str) {
    let counts = handle.counts();
    println!("--- {label} ---");
    println!(
        "counts: {} pending, {} preparing, {} ready, {} served ({} active)",
        counts.pending, counts.preparing, counts.ready, counts.served, counts.active_total
    );
    for order in handle.orders() {
        println!(
            "  {:<8} {:<10} {}",
            order.order_number,
            order.status.to_string(),
            order.table_name.as_deref().unwrap_or("-")
        );
    }
    println!(
        "connection: {:?} (live: {})",
        handle.connection().state,
        handle.connection().is_live()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(DemoStore {
        orders: Mutex::new(
            [
                demo_order("101", "T1", OrderStatus::Pending, 100),
                demo_order("102", "T2", OrderStatus::Pending, 200),
                demo_order("103", "T4", OrderStatus::Preparing, 300),
            ]
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect(),
        ),
    });

    // In-process feed: the store side pushes FeedMessages here; both
    // receivers stay alive so sends never fail
    let (from_store_tx, _keep_from) = broadcast::channel(64);
    let (to_store_tx, _keep_to) = broadcast::channel(64);
    let connector = Arc::new(MemoryConnector::new(
        from_store_tx.clone(),
        to_store_tx.clone(),
    ));

    let config = BoardConfig::new("demo-restaurant", "http://localhost:8080");
    let handle = BoardEngine::start(config, store, connector).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    print_board(&handle, "after seed");

    // A cook drags order 101 to preparing (optimistic, then persisted)
    handle.move_order("101", OrderStatus::Preparing).await?;
    print_board(&handle, "after local move 101 -> preparing");

    // Another client completes order 103; the change arrives as an event
    let old = demo_order("103", "T4", OrderStatus::Preparing, 300);
    let mut new = old.clone();
    new.status = OrderStatus::Ready;
    from_store_tx.send(FeedMessage::change(&ChangeEvent::update(
        RecordTable::Orders,
        &old,
        &new,
    )))?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    print_board(&handle, "after remote move 103 -> ready");

    // Bulk: mark everything pending as preparing
    let pending: Vec<String> = handle
        .orders()
        .iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .map(|o| o.id.clone())
        .collect();
    let outcome = handle
        .bulk_apply(pending, BulkAction::SetStatus(OrderStatus::Preparing))
        .await?;
    println!("bulk: {}", outcome.summary());
    print_board(&handle, "after bulk move");

    handle.shutdown();
    Ok(())
}
