//! Persistence interface consumed by the engine
//!
//! The order store itself is an external collaborator; the engine only
//! issues row-level CRUD through this trait and never assumes anything
//! about the store's own replication or consistency model.

use async_trait::async_trait;
use shared::models::order::{Order, OrderStatus};

use crate::error::ClientResult;

/// Filters for the seeding snapshot fetch
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    /// Restrict to these statuses (empty = all active)
    pub statuses: Vec<OrderStatus>,
    /// Restrict to one table
    pub table_name: Option<String>,
}

impl OrderFilters {
    /// No filtering: every active order in scope
    pub fn all_active() -> Self {
        Self::default()
    }
}

/// Row-level CRUD surface of the order store
///
/// `set_order_status` must be idempotent from the caller's perspective:
/// issuing it twice with the same target status is safe.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Authoritative snapshot of active orders for one restaurant
    ///
    /// Seeds the local cache and the counters; also the designated
    /// drift-correction fetch behind `refresh()`.
    async fn fetch_active_orders(
        &self,
        restaurant_id: &str,
        filters: &OrderFilters,
    ) -> ClientResult<Vec<Order>>;

    /// Persist a status change
    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()>;

    /// Fetch a single order (cache-miss fill during reconciliation)
    async fn fetch_order(&self, order_id: &str) -> ClientResult<Option<Order>>;

    /// Delete an order row (bulk delete action)
    async fn delete_order(&self, order_id: &str) -> ClientResult<()>;
}
