//! Optimistic local store
//!
//! Normalized per-client cache of orders, items and payments keyed by
//! id. The store never assumes it holds the complete authoritative
//! set: an initial bulk fetch seeds it and everything after is
//! delta-only.
//!
//! Reconciliation is idempotent wholesale overwrite: the incoming
//! record always replaces the cached one, fields are never merged.
//! Applying the same event twice, out of causal order within the
//! upstream guarantees, or echoed back for this client's own
//! optimistic mutation all land on the same final state.

use std::collections::HashMap;
use std::time::Duration;

use shared::feed::{ChangeEvent, ChangeKind, RecordTable};
use shared::models::order::{Order, OrderItem, OrderStatus, Payment};

use crate::board::optimistic::{self, OptimisticGuard};

/// Cache value with an explicit fetch time
///
/// Staleness is a property checked at read time, not a timer scattered
/// per feature.
#[derive(Debug, Clone)]
pub struct CacheValue<T> {
    pub data: T,
    /// Unix milliseconds of the seeding fetch
    pub fetched_at: i64,
}

impl<T> CacheValue<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            fetched_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Age of the cached data
    pub fn age(&self) -> Duration {
        let now = chrono::Utc::now().timestamp_millis();
        Duration::from_millis(now.saturating_sub(self.fetched_at).max(0) as u64)
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// What a reconciliation actually changed in the cache
///
/// The engine feeds the counter aggregator from these, so the deltas
/// reflect cached state rather than the event's claim about it; a
/// duplicate UPDATE degrades to `old == new` and the counters stay
/// exact.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileChange {
    OrderInserted(Order),
    OrderUpdated { old: Order, new: Order },
    OrderRemoved(Order),
    /// Item/payment row changed for an order the cache holds
    DetailChanged,
    /// Item/payment row arrived for an order the cache does not hold
    DetailForUnknownOrder(String),
    /// Nothing to do (duplicate delete, out-of-scope record, bad payload)
    None,
}

/// Normalized per-client order cache
#[derive(Debug)]
pub struct OrderCache {
    restaurant_id: String,
    orders: CacheValue<HashMap<String, Order>>,
    items: HashMap<String, OrderItem>,
    payments: HashMap<String, Payment>,
}

impl OrderCache {
    pub fn new(restaurant_id: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            orders: CacheValue::new(HashMap::new()),
            items: HashMap::new(),
            payments: HashMap::new(),
        }
    }

    /// Replace the cached set wholesale from an authoritative snapshot
    ///
    /// Items and payments for orders no longer present are dropped.
    pub fn seed(&mut self, orders: Vec<Order>) {
        let map: HashMap<String, Order> = orders
            .into_iter()
            .map(|order| (order.id.clone(), order))
            .collect();
        self.items.retain(|_, item| map.contains_key(&item.order_id));
        self.payments
            .retain(|_, payment| map.contains_key(&payment.order_id));
        self.orders = CacheValue::new(map);
    }

    /// Whether the seed snapshot is older than `max_age`
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.orders.is_stale(max_age)
    }

    pub fn len(&self) -> usize {
        self.orders.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.data.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.data.get(id)
    }

    pub fn status_of(&self, id: &str) -> Option<OrderStatus> {
        self.get(id).map(|order| order.status)
    }

    /// Items belonging to one order
    pub fn items_of(&self, order_id: &str) -> Vec<&OrderItem> {
        let mut items: Vec<&OrderItem> = self
            .items
            .values()
            .filter(|item| item.order_id == order_id)
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    /// Payments belonging to one order
    pub fn payments_of(&self, order_id: &str) -> Vec<&Payment> {
        let mut payments: Vec<&Payment> = self
            .payments
            .values()
            .filter(|payment| payment.order_id == order_id)
            .collect();
        payments.sort_by(|a, b| a.id.cmp(&b.id));
        payments
    }

    /// Read-only projection: active orders, oldest first
    pub fn active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .data
            .values()
            .filter(|order| order.status.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }

    // ========== Optimistic mutation ==========

    /// Set an order's status locally, returning a rollback guard
    ///
    /// Returns `None` for an unknown id; the caller rejects the move
    /// without touching anything.
    pub fn apply_status(
        &mut self,
        id: &str,
        status: OrderStatus,
    ) -> Option<OptimisticGuard<String, Order>> {
        optimistic::apply_update(&mut self.orders.data, &id.to_string(), |order| {
            order.status = status;
        })
    }

    /// Remove an order locally, returning a rollback guard
    pub fn apply_remove(&mut self, id: &str) -> Option<OptimisticGuard<String, Order>> {
        optimistic::apply_remove(&mut self.orders.data, &id.to_string())
    }

    /// Revert a guard produced by an `apply_*` call
    pub fn revert(&mut self, guard: OptimisticGuard<String, Order>) {
        guard.revert(&mut self.orders.data);
    }

    // ========== Reconciliation ==========

    /// Apply one change-feed event
    ///
    /// Always idempotent overwrite by id. Unknown-id UPDATEs are cache
    /// misses, not errors: the record in the event is inserted. Records
    /// scoped to another restaurant are ignored outright.
    pub fn reconcile(&mut self, event: &ChangeEvent) -> ReconcileChange {
        match event.table {
            RecordTable::Orders => self.reconcile_order(event),
            RecordTable::OrderItems => self.reconcile_item(event),
            RecordTable::Payments => self.reconcile_payment(event),
        }
    }

    fn reconcile_order(&mut self, event: &ChangeEvent) -> ReconcileChange {
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(incoming) = event.new_as::<Order>() else {
                    tracing::warn!(kind = ?event.kind, "Order event without parsable new record");
                    return ReconcileChange::None;
                };
                if incoming.restaurant_id != self.restaurant_id {
                    tracing::warn!(
                        order = %incoming.id,
                        scope = %incoming.restaurant_id,
                        "Ignoring order event outside restaurant scope"
                    );
                    return ReconcileChange::None;
                }
                // Overwrite wholesale; a duplicate delivery degrades to
                // old == new and downstream deltas cancel out
                match self.orders.data.insert(incoming.id.clone(), incoming.clone()) {
                    Some(old) => ReconcileChange::OrderUpdated { old, new: incoming },
                    None => ReconcileChange::OrderInserted(incoming),
                }
            }
            ChangeKind::Delete => {
                let Some(gone) = event.old_as::<Order>() else {
                    tracing::warn!("Order delete without parsable old record");
                    return ReconcileChange::None;
                };
                match self.orders.data.remove(&gone.id) {
                    Some(old) => {
                        self.items.retain(|_, item| item.order_id != gone.id);
                        self.payments.retain(|_, payment| payment.order_id != gone.id);
                        ReconcileChange::OrderRemoved(old)
                    }
                    // Duplicate delete or never-seeded order
                    None => ReconcileChange::None,
                }
            }
        }
    }

    fn reconcile_item(&mut self, event: &ChangeEvent) -> ReconcileChange {
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(incoming) = event.new_as::<OrderItem>() else {
                    tracing::warn!(kind = ?event.kind, "Item event without parsable new record");
                    return ReconcileChange::None;
                };
                let order_known = self.orders.data.contains_key(&incoming.order_id);
                let order_id = incoming.order_id.clone();
                self.items.insert(incoming.id.clone(), incoming);
                if order_known {
                    ReconcileChange::DetailChanged
                } else {
                    ReconcileChange::DetailForUnknownOrder(order_id)
                }
            }
            ChangeKind::Delete => match event.old_as::<OrderItem>() {
                Some(gone) => match self.items.remove(&gone.id) {
                    Some(_) => ReconcileChange::DetailChanged,
                    None => ReconcileChange::None,
                },
                None => ReconcileChange::None,
            },
        }
    }

    fn reconcile_payment(&mut self, event: &ChangeEvent) -> ReconcileChange {
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(incoming) = event.new_as::<Payment>() else {
                    tracing::warn!(kind = ?event.kind, "Payment event without parsable new record");
                    return ReconcileChange::None;
                };
                let order_known = self.orders.data.contains_key(&incoming.order_id);
                let order_id = incoming.order_id.clone();
                self.payments.insert(incoming.id.clone(), incoming);
                if order_known {
                    ReconcileChange::DetailChanged
                } else {
                    ReconcileChange::DetailForUnknownOrder(order_id)
                }
            }
            ChangeKind::Delete => match event.old_as::<Payment>() {
                Some(gone) => match self.payments.remove(&gone.id) {
                    Some(_) => ReconcileChange::DetailChanged,
                    None => ReconcileChange::None,
                },
                None => ReconcileChange::None,
            },
        }
    }

    /// Insert an order fetched to fill a cache miss
    ///
    /// Same overwrite rule as events; scoped like everything else.
    pub fn insert_fetched(&mut self, order: Order) -> ReconcileChange {
        if order.restaurant_id != self.restaurant_id {
            return ReconcileChange::None;
        }
        match self.orders.data.insert(order.id.clone(), order.clone()) {
            Some(old) => ReconcileChange::OrderUpdated { old, new: order },
            None => ReconcileChange::OrderInserted(order),
        }
    }
}
