//! Incremental counter aggregator
//!
//! Live per-status counts of active orders, seeded from one
//! authoritative snapshot and kept current by event deltas. The deltas
//! are a performance optimization over re-scanning the order set, not
//! a replacement for it: `refresh()` reseeds from a full fetch and is
//! the designated drift correction.
//!
//! Every decrement clamps at zero. An out-of-order or duplicate
//! delivery must never underflow a bucket; the engine feeds this
//! aggregator from cache-derived old/new pairs, which keeps the active
//! sum invariant exact even under replays.

use serde::Serialize;
use shared::models::order::{Order, OrderStatus};

/// Per-status counts of active orders plus terminal tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u32,
    pub preparing: u32,
    pub ready: u32,
    pub served: u32,
    /// Orders that left the active set through completion
    pub completed: u32,
    /// Orders that left the active set through cancellation
    pub cancelled: u32,
    /// All active orders (pending + preparing + ready + served)
    pub active_total: u32,
}

impl StatusCounts {
    /// Seed from an authoritative snapshot of active orders
    pub fn seed(orders: &[Order]) -> Self {
        let mut counts = Self::default();
        for order in orders {
            counts.apply_insert(order.status);
        }
        counts
    }

    /// Count for one status bucket
    pub fn bucket(&self, status: OrderStatus) -> u32 {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Preparing => self.preparing,
            OrderStatus::Ready => self.ready,
            OrderStatus::Served => self.served,
            OrderStatus::Completed => self.completed,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    /// Sum of the active buckets; equals `active_total` after every
    /// event application
    pub fn active_sum(&self) -> u32 {
        self.pending + self.preparing + self.ready + self.served
    }

    fn increment(&mut self, status: OrderStatus) {
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Preparing => self.preparing += 1,
            OrderStatus::Ready => self.ready += 1,
            OrderStatus::Served => self.served += 1,
            OrderStatus::Completed => self.completed += 1,
            OrderStatus::Cancelled => self.cancelled += 1,
        }
        if status.is_active() {
            self.active_total += 1;
        }
    }

    fn decrement(&mut self, status: OrderStatus) {
        let bucket = match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Preparing => &mut self.preparing,
            OrderStatus::Ready => &mut self.ready,
            OrderStatus::Served => &mut self.served,
            OrderStatus::Completed => &mut self.completed,
            OrderStatus::Cancelled => &mut self.cancelled,
        };
        // Clamp: a bucket already at zero stays there, and the active
        // total is only debited when the bucket actually held the order
        let had = *bucket > 0;
        *bucket = bucket.saturating_sub(1);
        if had && status.is_active() {
            self.active_total = self.active_total.saturating_sub(1);
        }
    }

    /// An order appeared
    pub fn apply_insert(&mut self, status: OrderStatus) {
        self.increment(status);
    }

    /// An order moved from `old` to `new`
    ///
    /// Active-to-terminal debits the active total and credits the
    /// terminal tally without touching any board bucket beyond the old
    /// one. A same-status update is a no-op.
    pub fn apply_update(&mut self, old: OrderStatus, new: OrderStatus) {
        if old == new {
            return;
        }
        self.decrement(old);
        self.increment(new);
    }

    /// An order row was deleted; `last` is its last known status
    pub fn apply_delete(&mut self, last: OrderStatus) {
        self.decrement(last);
    }
}
