//! Bulk operations over a client-selected set of orders
//!
//! Never all-or-nothing: one order's failure must not abort the rest,
//! and the caller gets a per-item summary instead of a single boolean.

use serde::Serialize;
use shared::models::order::{Order, OrderStatus};

/// Action applied to every selected order
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Move every selected order to this status
    SetStatus(OrderStatus),
    /// Delete the selected orders
    Delete,
    /// Resolve the selected orders out of the cache for export
    Export,
}

/// One failed item with its reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Aggregate result of a bulk action
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
    /// Orders resolved by an `Export` action
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exported: Vec<Order>,
}

impl BulkOutcome {
    pub fn push_ok(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn push_failed(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(BulkFailure {
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// "N succeeded, M failed" for user messaging
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded.len(), self.failed.len())
    }
}
