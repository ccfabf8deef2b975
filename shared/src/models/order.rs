//! Order Model
//!
//! Orders are owned by the persistence layer; clients hold cached,
//! possibly stale copies keyed by id. The kitchen-board transition
//! table lives here so every component validates a proposed move
//! against the same adjacency map before touching state or network.

use serde::{Deserialize, Serialize};

/// Order status
///
/// `Pending → Preparing → Ready → Served` is the kitchen flow.
/// `Completed` and `Cancelled` are absorbing terminal states, reachable
/// from any active status only through an explicit till action, never
/// through a board move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    /// Removed from the kitchen board; still active for billing
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether the order counts towards the live board totals
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether the order is shown as a kitchen-board column
    pub fn is_on_board(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    /// Legal direct board moves from this status
    ///
    /// Single source of truth for the adjacency map: the UI renders
    /// drop targets from this slice and `validate_transition` checks
    /// membership in it.
    pub fn board_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Preparing],
            OrderStatus::Preparing => &[OrderStatus::Pending, OrderStatus::Ready],
            OrderStatus::Ready => &[OrderStatus::Preparing, OrderStatus::Served],
            OrderStatus::Served | OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Ready => write!(f, "READY"),
            OrderStatus::Served => write!(f, "SERVED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Validate a proposed kitchen-board move
///
/// Pure adjacency check. Total over every status pair, never panics;
/// anything not in the table is rejected and callers issue no
/// persistence call for a rejected move.
pub fn validate_transition(current: OrderStatus, proposed: OrderStatus) -> bool {
    current.board_targets().contains(&proposed)
}

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Order entity (client-side copy of the authoritative row)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    /// Restaurant scope; events outside this scope must never be applied
    pub restaurant_id: String,
    pub table_name: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    /// Total amount in currency unit
    pub total: f64,
    /// ISO 4217 code (e.g. "EUR")
    pub currency: String,
    /// Human-readable order number
    pub order_number: String,
    pub notes: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub updated_at: i64,
}

/// Order item
///
/// Belongs to exactly one order. Immutable once created except through
/// explicit update events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Menu item reference (String ID)
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    /// Price in currency unit
    pub unit_price: f64,
    /// Ordered modifier selection (e.g. "no onions")
    pub modifiers: Vec<String>,
    pub notes: Option<String>,
}

/// Order payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    /// Amount in currency unit
    pub amount: f64,
    /// ISO 4217 code
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    /// External payment-processor reference
    pub provider_ref: Option<String>,
}
