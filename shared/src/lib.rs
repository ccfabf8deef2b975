//! Shared types for the Kelp kitchen display system
//!
//! Common types used by the sync engine and the feed publisher:
//! domain models, kitchen-board status logic, the change-feed wire
//! protocol, and the API response envelope.

pub mod feed;
pub mod models;
pub mod response;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Feed re-exports (for convenient access)
pub use feed::{ChangeEvent, ChangeKind, FeedEventKind, FeedMessage, RecordTable};
pub use models::order::{Order, OrderItem, OrderStatus, Payment, PaymentStatus};
pub use response::ApiResponse;
