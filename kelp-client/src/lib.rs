//! Kelp Client - real-time kitchen board sync engine
//!
//! Keeps kitchen/display clients consistent with the authoritative
//! order store: change-feed subscription with reconnect and presence,
//! optimistic local mutation with rollback, live per-status counters,
//! and partial-success bulk actions.

pub mod board;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod persist;

pub use board::{BoardEngine, BoardHandle, BulkAction, BulkOutcome, OrderCache, StatusCounts};
pub use config::BoardConfig;
pub use error::{ClientResult, EngineError, StoreError};
pub use feed::{
    ConnectionState, ConnectionStatus, ConnectionSupervisor, EventChannel, FeedConnector,
    FeedError, MemoryConnector, TcpConnector,
};
pub use http::HttpOrderStore;
pub use persist::{OrderFilters, OrderStore};

// Re-export shared types for convenience
pub use shared::feed::{ChangeEvent, ChangeKind, FeedMessage, RecordTable};
pub use shared::models::order::{
    validate_transition, Order, OrderItem, OrderStatus, Payment, PaymentStatus,
};
