//! Kitchen board core
//!
//! The optimistic local store, the incremental counter aggregator, the
//! bulk coordinator and the engine task that owns them. Everything
//! mutable lives inside the engine task; the rest of the process only
//! ever sees read-only projections.

pub mod bulk;
pub mod counts;
pub mod engine;
pub mod optimistic;
pub mod store;

pub use bulk::{BulkAction, BulkFailure, BulkOutcome};
pub use counts::StatusCounts;
pub use engine::{BoardEngine, BoardHandle};
pub use optimistic::OptimisticGuard;
pub use store::{CacheValue, OrderCache, ReconcileChange};
