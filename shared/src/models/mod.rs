//! Domain models

pub mod order;

pub use order::{Order, OrderItem, OrderStatus, Payment, PaymentStatus};
