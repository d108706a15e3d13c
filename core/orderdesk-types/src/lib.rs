//! Core type definitions for Orderdesk.
//!
//! This crate defines the domain types shared by the sync core and its
//! callers:
//! - Order and Payment identifiers (store-assigned keys, UUID v7 text when
//!   generated locally)
//! - Order records with worker assignments and opaque service-specific fields
//! - Payment ledger records
//! - Pure query helpers over payment collections
//!
//! Business arithmetic (discounts, worker shares, partner splits) is
//! intentionally absent: it belongs to the calling layer, not here.

mod ids;
mod order;
mod payment;

pub use ids::{OrderId, PaymentId};
pub use order::{DiscountType, NewOrder, Order, OrderStatus, Priority, ServiceType, Worker};
pub use payment::{
    payments_for_recipient, payments_in_window, NewPayment, Payment, PaymentType, RecipientKind,
    TimeWindow,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("identifier is empty")]
    EmptyId,
}
