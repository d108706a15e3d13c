//! Remote store abstraction.
//!
//! Defines the operation set the sync coordinator composes: keyed reads and
//! writes, store-side key generation, collection fetches and a live watch
//! on the order collection. Implementations must not retry internally; the
//! coordinator owns the retry and deadline policy.

use crate::error::SyncResult;
use async_trait::async_trait;
use orderdesk_types::{Order, OrderId, Payment, PaymentId};
use tokio::sync::mpsc;

/// Buffer size for watch snapshot channels.
pub(crate) const WATCH_BUFFER: usize = 16;

/// Receiver half of a live order watch. Every message is the full, unsorted
/// collection snapshot at some point in time. Dropping the receiver cancels
/// the watch.
pub type OrdersWatch = mpsc::Receiver<Vec<Order>>;

/// Operation set over the hosted key-value tree backing persistence.
///
/// The tree layout is `orders/{id}` and `payments/{id}`, plus a connectivity
/// marker path that carries no data the core reads back.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of the store backend.
    fn provider_name(&self) -> &'static str;

    /// Generates a key for a new order record.
    fn next_order_id(&self) -> OrderId;

    /// Generates a key for a new payment record.
    fn next_payment_id(&self) -> PaymentId;

    /// Reads `orders/{id}`. A missing record is `None`, not an error.
    async fn fetch_order(&self, id: &OrderId) -> SyncResult<Option<Order>>;

    /// Writes the full record at `orders/{id}`, replacing any existing one.
    async fn put_order(&self, order: &Order) -> SyncResult<()>;

    /// Removes `orders/{id}`. Removing a missing record succeeds.
    async fn remove_order(&self, id: &OrderId) -> SyncResult<()>;

    /// Fetches the whole order collection.
    async fn list_orders(&self) -> SyncResult<Vec<Order>>;

    /// Opens a live watch on the order collection. An initial snapshot is
    /// delivered promptly after establishment; every subsequent change
    /// delivers the full collection again.
    async fn watch_orders(&self) -> SyncResult<OrdersWatch>;

    /// Writes the full record at `payments/{id}`.
    async fn put_payment(&self, payment: &Payment) -> SyncResult<()>;

    /// Fetches the whole payment collection.
    async fn list_payments(&self) -> SyncResult<Vec<Payment>>;

    /// Removes `payments/{id}`. Removing a missing record succeeds.
    async fn remove_payment(&self, id: &PaymentId) -> SyncResult<()>;

    /// Removes the entire payment collection.
    async fn clear_payments(&self) -> SyncResult<()>;

    /// Writes the connectivity marker. Used only to log connection state;
    /// failures are never fatal to the caller.
    async fn record_presence(&self, online: bool) -> SyncResult<()>;
}
