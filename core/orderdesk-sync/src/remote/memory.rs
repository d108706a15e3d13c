//! In-memory remote store.
//!
//! Backs tests and local development. Failures can be scripted and every
//! trait call is counted, so retry budgets and offline fail-fast behavior
//! can be asserted exactly.

use crate::error::{SyncError, SyncResult};
use crate::remote::store::{OrdersWatch, RemoteStore, WATCH_BUFFER};
use async_trait::async_trait;
use orderdesk_types::{Order, OrderId, Payment, PaymentId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// An in-memory store with scriptable failures and call counters.
#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<BTreeMap<OrderId, Order>>,
    payments: Mutex<BTreeMap<PaymentId, Payment>>,
    watchers: Mutex<Vec<mpsc::Sender<Vec<Order>>>>,
    fail_remaining: AtomicU32,
    calls: AtomicU32,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` store calls fail with a remote error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Total store calls observed, watch establishment included.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of order records currently held.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Number of payment records currently held.
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    /// Seeds an order directly, bypassing failure injection and counters,
    /// and notifies watchers as a remote change would.
    pub fn insert_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
        self.notify_order_watchers();
    }

    /// Seeds a payment directly, bypassing failure injection and counters.
    pub fn insert_payment(&self, payment: Payment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.clone(), payment);
    }

    /// Removes an order directly and notifies watchers.
    pub fn remove_order_direct(&self, id: &OrderId) {
        self.orders.lock().unwrap().remove(id);
        self.notify_order_watchers();
    }

    fn check_failure(&self, what: &str) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::Remote(format!("injected failure: {what}")));
        }
        Ok(())
    }

    fn order_snapshot(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    fn notify_order_watchers(&self) {
        let snapshot = self.order_snapshot();
        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn next_order_id(&self) -> OrderId {
        OrderId::generate()
    }

    fn next_payment_id(&self) -> PaymentId {
        PaymentId::generate()
    }

    async fn fetch_order(&self, id: &OrderId) -> SyncResult<Option<Order>> {
        self.check_failure("fetch_order")?;
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn put_order(&self, order: &Order) -> SyncResult<()> {
        self.check_failure("put_order")?;
        self.orders
            .lock()
            .unwrap()
            .insert(order.id.clone(), order.clone());
        self.notify_order_watchers();
        Ok(())
    }

    async fn remove_order(&self, id: &OrderId) -> SyncResult<()> {
        self.check_failure("remove_order")?;
        // Removing a missing record is a no-op, same as the hosted tree.
        self.orders.lock().unwrap().remove(id);
        self.notify_order_watchers();
        Ok(())
    }

    async fn list_orders(&self) -> SyncResult<Vec<Order>> {
        self.check_failure("list_orders")?;
        Ok(self.order_snapshot())
    }

    async fn watch_orders(&self) -> SyncResult<OrdersWatch> {
        self.check_failure("watch_orders")?;
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let _ = tx.try_send(self.order_snapshot());
        self.watchers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn put_payment(&self, payment: &Payment) -> SyncResult<()> {
        self.check_failure("put_payment")?;
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn list_payments(&self) -> SyncResult<Vec<Payment>> {
        self.check_failure("list_payments")?;
        Ok(self.payments.lock().unwrap().values().cloned().collect())
    }

    async fn remove_payment(&self, id: &PaymentId) -> SyncResult<()> {
        self.check_failure("remove_payment")?;
        self.payments.lock().unwrap().remove(id);
        Ok(())
    }

    async fn clear_payments(&self) -> SyncResult<()> {
        self.check_failure("clear_payments")?;
        self.payments.lock().unwrap().clear();
        Ok(())
    }

    async fn record_presence(&self, _online: bool) -> SyncResult<()> {
        self.check_failure("record_presence")?;
        Ok(())
    }
}
