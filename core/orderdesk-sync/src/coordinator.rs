//! Sync coordinator.
//!
//! Owns the local order and payment caches, the connectivity indicators and
//! the live order watch, and exposes the operation surface the UI layer
//! calls. Every remote mutation is composed from the retry and deadline
//! wrappers around a [`RemoteStore`] call.
//!
//! There is no mutual exclusion across operations touching the same record:
//! two concurrent updates to one order race and the last write to reach the
//! store wins. Cache mutation happens only after the corresponding remote
//! call resolves, under the cache lock, so readers never observe torn state.

use crate::error::{Operation, SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::retry::{deadline, with_retry, RetryPolicy, OP_DEADLINE, RECORD_DEADLINE};
use crate::snapshot::SnapshotStore;
use crate::status::SyncStatus;
use chrono::Utc;
use orderdesk_types::{
    NewOrder, NewPayment, Order, OrderId, Payment, PaymentId, RecipientKind, TimeWindow,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback invoked with each sorted order snapshot.
pub type OrdersCallback = Arc<dyn Fn(Vec<Order>) + Send + Sync>;

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadline for single-record reads and writes.
    pub record_deadline: Duration,
    /// Deadline for compound operations.
    pub op_deadline: Duration,
    /// Retry policy for remote mutations and refreshes.
    pub retry: RetryPolicy,
    /// Base delay between watch-establishment attempts.
    pub watch_retry_delay: Duration,
    /// How long a watch may stay silent before one degraded empty delivery.
    pub idle_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            record_deadline: RECORD_DEADLINE,
            op_deadline: OP_DEADLINE,
            retry: RetryPolicy::default(),
            watch_retry_delay: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(15),
        }
    }
}

struct ActiveWatch {
    callback: OrdersCallback,
    task: Option<JoinHandle<()>>,
}

/// Handle to an active order watch. [`unsubscribe`](Self::unsubscribe)
/// cancels the remote watch and any pending idle timer. Dropping the handle
/// without calling it keeps the subscription alive until
/// [`SyncCoordinator::shutdown`].
pub struct WatchHandle {
    watch: Arc<RwLock<Option<ActiveWatch>>>,
}

impl WatchHandle {
    /// Cancels the watch.
    pub async fn unsubscribe(self) {
        if let Some(active) = self.watch.write().await.take() {
            if let Some(task) = active.task {
                task.abort();
            }
        }
    }
}

/// The orchestration core over the remote store.
///
/// Cheap to clone; clones share caches, status and the watch. Constructed
/// once at process start and torn down with [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn RemoteStore>,
    snapshots: SnapshotStore,
    config: SyncConfig,
    status: Arc<SyncStatus>,
    orders: Arc<RwLock<Vec<Order>>>,
    payments: Arc<RwLock<Vec<Payment>>>,
    watch: Arc<RwLock<Option<ActiveWatch>>>,
}

impl SyncCoordinator {
    /// Creates a coordinator over `store` with `snapshots` as the offline
    /// fallback, starting online.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, snapshots: SnapshotStore) -> Self {
        Self::with_config(store, snapshots, SyncConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn RemoteStore>,
        snapshots: SnapshotStore,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            snapshots,
            config,
            status: SyncStatus::new(true),
            orders: Arc::new(RwLock::new(Vec::new())),
            payments: Arc::new(RwLock::new(Vec::new())),
            watch: Arc::new(RwLock::new(None)),
        }
    }

    /// Seeds the in-memory caches from the snapshot store, so callers see
    /// last-known data before the first remote round-trip.
    pub async fn start(&self) {
        match self.snapshots.load_orders().await {
            Ok(Some(orders)) => {
                info!(count = orders.len(), "seeded orders from snapshot");
                *self.orders.write().await = orders;
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to load orders snapshot"),
        }
        match self.snapshots.load_payments().await {
            Ok(Some(payments)) => {
                info!(count = payments.len(), "seeded payments from snapshot");
                *self.payments.write().await = payments;
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to load payments snapshot"),
        }
    }

    /// Cancels the live watch, if any.
    pub async fn shutdown(&self) {
        if let Some(active) = self.watch.write().await.take() {
            if let Some(task) = active.task {
                task.abort();
            }
        }
    }

    /// Whether the runtime last reported connectivity.
    #[must_use]
    pub fn online(&self) -> bool {
        self.status.online()
    }

    /// Whether a remote operation is outstanding.
    #[must_use]
    pub fn syncing(&self) -> bool {
        self.status.syncing()
    }

    /// A read snapshot of the cached orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }

    /// A read snapshot of the cached payments.
    pub async fn payments(&self) -> Vec<Payment> {
        self.payments.read().await.clone()
    }

    // ── Orders ───────────────────────────────────────────────────

    /// Creates a new order and returns it with its store key and creation
    /// timestamp.
    ///
    /// The record is deliberately not spliced into the local cache: the live
    /// watch delivers the canonical update, which keeps a fast watch event
    /// from racing an optimistic insert into a duplicate entry.
    pub async fn add_order(&self, draft: NewOrder) -> SyncResult<Order> {
        if !self.status.online() {
            return Err(SyncError::Offline);
        }
        validate_customer_name(&draft.customer_name)?;

        let _guard = self.status.begin();
        let id = self.store.next_order_id();
        let created_at = draft.created_at.unwrap_or_else(Utc::now);
        let order = draft.into_order(id, created_at);

        let store = &self.store;
        let record = &order;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::AddOrder, || {
            deadline("put_order", op_deadline, store.put_order(record))
        })
        .await?;

        info!(id = %order.id, customer = %order.customer_name, "order created");
        Ok(order)
    }

    /// Replaces an existing order wholesale, keyed by its id.
    ///
    /// The target must already exist; updating an unknown id fails with
    /// [`SyncError::NotFound`] and creates nothing. On success the local
    /// cache is spliced immediately so the writer sees its own write without
    /// waiting for the watch.
    pub async fn update_order(&self, mut order: Order) -> SyncResult<()> {
        if !self.status.online() {
            return Err(SyncError::Offline);
        }
        if order.id.as_str().trim().is_empty() {
            return Err(SyncError::Validation("order id is required".into()));
        }
        validate_customer_name(&order.customer_name)?;

        let _guard = self.status.begin();

        let existing = deadline(
            "fetch_order",
            self.config.record_deadline,
            self.store.fetch_order(&order.id),
        )
        .await
        .map_err(|e| SyncError::exhausted(Operation::UpdateOrder, 1, e))?;
        if existing.is_none() {
            return Err(SyncError::NotFound(order.id.to_string()));
        }

        order.updated_at = Some(Utc::now());

        let store = &self.store;
        let record = &order;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::UpdateOrder, || {
            deadline("put_order", op_deadline, store.put_order(record))
        })
        .await?;

        let snapshot = {
            let mut cache = self.orders.write().await;
            if let Some(slot) = cache.iter_mut().find(|o| o.id == order.id) {
                *slot = order.clone();
            }
            cache.clone()
        };
        self.persist_orders(&snapshot).await;

        info!(id = %order.id, "order updated");
        Ok(())
    }

    /// Deletes an order. Deleting an id that does not exist succeeds.
    pub async fn delete_order(&self, id: &OrderId) -> SyncResult<()> {
        if !self.status.online() {
            return Err(SyncError::Offline);
        }

        let _guard = self.status.begin();

        let store = &self.store;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::DeleteOrder, || {
            deadline("remove_order", op_deadline, store.remove_order(id))
        })
        .await?;

        let snapshot = {
            let mut cache = self.orders.write().await;
            cache.retain(|o| &o.id != id);
            cache.clone()
        };
        self.persist_orders(&snapshot).await;

        info!(%id, "order deleted");
        Ok(())
    }

    /// Opens a live watch on the order collection, replacing any previous
    /// one. The callback receives every snapshot sorted by creation time
    /// descending.
    ///
    /// If the runtime is offline, the callback is served the cached list
    /// once and establishment is deferred to the next online transition.
    pub async fn subscribe_orders(
        &self,
        callback: impl Fn(Vec<Order>) + Send + Sync + 'static,
    ) -> WatchHandle {
        let callback: OrdersCallback = Arc::new(callback);

        let task = if self.status.online() {
            Some(self.spawn_watch(Arc::clone(&callback)))
        } else {
            debug!("offline at subscribe time; deferring watch establishment");
            callback(self.orders.read().await.clone());
            None
        };

        let mut watch = self.watch.write().await;
        if let Some(previous) = watch.take() {
            if let Some(task) = previous.task {
                task.abort();
            }
        }
        *watch = Some(ActiveWatch { callback, task });

        WatchHandle {
            watch: Arc::clone(&self.watch),
        }
    }

    fn spawn_watch(&self, callback: OrdersCallback) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run_watch(callback).await })
    }

    async fn run_watch(&self, callback: OrdersCallback) {
        let guard = self.status.begin();

        let mut rx = None;
        for attempt in 1..=self.config.retry.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.watch_retry_delay * (attempt - 1)).await;
            }
            match self.store.watch_orders().await {
                Ok(watch) => {
                    rx = Some(watch);
                    break;
                }
                Err(error) => warn!(attempt, %error, "failed to open order watch"),
            }
        }
        drop(guard);

        let Some(mut rx) = rx else {
            warn!("order watch could not be established; delivering empty list");
            callback(Vec::new());
            return;
        };

        let mut idle_fired = false;
        loop {
            match tokio::time::timeout(self.config.idle_timeout, rx.recv()).await {
                Ok(Some(snapshot)) => {
                    idle_fired = false;
                    let sorted = self.apply_orders_snapshot(snapshot).await;
                    callback(sorted);
                }
                Ok(None) => {
                    debug!("order watch stream ended");
                    return;
                }
                Err(_) => {
                    // Degraded/offline signal, delivered at most once per
                    // (re)establishment. The cache keeps its last data.
                    if !idle_fired {
                        idle_fired = true;
                        info!("order watch idle; delivering empty list");
                        callback(Vec::new());
                    }
                }
            }
        }
    }

    /// Replaces the cache wholesale with the sorted snapshot and persists
    /// it. Ordering is creation time descending; equal timestamps fall back
    /// to the id so deliveries are deterministic across store backends.
    async fn apply_orders_snapshot(&self, mut snapshot: Vec<Order>) -> Vec<Order> {
        snapshot.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        *self.orders.write().await = snapshot.clone();
        self.persist_orders(&snapshot).await;
        snapshot
    }

    async fn persist_orders(&self, orders: &[Order]) {
        if let Err(error) = self.snapshots.save_orders(orders).await {
            warn!(%error, "failed to persist orders snapshot");
        }
    }

    // ── Payments ─────────────────────────────────────────────────

    /// Records a payment and returns its store key. Payments are immutable
    /// once written; corrections are made by deleting and re-adding.
    pub async fn add_payment(&self, draft: NewPayment) -> SyncResult<PaymentId> {
        let _guard = self.status.begin();

        let id = self.store.next_payment_id();
        let payment = draft.into_payment(id.clone(), Utc::now());

        let store = &self.store;
        let record = &payment;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::AddPayment, || {
            deadline("put_payment", op_deadline, store.put_payment(record))
        })
        .await?;

        let snapshot = {
            let mut cache = self.payments.write().await;
            cache.push(payment.clone());
            cache.clone()
        };
        self.persist_payments(&snapshot).await;

        info!(%id, recipient = %payment.recipient_name, "payment recorded");
        Ok(id)
    }

    /// Fetches the full payment collection. A total failure falls back to
    /// the last snapshot; with no snapshot to serve, the failure surfaces.
    pub async fn get_all_payments(&self) -> SyncResult<Vec<Payment>> {
        let _guard = self.status.begin();

        match self.fetch_payments_remote().await {
            Ok(payments) => Ok(self.store_payments(payments).await),
            Err(error) => {
                warn!(%error, "payment fetch failed; trying snapshot fallback");
                match self.snapshots.load_payments().await {
                    Ok(Some(cached)) => {
                        info!(count = cached.len(), "serving payments from snapshot");
                        *self.payments.write().await = cached.clone();
                        Ok(cached)
                    }
                    Ok(None) | Err(_) => {
                        Err(SyncError::exhausted(Operation::FetchPayments, 1, error))
                    }
                }
            }
        }
    }

    /// Refreshes the payment collection with the full retry budget, seeding
    /// callers from the last snapshot while the fetch is in flight. Degrades
    /// to the cached list rather than failing.
    pub async fn refresh_payments(&self) -> SyncResult<Vec<Payment>> {
        let _guard = self.status.begin();

        // Stale data beats an empty screen while the refresh runs.
        if let Ok(Some(cached)) = self.snapshots.load_payments().await {
            let mut cache = self.payments.write().await;
            if cache.is_empty() {
                *cache = cached;
            }
        }

        let result = with_retry(&self.config.retry, Operation::FetchPayments, || {
            self.fetch_payments_remote()
        })
        .await;

        match result {
            Ok(payments) => Ok(self.store_payments(payments).await),
            Err(error) => {
                warn!(%error, "payment refresh failed; serving cached list");
                Ok(self.payments.read().await.clone())
            }
        }
    }

    /// Deletes a payment. Deleting an id that does not exist succeeds.
    pub async fn delete_payment(&self, id: &PaymentId) -> SyncResult<()> {
        let _guard = self.status.begin();

        let store = &self.store;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::DeletePayment, || {
            deadline("remove_payment", op_deadline, store.remove_payment(id))
        })
        .await?;

        let snapshot = {
            let mut cache = self.payments.write().await;
            cache.retain(|p| &p.id != id);
            cache.clone()
        };
        self.persist_payments(&snapshot).await;

        info!(%id, "payment deleted");
        Ok(())
    }

    /// Removes the entire payment collection.
    pub async fn delete_all_payments(&self) -> SyncResult<()> {
        let _guard = self.status.begin();

        let store = &self.store;
        let op_deadline = self.config.op_deadline;
        with_retry(&self.config.retry, Operation::ClearPayments, || {
            deadline("clear_payments", op_deadline, store.clear_payments())
        })
        .await?;

        self.payments.write().await.clear();
        self.persist_payments(&[]).await;

        info!("all payments deleted");
        Ok(())
    }

    /// All payments recorded for one worker or partner.
    pub async fn payments_for_recipient(
        &self,
        kind: RecipientKind,
        name: &str,
    ) -> SyncResult<Vec<Payment>> {
        let payments = self.get_all_payments().await?;
        Ok(orderdesk_types::payments_for_recipient(
            &payments, kind, name,
        ))
    }

    /// Payments whose date falls inside the given window.
    pub async fn payments_in_window(&self, window: TimeWindow) -> SyncResult<Vec<Payment>> {
        let payments = self.get_all_payments().await?;
        Ok(orderdesk_types::payments_in_window(
            &payments,
            window,
            Utc::now(),
        ))
    }

    async fn fetch_payments_remote(&self) -> SyncResult<Vec<Payment>> {
        deadline(
            "list_payments",
            self.config.op_deadline,
            self.store.list_payments(),
        )
        .await
    }

    async fn store_payments(&self, payments: Vec<Payment>) -> Vec<Payment> {
        *self.payments.write().await = payments.clone();
        self.persist_payments(&payments).await;
        payments
    }

    async fn persist_payments(&self, payments: &[Payment]) {
        if let Err(error) = self.snapshots.save_payments(payments).await {
            warn!(%error, "failed to persist payments snapshot");
        }
    }

    // ── Connectivity ─────────────────────────────────────────────

    /// Feeds the runtime connectivity signal. Transitioning back online
    /// re-establishes a registered watch and refreshes payments; the
    /// presence marker write is best-effort and never surfaces a failure.
    pub async fn set_online(&self, online: bool) {
        let was = self.status.set_online(online);
        if was == online || !online {
            return;
        }

        if let Err(error) = self.store.record_presence(true).await {
            debug!(%error, "presence marker write failed");
        }

        {
            let mut watch = self.watch.write().await;
            if let Some(active) = watch.as_mut() {
                if let Some(task) = active.task.take() {
                    task.abort();
                }
                info!("re-establishing order watch after reconnect");
                let callback = Arc::clone(&active.callback);
                active.task = Some(self.spawn_watch(callback));
            }
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(error) = this.refresh_payments().await {
                warn!(%error, "payment refresh after reconnect failed");
            }
        });
    }
}

fn validate_customer_name(name: &str) -> SyncResult<()> {
    if name.trim().is_empty() {
        return Err(SyncError::Validation("customer name is required".into()));
    }
    Ok(())
}
