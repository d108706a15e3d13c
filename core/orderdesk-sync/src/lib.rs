//! Synchronization core for Orderdesk.
//!
//! Keeps service orders and worker/partner payments in a hosted real-time
//! key-value tree under unreliable connectivity: optimistic local caches,
//! deadline-guarded remote calls, bounded retry with linear backoff, and a
//! live order watch reconciled into local state.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Remote**: the [`RemoteStore`] trait over the hosted tree, with an
//!   HTTP implementation for production and an in-memory store for tests
//! - **Retry**: deadline and bounded-retry wrappers every remote call is
//!   composed from
//! - **Snapshot**: file-backed last-known-good copies of both collections,
//!   served when a refresh fails entirely
//! - **Status**: process-wide online/syncing indicators observed by the UI
//! - **Coordinator**: the orchestration core owning the caches and the watch
//!
//! ## Write path
//!
//! 1. **Fail fast**: order writes check the online flag before touching the
//!    store
//! 2. **Validate**: required fields are checked before any remote call
//! 3. **Retry**: each attempt is raced against its deadline; failures back
//!    off linearly up to the attempt budget
//! 4. **Reconcile**: updates and deletes splice the local cache directly;
//!    adds wait for the watch to deliver the canonical record
//!
//! # Example
//!
//! ```no_run
//! use orderdesk_sync::{MemoryStore, SnapshotStore, SyncCoordinator};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::new());
//! let snapshots = SnapshotStore::new("/var/lib/orderdesk");
//! let coordinator = SyncCoordinator::new(store, snapshots);
//! coordinator.start().await;
//! # }
//! ```

mod coordinator;
mod error;
pub mod remote;
mod retry;
mod snapshot;
mod status;

pub use coordinator::{OrdersCallback, SyncConfig, SyncCoordinator, WatchHandle};
pub use error::{Operation, SyncError, SyncResult};
pub use remote::{HttpRemoteStore, HttpStoreConfig, MemoryStore, OrdersWatch, RemoteStore};
pub use retry::{deadline, with_retry, RetryPolicy, OP_DEADLINE, RECORD_DEADLINE};
pub use snapshot::SnapshotStore;
pub use status::{SyncGuard, SyncStatus};
