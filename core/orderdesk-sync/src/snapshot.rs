//! File-backed fallback snapshots.
//!
//! Holds the last successfully fetched collections as two fixed-name JSON
//! files under a data directory. A snapshot is overwritten wholesale on
//! every successful fetch and read back only to seed state at startup or
//! when a refresh fails entirely. It is not a source of truth.

use crate::error::{SyncError, SyncResult};
use orderdesk_types::{Order, Payment};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const ORDERS_SNAPSHOT: &str = "orders.json";
const PAYMENTS_SNAPSHOT: &str = "payments.json";

/// Persisted last-known-good snapshots of the remote collections.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a snapshot store rooted at `dir`. The directory is created
    /// on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saves the order collection snapshot.
    pub async fn save_orders(&self, orders: &[Order]) -> SyncResult<()> {
        self.save(ORDERS_SNAPSHOT, orders).await
    }

    /// Loads the order collection snapshot, if one was ever saved.
    pub async fn load_orders(&self) -> SyncResult<Option<Vec<Order>>> {
        self.load(ORDERS_SNAPSHOT).await
    }

    /// Saves the payment collection snapshot.
    pub async fn save_payments(&self, payments: &[Payment]) -> SyncResult<()> {
        self.save(PAYMENTS_SNAPSHOT, payments).await
    }

    /// Loads the payment collection snapshot, if one was ever saved.
    pub async fn load_payments(&self) -> SyncResult<Option<Vec<Payment>>> {
        self.load(PAYMENTS_SNAPSHOT).await
    }

    async fn save<T: Serialize>(&self, name: &str, records: &[T]) -> SyncResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SyncError::Storage(format!("failed to create snapshot dir: {e}")))?;

        let json = serde_json::to_vec(records)?;
        fs::write(self.dir.join(name), json)
            .await
            .map_err(|e| SyncError::Storage(format!("failed to write {name}: {e}")))?;

        debug!(name, count = records.len(), "snapshot saved");
        Ok(())
    }

    async fn load<T: DeserializeOwned>(&self, name: &str) -> SyncResult<Option<Vec<T>>> {
        let path = self.dir.join(name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Storage(format!("failed to read {name}: {e}"))),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
