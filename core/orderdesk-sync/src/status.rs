//! Process-wide connectivity and sync-activity indicators.
//!
//! `online` tracks the runtime network-availability signal; the coordinator
//! only records it. `syncing` is true while any remote operation is
//! outstanding, with a watchdog that clears a marker left behind by an
//! operation that neither resolved nor failed in time. The watchdog is a
//! UI-safety valve, not a cancellation of the underlying operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How long a sync marker may stay set before the watchdog clears it.
const SYNC_WATCHDOG: Duration = Duration::from_secs(60);

/// Shared online/syncing indicators observed by the UI layer.
#[derive(Debug)]
pub struct SyncStatus {
    online: AtomicBool,
    syncing: AtomicBool,
    generation: AtomicU64,
}

impl SyncStatus {
    /// Creates the indicators with the given initial connectivity.
    #[must_use]
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(online),
            syncing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    /// Whether the runtime last reported connectivity.
    #[must_use]
    pub fn online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Whether a remote operation is outstanding.
    #[must_use]
    pub fn syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Records the external connectivity signal. Returns the previous value.
    pub fn set_online(&self, online: bool) -> bool {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            info!(online, "connectivity changed");
        }
        was
    }

    /// Marks a sync operation as outstanding. The flag clears when the
    /// returned guard drops or when the watchdog elapses, whichever comes
    /// first; a newer operation keeps the flag alive past both.
    pub fn begin(self: &Arc<Self>) -> SyncGuard {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.syncing.store(true, Ordering::SeqCst);

        let status = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(SYNC_WATCHDOG).await;
            if status.clear_if_current(generation) {
                warn!("sync marker cleared by watchdog");
            }
        });

        SyncGuard {
            status: Arc::clone(self),
            generation,
        }
    }

    fn clear_if_current(&self, generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.syncing.swap(false, Ordering::SeqCst)
        } else {
            false
        }
    }
}

/// Clears the syncing flag when dropped, unless a newer operation started.
pub struct SyncGuard {
    status: Arc<SyncStatus>,
    generation: u64,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.status.clear_if_current(self.generation);
    }
}
