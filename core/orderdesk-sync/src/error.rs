//! Error types for the sync core.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// The high-level operation a terminal error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddOrder,
    UpdateOrder,
    DeleteOrder,
    WatchOrders,
    AddPayment,
    FetchPayments,
    DeletePayment,
    ClearPayments,
}

impl Operation {
    /// Stable name used in error messages and log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddOrder => "add_order",
            Operation::UpdateOrder => "update_order",
            Operation::DeleteOrder => "delete_order",
            Operation::WatchOrders => "watch_orders",
            Operation::AddPayment => "add_payment",
            Operation::FetchPayments => "fetch_payments",
            Operation::DeletePayment => "delete_payment",
            Operation::ClearPayments => "clear_payments",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A required field is missing or empty. Caller bug; never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No connectivity. Order writes fail fast without touching the store.
    #[error("offline")]
    Offline,

    /// A single attempt's deadline elapsed. The remote request is not
    /// cancelled; only the wait stops.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The remote store rejected or failed the operation.
    #[error("remote store error: {0}")]
    Remote(String),

    /// The update target does not exist.
    #[error("order not found: {0}")]
    NotFound(String),

    /// Local snapshot storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// All attempts for an operation were consumed; wraps the last error.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        operation: Operation,
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Tags `source` as the terminal failure of `operation`.
    #[must_use]
    pub fn exhausted(operation: Operation, attempts: u32, source: SyncError) -> Self {
        SyncError::Exhausted {
            operation,
            attempts,
            source: Box::new(source),
        }
    }
}
