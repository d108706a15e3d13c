//! Payment ledger records and query helpers.
//!
//! A payment is an append-only record of money disbursed to a worker or
//! partner. Records are never mutated after creation; corrections are made
//! by deleting and re-adding. Balances ("amount remaining for X") are folded
//! by the calling layer from the records this crate describes.

use crate::ids::PaymentId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Who a payment went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    Worker,
    Partner,
}

/// How much of the recipient's share a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Full,
    Partial,
    None,
}

/// A persisted payment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    #[serde(rename = "type")]
    pub recipient: RecipientKind,
    pub recipient_name: String,
    /// Amount disbursed. Non-negative.
    pub amount: f64,
    pub payment_type: PaymentType,
    /// The date the payment was made, as entered by the caller.
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// A payment as submitted by the caller, before the store assigns a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(rename = "type")]
    pub recipient: RecipientKind,
    pub recipient_name: String,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub date: DateTime<Utc>,
    pub created_by: String,
}

impl NewPayment {
    /// Creates a payment draft dated now.
    #[must_use]
    pub fn new(
        recipient: RecipientKind,
        recipient_name: impl Into<String>,
        amount: f64,
        payment_type: PaymentType,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            recipient_name: recipient_name.into(),
            amount,
            payment_type,
            date: Utc::now(),
            created_by: created_by.into(),
        }
    }

    /// Sets the payment date.
    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Finalizes the draft into a persisted record with its store key.
    #[must_use]
    pub fn into_payment(self, id: PaymentId, created_at: DateTime<Utc>) -> Payment {
        Payment {
            id,
            recipient: self.recipient,
            recipient_name: self.recipient_name,
            amount: self.amount,
            payment_type: self.payment_type,
            date: self.date,
            created_at,
            created_by: self.created_by,
        }
    }
}

/// Time window for payment queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Payments dated on the same calendar day as `now`.
    Today,
    /// Payments dated within the last 7 days.
    Week,
    /// Payments dated within the last 30 days.
    Month,
    /// Payments dated within the last `n` days.
    LastDays(u32),
    /// Every payment.
    All,
}

/// All payments recorded for one worker or partner, by exact name.
#[must_use]
pub fn payments_for_recipient(
    payments: &[Payment],
    kind: RecipientKind,
    name: &str,
) -> Vec<Payment> {
    payments
        .iter()
        .filter(|p| p.recipient == kind && p.recipient_name == name)
        .cloned()
        .collect()
}

/// Payments whose date falls inside `window`, measured against `now`.
#[must_use]
pub fn payments_in_window(
    payments: &[Payment],
    window: TimeWindow,
    now: DateTime<Utc>,
) -> Vec<Payment> {
    let cutoff = match window {
        TimeWindow::All => {
            return payments.to_vec();
        }
        TimeWindow::Today => {
            let today = now.date_naive();
            return payments
                .iter()
                .filter(|p| p.date.date_naive() == today)
                .cloned()
                .collect();
        }
        TimeWindow::Week => now - Duration::days(7),
        TimeWindow::Month => now - Duration::days(30),
        TimeWindow::LastDays(days) => now - Duration::days(i64::from(days)),
    };

    payments
        .iter()
        .filter(|p| p.date >= cutoff)
        .cloned()
        .collect()
}
