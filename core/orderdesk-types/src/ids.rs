//! Identifier types for orders and payments.
//!
//! Record keys are assigned by the remote store when a record is created and
//! stay stable for the record's lifetime. Locally generated keys use UUID v7
//! text, which embeds a timestamp for natural ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique key of an order record in the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generates a new time-ordered key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing store key. Empty keys are rejected.
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(crate::Error::EmptyId);
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Unique key of a payment record in the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Generates a new time-ordered key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing store key. Empty keys are rejected.
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(crate::Error::EmptyId);
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
