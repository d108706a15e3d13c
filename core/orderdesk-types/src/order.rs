//! Order records.
//!
//! An order is a unit of work for a customer. The typed fields below are the
//! ones the sync core reads or validates; everything a service type carries
//! beyond them (promotion amounts and commission, design lists, photography
//! and printing details) rides along in the flattened field map and is
//! persisted verbatim.

use crate::ids::OrderId;
use crate::payment::PaymentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of service an order is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Promotion,
    Design,
    Photography,
    Printing,
    Other,
}

/// Order priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// How the discount field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// A flat amount off the price.
    Fixed,
    /// A percentage of the price.
    Percentage,
}

/// A worker assigned to an order. Workers are owned exclusively by their
/// order and are replaced atomically with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub name: String,
    /// The worker's share of the order, in currency units.
    pub share: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<f64>,
}

impl Worker {
    /// Creates a worker assignment with the given share.
    #[must_use]
    pub fn new(name: impl Into<String>, share: f64) -> Self {
        Self {
            name: name.into(),
            share,
            work_type: None,
            payment_status: None,
            amount_paid: None,
        }
    }
}

/// A persisted order record.
///
/// `created_at` is immutable once set; `updated_at` is refreshed on every
/// write. Records are replaced wholesale on update, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    #[serde(default)]
    pub order_details: String,
    /// Base price before discount and tax. Non-negative.
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: OrderStatus,
    pub service_type: ServiceType,
    /// The date the order applies to, as entered by the caller.
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountType>,
    /// Tax percentage applied by the calling layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<Worker>,
    /// Service-specific fields, opaque to the sync core.
    #[serde(flatten)]
    pub service_fields: Map<String, Value>,
}

fn default_quantity() -> u32 {
    1
}

/// An order as submitted by the caller, before the store assigns a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    #[serde(default)]
    pub order_details: String,
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: OrderStatus,
    pub service_type: ServiceType,
    pub date: DateTime<Utc>,
    /// Creation timestamp; defaulted to now when the order is added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<Worker>,
    #[serde(flatten)]
    pub service_fields: Map<String, Value>,
}

impl NewOrder {
    /// Creates a draft order with defaults for everything but the customer
    /// and service type.
    #[must_use]
    pub fn new(customer_name: impl Into<String>, service_type: ServiceType) -> Self {
        Self {
            customer_name: customer_name.into(),
            order_details: String::new(),
            price: 0.0,
            quantity: 1,
            priority: Priority::default(),
            status: OrderStatus::default(),
            service_type,
            date: Utc::now(),
            created_at: None,
            discount: None,
            discount_type: None,
            tax: None,
            notes: None,
            workers: Vec::new(),
            service_fields: Map::new(),
        }
    }

    /// Sets the base price.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Sets the free-text details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.order_details = details.into();
        self
    }

    /// Sets the worker assignments.
    #[must_use]
    pub fn with_workers(mut self, workers: Vec<Worker>) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the creation timestamp instead of defaulting it at add time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Attaches an opaque service-specific field.
    #[must_use]
    pub fn with_service_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.service_fields.insert(key.into(), value);
        self
    }

    /// Finalizes the draft into a persisted record with its store key.
    #[must_use]
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            customer_name: self.customer_name,
            order_details: self.order_details,
            price: self.price,
            quantity: self.quantity,
            priority: self.priority,
            status: self.status,
            service_type: self.service_type,
            date: self.date,
            created_at,
            updated_at: None,
            discount: self.discount,
            discount_type: self.discount_type,
            tax: self.tax,
            notes: self.notes,
            workers: self.workers,
            service_fields: self.service_fields,
        }
    }
}
