//! Hosted real-time tree client.
//!
//! Speaks the REST dialect of the hosted key-value database: every node is
//! addressable as `{base}/{path}.json`, collections are keyed JSON objects,
//! and a `null` body means an absent node. The live watch is a polling loop
//! that re-reads the collection and forwards a snapshot whenever it changes.

use crate::error::{SyncError, SyncResult};
use crate::remote::store::{OrdersWatch, RemoteStore, WATCH_BUFFER};
use async_trait::async_trait;
use chrono::Utc;
use orderdesk_types::{Order, OrderId, Payment, PaymentId};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the hosted tree client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpStoreConfig {
    /// Database base URL, e.g. `https://orders.example-db.app`.
    pub base_url: String,
    /// Optional auth token appended to every request.
    pub auth_token: Option<String>,
    /// How often the order watch re-reads the collection (in seconds).
    pub poll_interval_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: None,
            poll_interval_secs: 2,
        }
    }
}

impl HttpStoreConfig {
    /// Creates a configuration for the given database URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Default::default()
        }
    }

    /// Sets the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the watch poll interval.
    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }
}

/// Strips trailing slashes so path joining stays predictable.
fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Hosted tree client.
#[derive(Clone)]
pub struct HttpRemoteStore {
    config: HttpStoreConfig,
    client: Client,
}

impl HttpRemoteStore {
    /// Creates a new client for the configured database.
    #[must_use]
    pub fn new(config: HttpStoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    fn node_url(&self, path: &str) -> String {
        let mut url = format!("{}/{}.json", self.config.base_url, path);
        if let Some(token) = &self.config.auth_token {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }

    async fn get_node(&self, path: &str) -> SyncResult<Value> {
        let response = self
            .client
            .get(self.node_url(path))
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("read {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!(
                "read {path} failed (HTTP {}): {body}",
                status.as_u16()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SyncError::Remote(format!("parse {path} failed: {e}")))
    }

    async fn put_node<T: Serialize + Sync>(&self, path: &str, value: &T) -> SyncResult<()> {
        let response = self
            .client
            .put(self.node_url(path))
            .json(value)
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("write {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!(
                "write {path} failed (HTTP {}): {body}",
                status.as_u16()
            )));
        }

        Ok(())
    }

    async fn delete_node(&self, path: &str) -> SyncResult<()> {
        let response = self
            .client
            .delete(self.node_url(path))
            .send()
            .await
            .map_err(|e| SyncError::Remote(format!("delete {path} failed: {e}")))?;

        let status = response.status();
        // A missing node deletes to the same end state.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!(
                "delete {path} failed (HTTP {}): {body}",
                status.as_u16()
            )));
        }

        debug!(path, "node deleted");
        Ok(())
    }

    /// Decodes a keyed collection object into records, attaching each key as
    /// the record id. A malformed record is skipped with a warning rather
    /// than poisoning the whole snapshot.
    fn collection_to_vec<T: DeserializeOwned>(node: Value) -> Vec<T> {
        let Value::Object(map) = node else {
            // `null` means the collection does not exist yet.
            return Vec::new();
        };

        let mut records = Vec::with_capacity(map.len());
        for (key, mut entry) in map {
            if let Value::Object(fields) = &mut entry {
                fields
                    .entry("id")
                    .or_insert_with(|| Value::String(key.clone()));
            }
            match serde_json::from_value::<T>(entry) {
                Ok(record) => records.push(record),
                Err(error) => warn!(key, %error, "skipping malformed record"),
            }
        }
        records
    }

    fn record_from_node<T: DeserializeOwned>(id: &str, node: Value) -> SyncResult<Option<T>> {
        if node.is_null() {
            return Ok(None);
        }
        let mut node = node;
        if let Value::Object(fields) = &mut node {
            fields
                .entry("id")
                .or_insert_with(|| Value::String(id.to_string()));
        }
        Ok(Some(serde_json::from_value(node)?))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn provider_name(&self) -> &'static str {
        "hosted-tree"
    }

    fn next_order_id(&self) -> OrderId {
        OrderId::generate()
    }

    fn next_payment_id(&self) -> PaymentId {
        PaymentId::generate()
    }

    async fn fetch_order(&self, id: &OrderId) -> SyncResult<Option<Order>> {
        let path = format!("orders/{id}");
        let node = self.get_node(&path).await?;
        Self::record_from_node(id.as_str(), node)
    }

    async fn put_order(&self, order: &Order) -> SyncResult<()> {
        self.put_node(&format!("orders/{}", order.id), order).await
    }

    async fn remove_order(&self, id: &OrderId) -> SyncResult<()> {
        self.delete_node(&format!("orders/{id}")).await
    }

    async fn list_orders(&self) -> SyncResult<Vec<Order>> {
        let node = self.get_node("orders").await?;
        Ok(Self::collection_to_vec(node))
    }

    async fn watch_orders(&self) -> SyncResult<OrdersWatch> {
        // Establishment requires one successful read; a dead database fails
        // here instead of behind the channel.
        let initial = self.get_node("orders").await?;
        let mut last_serialized = initial.to_string();

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        // The receiver is brand new; the buffer cannot be full.
        let _ = tx.try_send(Self::collection_to_vec::<Order>(initial));

        let store = self.clone();
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match store.get_node("orders").await {
                    Ok(node) => {
                        let serialized = node.to_string();
                        if serialized == last_serialized {
                            continue;
                        }
                        last_serialized = serialized;
                        let orders = Self::collection_to_vec::<Order>(node);
                        if tx.send(orders).await.is_err() {
                            debug!("order watch receiver dropped; stopping poll loop");
                            return;
                        }
                    }
                    Err(error) => warn!(%error, "order watch poll failed"),
                }
            }
        });

        info!("order watch established");
        Ok(rx)
    }

    async fn put_payment(&self, payment: &Payment) -> SyncResult<()> {
        self.put_node(&format!("payments/{}", payment.id), payment)
            .await
    }

    async fn list_payments(&self) -> SyncResult<Vec<Payment>> {
        let node = self.get_node("payments").await?;
        Ok(Self::collection_to_vec(node))
    }

    async fn remove_payment(&self, id: &PaymentId) -> SyncResult<()> {
        self.delete_node(&format!("payments/{id}")).await
    }

    async fn clear_payments(&self) -> SyncResult<()> {
        self.delete_node("payments").await
    }

    async fn record_presence(&self, online: bool) -> SyncResult<()> {
        let marker = serde_json::json!({
            "online": online,
            "at": Utc::now().to_rfc3339(),
        });
        self.put_node("status/connection", &marker).await
    }
}
