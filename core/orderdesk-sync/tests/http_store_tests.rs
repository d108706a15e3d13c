use chrono::Utc;
use orderdesk_sync::{HttpRemoteStore, HttpStoreConfig, RemoteStore, SyncError};
use orderdesk_types::{NewOrder, OrderId, ServiceType};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> HttpRemoteStore {
    HttpRemoteStore::new(HttpStoreConfig::new(server.uri()))
}

#[tokio::test]
async fn list_payments_attaches_ids_from_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pay-1": {
                "type": "worker",
                "recipientName": "Sara",
                "amount": 250.0,
                "paymentType": "full",
                "date": "2025-02-01T10:00:00Z",
                "createdAt": "2025-02-01T10:00:00Z",
                "createdBy": "admin"
            },
            "pay-2": {
                "type": "partner",
                "recipientName": "Huda",
                "amount": 500.0,
                "paymentType": "partial",
                "date": "2025-02-02T10:00:00Z",
                "createdAt": "2025-02-02T10:00:00Z",
                "createdBy": "admin"
            }
        })))
        .mount(&server)
        .await;

    let payments = store_for(&server).list_payments().await.unwrap();
    assert_eq!(payments.len(), 2);

    let mut ids: Vec<String> = payments
        .iter()
        .map(|p| p.id.as_str().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, ["pay-1", "pay-2"]);
}

#[tokio::test]
async fn null_collection_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .mount(&server)
        .await;

    let orders = store_for(&server).list_orders().await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn malformed_records_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ord-1": {
                "customerName": "Ali",
                "price": 1000.0,
                "serviceType": "other",
                "date": "2025-03-01T09:00:00Z",
                "createdAt": "2025-03-01T09:00:00Z"
            },
            "ord-2": { "customerName": 42 },
            "ord-3": "not even an object"
        })))
        .mount(&server)
        .await;

    let orders = store_for(&server).list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id.as_str(), "ord-1");
    assert_eq!(orders[0].customer_name, "Ali");
}

#[tokio::test]
async fn fetch_order_maps_null_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/ghost.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .mount(&server)
        .await;

    let fetched = store_for(&server)
        .fetch_order(&OrderId::new("ghost").unwrap())
        .await
        .unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn put_order_writes_the_record_node() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/orders/ord-9.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let order = NewOrder::new("Ali", ServiceType::Printing)
        .into_order(OrderId::new("ord-9").unwrap(), Utc::now());
    store_for(&server).put_order(&order).await.unwrap();
}

#[tokio::test]
async fn delete_of_missing_record_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/orders/ghost.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    store_for(&server)
        .remove_order(&OrderId::new("ghost").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn server_errors_surface_as_remote_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let error = store_for(&server).list_payments().await.unwrap_err();
    assert!(matches!(error, SyncError::Remote(_)));
}

#[tokio::test]
async fn auth_token_rides_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders.json"))
        .and(query_param("auth", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(
        HttpStoreConfig::new(server.uri()).with_auth_token("secret"),
    );
    store.list_orders().await.unwrap();
}
