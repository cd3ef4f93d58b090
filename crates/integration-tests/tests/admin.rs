//! Integration tests for admin endpoints.
//!
//! These need a verified admin in `TEST_ADMIN_EMAIL`/`TEST_ADMIN_PASSWORD`
//! and a customer in `TEST_USER_EMAIL`/`TEST_USER_PASSWORD`.
//!
//! Run with: cargo test -p oxytoxin-integration-tests -- --ignored --test-threads=1

use oxytoxin_integration_tests::{admin_client, customer_client, json_body, url};
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running API server and TEST_USER_* credentials"]
async fn test_customer_is_forbidden() {
    let Some(client) = customer_client().await else {
        return;
    };

    let resp = client
        .get(url("/api/admin/orders"))
        .send()
        .await
        .expect("Failed to list orders");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server and TEST_ADMIN_* credentials"]
async fn test_product_lifecycle() {
    let Some(client) = admin_client().await else {
        return;
    };
    let name = format!("Integration Tee {}", Uuid::new_v4());

    let resp = client
        .post(url("/api/admin/products"))
        .json(&json!({
            "name": name,
            "price": 25,
            "description": "Heavyweight cotton",
            "category": "tees",
            "stock": 3,
            "mainImage": "https://cdn.example.com/tee.jpg"
        }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    let id = body["data"]["id"].clone();
    assert_eq!(body["data"]["inStock"], true);

    let resp = client
        .patch(url(&format!("/api/admin/products/{id}")))
        .json(&json!({ "stock": 0 }))
        .send()
        .await
        .expect("Failed to update product");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["inStock"], false);

    let resp = client
        .delete(url(&format!("/api/admin/products/{id}")))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(url(&format!("/api/admin/products/{id}")))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and TEST_ADMIN_* credentials"]
async fn test_invalid_order_transition() {
    let Some(client) = admin_client().await else {
        return;
    };

    let resp = client
        .get(url("/api/admin/orders"))
        .send()
        .await
        .expect("Failed to list orders");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;

    let Some(delivered) = body["data"]
        .as_array()
        .and_then(|orders| orders.iter().find(|o| o["status"] == "delivered"))
    else {
        return;
    };

    let resp = client
        .patch(url(&format!("/api/admin/orders/{}", delivered["id"])))
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .expect("Failed to update order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and TEST_ADMIN_* credentials"]
async fn test_admin_inbox() {
    let Some(client) = admin_client().await else {
        return;
    };

    let resp = client
        .get(url("/api/messages/admin/conversations?status=open"))
        .send()
        .await
        .expect("Failed to list conversations");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(url("/api/delivery/admin/all"))
        .send()
        .await
        .expect("Failed to list delivery info");
    assert_eq!(resp.status(), StatusCode::OK);
}
