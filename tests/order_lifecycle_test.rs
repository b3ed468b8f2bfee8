//! End-to-end tests for the order lifecycle over the HTTP API:
//! creation invariants, role-gated transitions, commission settlement,
//! and cancellation bookkeeping.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn decimal_field(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string"))
        .expect("parse decimal field")
}

/// Create an order as the app's default customer and return its JSON.
async fn create_order(app: &TestApp, order_type: &str, supplier_id: Option<Uuid>) -> Value {
    let mut payload = json!({
        "customer_id": app.customer.id,
        "order_type": order_type,
        "total_amount": "80.00",
        "payment_method": "CARD",
        "delivery_address": "12 Canal Street, Amsterdam",
    });
    if let Some(id) = supplier_id {
        payload["supplier_id"] = json!(id);
    }

    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 201, "order creation should succeed");
    response_json(response).await
}

fn order_id(body: &Value) -> String {
    body["data"]["id"].as_str().expect("order id").to_string()
}

#[tokio::test]
async fn supplier_order_requires_a_supplier() {
    let app = TestApp::new().await;

    let payload = json!({
        "customer_id": app.customer.id,
        "order_type": "SUPPLIER",
        "total_amount": "25.00",
        "payment_method": "CASH",
        "delivery_address": "1 Dam Square",
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn direct_order_rejects_a_supplier() {
    let app = TestApp::new().await;

    let payload = json!({
        "customer_id": app.customer.id,
        "order_type": "DIRECT",
        "supplier_id": app.supplier.id,
        "total_amount": "25.00",
        "payment_method": "CASH",
        "delivery_address": "1 Dam Square",
    });
    let response = app
        .request_as(&app.customer, Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn supplier_prepares_their_order() {
    let app = TestApp::new().await;
    let created = create_order(&app, "SUPPLIER", Some(app.supplier.id)).await;
    let id = order_id(&created);

    let response = app
        .request_as(
            &app.supplier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "PREPARING"})),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "PREPARING");
    assert!(!body["data"]["prepared_at"].is_null());
    assert!(body["data"]["delivered_at"].is_null());
}

#[tokio::test]
async fn direct_orders_skip_preparation() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    let response = app
        .request_as(
            &app.admin,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "PREPARING"})),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn courier_accepts_and_drives_the_order() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    let accept = app
        .request_as(
            &app.courier,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            None,
        )
        .await;
    assert_eq!(accept.status(), 200);
    let body = response_json(accept).await;
    assert_eq!(
        body["data"]["courier_id"],
        json!(app.courier.id.to_string())
    );

    let en_route = app
        .request_as(
            &app.courier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "EN_ROUTE"})),
        )
        .await;
    assert_eq!(en_route.status(), 200);
    let body = response_json(en_route).await;
    assert_eq!(body["data"]["status"], "EN_ROUTE");
    assert!(!body["data"]["en_route_at"].is_null());
}

#[tokio::test]
async fn accepting_twice_conflicts() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    let first = app
        .request_as(
            &app.courier,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            None,
        )
        .await;
    assert_eq!(first.status(), 200);

    let other_courier = app
        .seed_extra_user(deliber_api::entities::ActorRole::Courier, "second@test.dev")
        .await;
    let second = app
        .request_as(
            &other_courier,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            None,
        )
        .await;
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn en_route_requires_an_assigned_courier() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    let response = app
        .request_as(
            &app.courier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "EN_ROUTE"})),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn delivery_settles_commissions_for_supplier_orders() {
    let app = TestApp::new().await;
    let created = create_order(&app, "SUPPLIER", Some(app.supplier.id)).await;
    let id = order_id(&created);

    let prepare = app
        .request_as(
            &app.supplier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "PREPARING"})),
        )
        .await;
    assert_eq!(prepare.status(), 200);

    let accept = app
        .request_as(
            &app.courier,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            None,
        )
        .await;
    assert_eq!(accept.status(), 200);

    for status in ["EN_ROUTE", "DELIVERED"] {
        let response = app
            .request_as(
                &app.courier,
                Method::PATCH,
                &format!("/api/v1/orders/{}/status", id),
                Some(json!({"new_status": status})),
            )
            .await;
        assert_eq!(response.status(), 200, "transition to {status}");
    }

    let response = app
        .request_as(&app.admin, Method::GET, &format!("/api/v1/orders/{}", id), None)
        .await;
    let body = response_json(response).await;
    let data = &body["data"];

    assert_eq!(data["status"], "DELIVERED");
    assert!(!data["delivered_at"].is_null());

    let total = decimal_field(&data["total_amount"]);
    let platform_fee = decimal_field(&data["platform_fee"]);
    let courier_payout = decimal_field(&data["courier_payout"]);
    let supplier_payout = decimal_field(&data["supplier_payout"]);

    assert_eq!(platform_fee + courier_payout + supplier_payout, total);
    assert_eq!(platform_fee, Decimal::from_str("8.00").unwrap());
    assert_eq!(courier_payout, Decimal::from_str("16.00").unwrap());
    assert_eq!(supplier_payout, Decimal::from_str("56.00").unwrap());
}

#[tokio::test]
async fn direct_delivery_pays_only_the_courier() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    let accept = app
        .request_as(
            &app.courier,
            Method::POST,
            &format!("/api/v1/orders/{}/accept", id),
            None,
        )
        .await;
    assert_eq!(accept.status(), 200);

    for status in ["EN_ROUTE", "DELIVERED"] {
        let response = app
            .request_as(
                &app.courier,
                Method::PATCH,
                &format!("/api/v1/orders/{}/status", id),
                Some(json!({"new_status": status})),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .request_as(&app.admin, Method::GET, &format!("/api/v1/orders/{}", id), None)
        .await;
    let body = response_json(response).await;
    let data = &body["data"];

    assert!(data["supplier_payout"].is_null());
    let total = decimal_field(&data["total_amount"]);
    let platform_fee = decimal_field(&data["platform_fee"]);
    let courier_payout = decimal_field(&data["courier_payout"]);
    assert_eq!(platform_fee + courier_payout, total);
}

#[tokio::test]
async fn customer_cancels_en_route_order() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    app.request_as(
        &app.courier,
        Method::POST,
        &format!("/api/v1/orders/{}/accept", id),
        None,
    )
    .await;
    app.request_as(
        &app.courier,
        Method::PATCH,
        &format!("/api/v1/orders/{}/status", id),
        Some(json!({"new_status": "EN_ROUTE"})),
    )
    .await;

    let cancel = app
        .request_as(
            &app.customer,
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", id),
            Some(json!({"reason": "changed my mind"})),
        )
        .await;
    assert_eq!(cancel.status(), 200);

    let body = response_json(cancel).await;
    assert_eq!(body["data"]["status"], "CANCELLED");
    assert_eq!(body["data"]["cancelled_by"], "customer");
    assert_eq!(body["data"]["cancel_reason"], "changed my mind");
    assert!(!body["data"]["cancelled_at"].is_null());
}

#[tokio::test]
async fn delivered_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let id = order_id(&created);

    app.request_as(
        &app.courier,
        Method::POST,
        &format!("/api/v1/orders/{}/accept", id),
        None,
    )
    .await;
    for status in ["EN_ROUTE", "DELIVERED"] {
        app.request_as(
            &app.courier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": status})),
        )
        .await;
    }

    let cancel = app
        .request_as(
            &app.customer,
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", id),
            Some(json!({"reason": "too late"})),
        )
        .await;
    assert_eq!(cancel.status(), 400);
}

#[tokio::test]
async fn customers_cannot_drive_status_updates() {
    let app = TestApp::new().await;
    let created = create_order(&app, "SUPPLIER", Some(app.supplier.id)).await;
    let id = order_id(&created);

    let response = app
        .request_as(
            &app.customer,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "PREPARING"})),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn the_wrong_supplier_is_rejected() {
    let app = TestApp::new().await;
    let created = create_order(&app, "SUPPLIER", Some(app.supplier.id)).await;
    let id = order_id(&created);

    let other_supplier = app
        .seed_extra_user(
            deliber_api::entities::ActorRole::Supplier,
            "other-supplier@test.dev",
        )
        .await;
    let response = app
        .request_as(
            &other_supplier,
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", id),
            Some(json!({"new_status": "PREPARING"})),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn unknown_orders_return_404() {
    let app = TestApp::new().await;

    let response = app
        .request_as(
            &app.admin,
            Method::GET,
            &format!("/api/v1/orders/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn orders_are_fetchable_by_order_number() {
    let app = TestApp::new().await;
    let created = create_order(&app, "DIRECT", None).await;
    let number = created["data"]["order_number"]
        .as_str()
        .expect("order number");
    assert!(number.starts_with("DLB-"));

    let response = app
        .request_as(
            &app.customer,
            Method::GET,
            &format!("/api/v1/orders/{}", number),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["order_number"], json!(number));
}

#[tokio::test]
async fn export_is_admin_only() {
    let app = TestApp::new().await;
    create_order(&app, "DIRECT", None).await;

    let forbidden = app
        .request_as(&app.customer, Method::GET, "/api/v1/orders/export", None)
        .await;
    assert_eq!(forbidden.status(), 403);

    let export = app
        .request_as(&app.admin, Method::GET, "/api/v1/orders/export", None)
        .await;
    assert_eq!(export.status(), 200);

    let bytes = body::to_bytes(export.into_body(), usize::MAX)
        .await
        .expect("csv body");
    let csv = String::from_utf8(bytes.to_vec()).expect("utf8 csv");
    assert!(csv.starts_with("id,order_number,order_type,status"));
    assert!(csv.contains("DLB-"));
}
