//! Inventory lifecycle: receipts, manual corrections, branch scoping and
//! the derived stock status.

mod common;

use axum::http::StatusCode;
use common::{dec_of, parse_uuid, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

async fn create_item(
    app: &TestApp,
    token: &str,
    name: &str,
    quantity: &str,
    threshold: &str,
) -> Uuid {
    let response = app
        .post(
            "/api/v1/inventory",
            json!({
                "name": name,
                "quantity": quantity,
                "unit": "kg",
                "cost_per_unit": "10.00",
                "low_stock_threshold": threshold,
            }),
            token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    parse_uuid(&response_json(response).await["data"]["id"])
}

#[tokio::test]
async fn receipts_increment_stock_and_reprice() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Stock Room", "stockroom_admin").await;
    let item_id = create_item(&app, &tenant.token, "flour", "5", "1").await;

    let response = app
        .post(
            &format!("/api/v1/inventory/{item_id}/receive"),
            json!({ "quantity": "2.5", "cost_per_unit": "12.00" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(dec_of(&body["data"]["quantity"]), dec!(7.5));
    assert_eq!(dec_of(&body["data"]["cost_per_unit"]), dec!(12.00));
    assert_eq!(body["data"]["status"], json!("in_stock"));

    // A receipt without a price keeps the current cost.
    let response = app
        .post(
            &format!("/api/v1/inventory/{item_id}/receive"),
            json!({ "quantity": "1" }),
            &tenant.token,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(dec_of(&body["data"]["quantity"]), dec!(8.5));
    assert_eq!(dec_of(&body["data"]["cost_per_unit"]), dec!(12.00));
}

#[tokio::test]
async fn receipts_must_be_positive() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Zero Stock", "zerostock_admin").await;
    let item_id = create_item(&app, &tenant.token, "rice", "5", "1").await;

    for quantity in ["0", "-1"] {
        let response = app
            .post(
                &format!("/api/v1/inventory/{item_id}/receive"),
                json!({ "quantity": quantity }),
                &tenant.token,
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_json(response).await;
        assert_eq!(body["message"], json!("Received quantity must be positive"));
    }

    let response = app
        .post(
            &format!("/api/v1/inventory/{}/receive", Uuid::new_v4()),
            json!({ "quantity": "1" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stock_status_tracks_the_threshold() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Threshold Co", "threshold_admin").await;
    create_item(&app, &tenant.token, "plenty", "10", "1").await;
    create_item(&app, &tenant.token, "scarce", "0.5", "1").await;
    create_item(&app, &tenant.token, "gone", "0", "1").await;

    let body = response_json(app.get("/api/v1/inventory", &tenant.token).await).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(body["data"]["total"], json!(3));
    // Listed by name; at or below the threshold reads as low.
    assert_eq!(items[0]["name"], json!("gone"));
    assert_eq!(items[0]["status"], json!("low_stock"));
    assert_eq!(items[1]["name"], json!("plenty"));
    assert_eq!(items[1]["status"], json!("in_stock"));
    assert_eq!(items[2]["name"], json!("scarce"));
    assert_eq!(items[2]["status"], json!("low_stock"));

    let body = response_json(app.get("/api/v1/inventory/low-stock", &tenant.token).await).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["gone", "scarce"]);

    // The analytics snapshot splits zero stock out of the low bucket.
    let body = response_json(app.get("/api/v1/analytics/inventory", &tenant.token).await).await;
    assert_eq!(body["data"]["total_items"], json!(3));
    assert_eq!(body["data"]["low_stock_items"], json!(1));
    assert_eq!(body["data"]["out_of_stock_items"], json!(1));
}

#[tokio::test]
async fn manual_corrections_validate_amounts() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Correction Co", "correction_admin").await;
    let item_id = create_item(&app, &tenant.token, "sugar", "5", "1").await;

    let response = app
        .put(
            &format!("/api/v1/inventory/{item_id}"),
            json!({ "quantity": "-3" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("quantity cannot be negative"));

    let response = app
        .put(
            &format!("/api/v1/inventory/{item_id}"),
            json!({ "name": "brown sugar", "quantity": "0.5" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], json!("brown sugar"));
    assert_eq!(body["data"]["status"], json!("low_stock"));
}

#[tokio::test]
async fn items_can_be_scoped_to_a_branch() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Branch Stock", "branchstock_admin").await;

    let body = response_json(app.get("/api/v1/branches", &tenant.token).await).await;
    let branch_id = parse_uuid(&body["data"][0]["id"]);

    let response = app
        .post(
            "/api/v1/inventory",
            json!({
                "name": "lamb",
                "branch_id": branch_id,
                "quantity": "4",
                "unit": "kg",
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    create_item(&app, &tenant.token, "saffron", "1", "0.1").await;

    let body = response_json(
        app.get(
            &format!("/api/v1/inventory?branch_id={branch_id}"),
            &tenant.token,
        )
        .await,
    )
    .await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["items"][0]["name"], json!("lamb"));

    // An unknown branch is rejected at creation.
    let response = app
        .post(
            "/api/v1/inventory",
            json!({
                "name": "mint",
                "branch_id": Uuid::new_v4(),
                "quantity": "1",
                "unit": "kg",
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Branch not found"));
}
