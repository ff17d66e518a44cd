//! Reporting: the composed dashboard, date-range validation and the
//! best-seller ranking.

mod common;

use axum::http::{Method, StatusCode};
use common::{dec_of, parse_uuid, response_json, seed_menu_with_recipe, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn dashboard_aggregates_the_trailing_window() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Numbers Cafe", "numberscafe_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "10.0", "0.2", "40.00").await;

    // Three orders: one paid, one still open, one cancelled.
    let mut order_ids = Vec::new();
    for _ in 0..3 {
        let response = app
            .post(
                "/api/v1/orders",
                json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "46.00" }] }),
                &tenant.token,
            )
            .await;
        order_ids.push(parse_uuid(&response_json(response).await["data"]["id"]));
    }
    app.post(
        &format!("/api/v1/orders/{}/pay", order_ids[0]),
        json!({ "payment_method": "cash" }),
        &tenant.token,
    )
    .await;
    app.request(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", order_ids[2]),
        None,
        Some(&tenant.token),
    )
    .await;

    let body = response_json(app.get("/api/v1/analytics/dashboard", &tenant.token).await).await;
    let sales = &body["data"]["sales"];
    // Cancelled orders drop out of the count entirely.
    assert_eq!(sales["orders"], json!(2));
    assert_eq!(sales["paid_orders"], json!(1));
    assert_eq!(dec_of(&sales["revenue"]), dec!(46.00));
    assert_eq!(dec_of(&sales["average_order_value"]), dec!(46.00));

    let top = body["data"]["top_items"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0]["name"], json!("beef plate"));
    assert_eq!(top[0]["quantity"], json!(2));
    assert_eq!(dec_of(&top[0]["revenue"]), dec!(92.00));

    assert_eq!(body["data"]["inventory"]["total_items"], json!(1));
    assert!(body["data"]["generated_at"].is_string());
}

#[tokio::test]
async fn sales_range_is_validated() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Range Cafe", "rangecafe_admin").await;

    let response = app
        .get(
            "/api/v1/analytics/sales?from=2026-01-02T00:00:00Z&to=2026-01-01T00:00:00Z",
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("`from` must not be after `to`"));

    // A window with no activity reports zeros, not an error.
    let body = response_json(
        app.get(
            "/api/v1/analytics/sales?from=2000-01-01T00:00:00Z&to=2000-12-31T00:00:00Z",
            &tenant.token,
        )
        .await,
    )
    .await;
    assert_eq!(body["data"]["orders"], json!(0));
    assert_eq!(body["data"]["paid_orders"], json!(0));
    assert_eq!(dec_of(&body["data"]["revenue"]), dec!(0));
    assert_eq!(dec_of(&body["data"]["average_order_value"]), dec!(0));
}

#[tokio::test]
async fn top_items_rank_by_quantity_and_honor_the_limit() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Ranking Cafe", "rankingcafe_admin").await;
    let (_, _, beef_item) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "10.0", "0.2", "40.00").await;
    let (_, _, lamb_item) =
        seed_menu_with_recipe(&app, &tenant.token, "lamb", "10.0", "0.2", "55.00").await;

    app.post(
        "/api/v1/orders",
        json!({ "items": [
            { "menu_item_id": lamb_item, "quantity": 3, "unit_price": "63.25" },
            { "menu_item_id": beef_item, "quantity": 1, "unit_price": "46.00" },
        ] }),
        &tenant.token,
    )
    .await;

    let body = response_json(app.get("/api/v1/analytics/top-items", &tenant.token).await).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], json!("lamb plate"));
    assert_eq!(items[0]["quantity"], json!(3));
    assert_eq!(items[1]["name"], json!("beef plate"));

    let body = response_json(
        app.get("/api/v1/analytics/top-items?limit=1", &tenant.token)
            .await,
    )
    .await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], json!("lamb plate"));
}
