//! Order lifecycle against the full router: placement with recipe-based
//! stock deduction, itemized insufficient-stock rejections, the status
//! machine, payment, and cancellation semantics.

mod common;

use axum::http::{Method, StatusCode};
use common::{dec_of, parse_uuid, response_json, seed_menu_with_recipe, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use sufra_api::entities::{inventory_item, order, order_item};

#[tokio::test]
async fn placing_an_order_deducts_stock_and_derives_totals() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Najd Grill", "najd_admin").await;
    let (item_id, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "10.0", "0.2", "40.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({
                "items": [
                    { "menu_item_id": menu_item_id, "quantity": 2, "unit_price": "46.00" }
                ],
                "customer_name": "Walk-in",
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    let data = &body["data"];
    assert_eq!(data["order_number"], json!(1));
    assert_eq!(data["status"], json!("created"));
    // VAT is extracted from the inclusive total: 92.00 at 15% carries 12.00.
    assert_eq!(dec_of(&data["total"]), dec!(92.00));
    assert_eq!(dec_of(&data["tax"]), dec!(12.00));
    assert_eq!(dec_of(&data["subtotal"]), dec!(80.00));
    assert_eq!(data["items"][0]["name"], json!("beef plate"));
    assert_eq!(data["items"][0]["quantity"], json!(2));

    // Two portions at 0.2 kg each leave 9.6 of the seeded 10.0.
    let item = inventory_item::Entity::find_by_id(item_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity, dec!(9.6));

    let order_id = parse_uuid(&data["id"]);
    let lines = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .count(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(lines, 1);
}

#[tokio::test]
async fn order_numbers_count_up_per_tenant() {
    let app = TestApp::new().await;
    let first = app.active_tenant("First Kitchen", "first_admin").await;
    let second = app.active_tenant("Second Kitchen", "second_admin").await;
    let (_, _, menu_a) =
        seed_menu_with_recipe(&app, &first.token, "rice", "50.0", "0.1", "10.00").await;
    let (_, _, menu_b) =
        seed_menu_with_recipe(&app, &second.token, "lamb", "50.0", "0.1", "10.00").await;

    for _ in 0..2 {
        let response = app
            .post(
                "/api/v1/orders",
                json!({ "items": [{ "menu_item_id": menu_a, "quantity": 1, "unit_price": "11.50" }] }),
                &first.token,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_b, "quantity": 1, "unit_price": "11.50" }] }),
            &second.token,
        )
        .await;
    let body = response_json(response).await;

    // The second tenant starts its own sequence at 1.
    assert_eq!(body["data"]["order_number"], json!(1));

    let latest = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_a, "quantity": 1, "unit_price": "11.50" }] }),
            &first.token,
        )
        .await;
    let body = response_json(latest).await;
    assert_eq!(body["data"]["order_number"], json!(3));
}

#[tokio::test]
async fn insufficient_stock_rejects_with_itemized_shortfall() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Short Stock", "short_admin").await;
    let (item_id, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "0.3", "0.2", "40.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({
                "items": [
                    { "menu_item_id": menu_item_id, "quantity": 2, "unit_price": "46.00" }
                ],
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Insufficient stock for: beef"));
    let items = body["details"]["insufficientItems"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], json!("beef"));
    assert_eq!(dec_of(&items[0]["required"]), dec!(0.4));
    assert_eq!(dec_of(&items[0]["available"]), dec!(0.3));

    // Nothing was written: no order row, stock untouched.
    let orders = order::Entity::find()
        .filter(order::Column::RestaurantId.eq(tenant.restaurant_id))
        .count(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(orders, 0);
    let item = inventory_item::Entity::find_by_id(item_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity, dec!(0.3));
}

#[tokio::test]
async fn a_rejected_order_resubmitted_reports_the_same_shortfall() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Retry Kitchen", "retry_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "0.3", "0.2", "40.00").await;

    let order = json!({
        "items": [
            { "menu_item_id": menu_item_id, "quantity": 2, "unit_price": "46.00" }
        ],
    });

    let first = app.post("/api/v1/orders", order.clone(), &tenant.token).await;
    assert_eq!(first.status(), StatusCode::CONFLICT);
    let first_items = response_json(first).await["details"]["insufficientItems"].clone();

    // The rejection deducted nothing, so the second attempt sees identical
    // availability.
    let second = app.post("/api/v1/orders", order, &tenant.token).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let second_items = response_json(second).await["details"]["insufficientItems"].clone();

    assert_eq!(first_items, second_items);
    assert_eq!(dec_of(&second_items[0]["available"]), dec!(0.3));
}

#[tokio::test]
async fn requirements_aggregate_across_lines_sharing_an_ingredient() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Shared Pantry", "shared_admin").await;
    // 0.5 on hand; two lines of the same dish need 0.2 + 0.4 = 0.6 combined.
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "chicken", "0.5", "0.2", "30.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({
                "items": [
                    { "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "34.50" },
                    { "menu_item_id": menu_item_id, "quantity": 2, "unit_price": "34.50" }
                ],
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = response_json(response).await;
    let items = body["details"]["insufficientItems"].as_array().unwrap();
    assert_eq!(dec_of(&items[0]["required"]), dec!(0.6));
    assert_eq!(dec_of(&items[0]["available"]), dec!(0.5));
}

#[tokio::test]
async fn status_machine_rejects_skips_and_reversals() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Status House", "status_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "fish", "10.0", "0.2", "40.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "46.00" }] }),
            &tenant.token,
        )
        .await;
    let order_id = parse_uuid(&response_json(response).await["data"]["id"]);
    let status_uri = format!("/api/v1/orders/{order_id}/status");

    // created cannot jump straight to ready.
    let response = app
        .put(&status_uri, json!({ "status": "ready" }), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for next in ["processing", "ready", "completed"] {
        let response = app
            .put(&status_uri, json!({ "status": next }), &tenant.token)
            .await;
        assert_eq!(response.status(), StatusCode::OK, "transition to {next}");
        let body = response_json(response).await;
        assert_eq!(body["data"]["status"], json!(next));
    }

    // Terminal orders accept nothing further.
    let response = app
        .put(&status_uri, json!({ "status": "processing" }), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put(&status_uri, json!({ "status": "torched" }), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Unknown order status `torched`"));
}

#[tokio::test]
async fn paying_records_a_transaction_and_blocks_double_payment() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Cash Desk", "cash_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "lamb", "10.0", "0.2", "40.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "46.00" }] }),
            &tenant.token,
        )
        .await;
    let order_id = parse_uuid(&response_json(response).await["data"]["id"]);
    let pay_uri = format!("/api/v1/orders/{order_id}/pay");

    let response = app
        .post(&pay_uri, json!({ "payment_method": "cash" }), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("paid"));

    let response = app.get("/api/v1/transactions", &tenant.token).await;
    let body = response_json(response).await;
    let rows = body["data"]["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(dec_of(&rows[0]["total"]), dec!(46.00));
    assert_eq!(dec_of(&rows[0]["tax"]), dec!(6.00));
    assert_eq!(rows[0]["payment_method"], json!("cash"));

    // A paid order cannot be paid again.
    let response = app
        .post(&pay_uri, json!({ "payment_method": "card" }), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // ...and exactly one transaction row exists.
    let response = app.get("/api/v1/transactions", &tenant.token).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));
}

#[tokio::test]
async fn cancelling_keeps_the_deducted_stock() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("No Refill", "norefill_admin").await;
    let (item_id, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "beef", "10.0", "0.2", "40.00").await;

    let response = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 2, "unit_price": "46.00" }] }),
            &tenant.token,
        )
        .await;
    let order_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&tenant.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("cancelled"));

    // Cancellation is a pure status change; the kitchen already consumed
    // the ingredients.
    let item = inventory_item::Entity::find_by_id(item_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity, dec!(9.6));

    // Cancelled orders cannot be paid.
    let response = app
        .post(
            &format!("/api/v1/orders/{order_id}/pay"),
            json!({ "payment_method": "cash" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn active_count_tracks_open_orders_only() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Counter", "counter_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "rice", "50.0", "0.1", "10.00").await;

    let mut order_ids = Vec::new();
    for _ in 0..3 {
        let response = app
            .post(
                "/api/v1/orders",
                json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "11.50" }] }),
                &tenant.token,
            )
            .await;
        order_ids.push(parse_uuid(&response_json(response).await["data"]["id"]));
    }

    let response = app.get("/api/v1/orders/active-count", &tenant.token).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["active"], json!(3));

    app.request(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", order_ids[0]),
        None,
        Some(&tenant.token),
    )
    .await;

    let response = app.get("/api/v1/orders/active-count", &tenant.token).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["active"], json!(2));
}

#[tokio::test]
async fn listing_filters_by_status_and_paginates() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Pager", "pager_admin").await;
    let (_, _, menu_item_id) =
        seed_menu_with_recipe(&app, &tenant.token, "rice", "50.0", "0.1", "10.00").await;

    for _ in 0..3 {
        app.post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 1, "unit_price": "11.50" }] }),
            &tenant.token,
        )
        .await;
    }

    let response = app
        .get("/api/v1/orders?page=1&per_page=2", &tenant.token)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], json!(3));
    // Newest first.
    assert_eq!(body["data"]["orders"][0]["order_number"], json!(3));

    let response = app
        .get("/api/v1/orders?status=cancelled", &tenant.token)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn menu_item_without_recipe_needs_no_stock() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Drinks Only", "drinks_admin").await;

    let response = app
        .post(
            "/api/v1/menu",
            json!({ "name": "Bottled water", "base_price": "2.00" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let menu_item_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "menu_item_id": menu_item_id, "quantity": 4, "unit_price": "2.30" }] }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(dec_of(&body["data"]["total"]), dec!(9.20));
}
