//! The per-feature gate over the protected surface: employee grants in both
//! legacy and granular shapes, the admin bypass, the IT/client split, and
//! tenant status enforcement.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, seed_menu_with_recipe, TestApp};
use serde_json::json;

#[tokio::test]
async fn employee_reaches_only_granted_features() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Najd Grill", "najd_admin").await;
    let (_, staff_token) = app
        .employee(&tenant, "stockkeeper", json!({ "inventory": true }))
        .await;

    let response = app.get("/api/v1/inventory", &staff_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    for uri in ["/api/v1/orders", "/api/v1/menu", "/api/v1/analytics/dashboard"] {
        let response = app.get(uri, &staff_token).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri} reachable");
    }

    let response = app
        .post(
            "/api/v1/recipes",
            json!({ "name": "Secret", "ingredients": [] }),
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn granular_grant_maps_methods_to_actions() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Granular", "granular_admin").await;
    let (_, staff_token) = app
        .employee(
            &tenant,
            "menu_viewer",
            json!({ "menu": { "view": true, "add": false, "edit": false, "delete": false } }),
        )
        .await;

    let response = app.get("/api/v1/menu", &staff_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            "/api/v1/menu",
            json!({ "name": "Shawarma", "base_price": "18.00" }),
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The edit action guards PUT on the same feature.
    let response = app
        .put(
            "/api/v1/menu/order",
            json!({ "items": [{ "id": "00000000-0000-0000-0000-000000000000", "sort_order": 1 }] }),
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn write_grants_imply_view() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Implied", "implied_admin").await;
    let (_, staff_token) = app
        .employee(
            &tenant,
            "receiver",
            json!({ "inventory": { "add": true } }),
        )
        .await;

    // add implies view after normalization.
    let response = app.get("/api/v1/inventory", &staff_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            "/api/v1/inventory",
            json!({ "name": "salt", "quantity": "5", "unit": "kg" }),
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // ...but not edit.
    let body = response_json(response).await;
    let item_id = body["data"]["id"].as_str().unwrap().to_string();
    let response = app
        .put(
            &format!("/api/v1/inventory/{item_id}"),
            json!({ "name": "sea salt" }),
            &staff_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_permission_keys_are_rejected_on_write() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Strict Keys", "strict_admin").await;

    let response = app
        .post(
            "/api/v1/employees",
            json!({
                "username": "oddball",
                "password": "hunter2hunter2",
                "permissions": { "warehouse": true },
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // IT features cannot be granted to tenant staff either.
    let response = app
        .post(
            "/api/v1/employees",
            json!({
                "username": "oddball",
                "password": "hunter2hunter2",
                "permissions": { "it_dashboard": true },
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_bypasses_grants_but_not_the_it_surface() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Admin Co", "adminco_admin").await;

    // No explicit grants, yet every client feature answers.
    for uri in [
        "/api/v1/orders",
        "/api/v1/inventory",
        "/api/v1/analytics/dashboard",
        "/api/v1/settings",
    ] {
        let response = app.get(uri, &tenant.token).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri} blocked for admin");
    }

    for uri in [
        "/api/v1/it/dashboard",
        "/api/v1/it/restaurants",
        "/api/v1/it/performance",
    ] {
        let response = app.get(uri, &tenant.token).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{uri} open to client accounts"
        );
    }
}

#[tokio::test]
async fn it_operators_reach_the_console_but_not_tenant_features() {
    let app = TestApp::new().await;
    app.active_tenant("Some Tenant", "tenant_admin").await;
    let (_, it_token) = app.it_operator("night_shift").await;

    for uri in [
        "/api/v1/it/dashboard",
        "/api/v1/it/restaurants",
        "/api/v1/it/performance",
        "/api/v1/it/tickets",
    ] {
        let response = app.get(uri, &it_token).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri} blocked for IT");
    }

    for uri in ["/api/v1/orders", "/api/v1/inventory", "/api/v1/settings"] {
        let response = app.get(uri, &it_token).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{uri} open to IT accounts"
        );
    }
}

#[tokio::test]
async fn pending_tenants_are_cut_off_until_setup() {
    let app = TestApp::new().await;
    let tenant = app.signup("Not Ready", "notready_admin").await;

    let response = app.get("/api/v1/orders", &tenant.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        json!("Finish restaurant setup before using this feature")
    );

    // The session surface stays reachable during onboarding.
    let response = app.get("/api/v1/auth/me", &tenant.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["tenant_status"], json!("pending_setup"));

    // Completing setup opens the gate.
    let response = app
        .post("/api/v1/auth/setup", json!({}), &tenant.token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/api/v1/orders", &tenant.token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn permission_edits_bite_on_the_next_request() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Live Edits", "liveedits_admin").await;
    let (staff_id, staff_token) = app
        .employee(&tenant, "revocable", json!({ "inventory": true }))
        .await;

    let response = app.get("/api/v1/inventory", &staff_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put(
            &format!("/api/v1/employees/{staff_id}"),
            json!({ "permissions": {} }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Same token, next request: access is checked against the database.
    let response = app.get("/api/v1/inventory", &staff_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivation_invalidates_live_sessions() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Lockout", "lockout_admin").await;
    let (staff_id, staff_token) = app
        .employee(&tenant, "departing", json!({ "inventory": true }))
        .await;

    let response = app
        .put(
            &format!("/api/v1/employees/{staff_id}"),
            json!({ "is_active": false }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/v1/inventory", &staff_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logging back in fails too.
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "departing", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_and_garbage_tokens_are_unauthorized() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Token Check", "tokencheck_admin").await;
    seed_menu_with_recipe(&app, &tenant.token, "beef", "10.0", "0.2", "40.00").await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The public surface needs no token.
    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
