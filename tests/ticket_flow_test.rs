//! Support tickets across both consoles: tenants raise and follow their
//! own tickets, IT staff work the global queue.

mod common;

use axum::http::StatusCode;
use common::{parse_uuid, response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn tenants_raise_tickets_and_operators_work_the_queue() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Ticket Cafe", "ticketcafe_admin").await;
    let (operator_id, it_token) = app.it_operator("queue_op").await;

    let response = app
        .post(
            "/api/v1/tickets",
            json!({
                "subject": "Printer offline",
                "body": "The kitchen printer stopped responding after the update.",
            }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let ticket_id = parse_uuid(&body["data"]["id"]);
    assert_eq!(body["data"]["status"], json!("open"));
    assert_eq!(body["data"]["priority"], json!("normal"));
    assert_eq!(body["data"]["assigned_to"], json!(null));
    // Tenant-facing responses never carry the tenant name.
    assert!(body["data"].get("restaurant_name").is_none());

    let body = response_json(app.get("/api/v1/it/tickets", &it_token).await).await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(
        body["data"]["tickets"][0]["restaurant_name"],
        json!("Ticket Cafe")
    );

    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({
                "status": "in_progress",
                "priority": "high",
                "assigned_to": operator_id,
            }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("in_progress"));
    assert_eq!(body["data"]["priority"], json!("high"));
    assert_eq!(parse_uuid(&body["data"]["assigned_to"]), operator_id);

    // The tenant sees the operator's changes on its own listing.
    let body = response_json(app.get("/api/v1/tickets", &tenant.token).await).await;
    assert_eq!(body["data"]["tickets"][0]["status"], json!("in_progress"));
}

#[tokio::test]
async fn ticket_status_never_moves_backwards() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Stuck Ticket", "stuckticket_admin").await;
    let (_, it_token) = app.it_operator("flow_op").await;

    let response = app
        .post(
            "/api/v1/tickets",
            json!({ "subject": "Wrong totals", "body": "Orders show stale totals." }),
            &tenant.token,
        )
        .await;
    let ticket_id = parse_uuid(&response_json(response).await["data"]["id"]);

    // Skipping ahead is fine.
    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({ "status": "resolved" }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reopening is not.
    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({ "status": "in_progress" }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        json!("Cannot move ticket from `resolved` to `in_progress`")
    );

    // Re-applying the current status is not a forward move either.
    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({ "status": "resolved" }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assignment_is_restricted_to_active_it_staff() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Assign Cafe", "assigncafe_admin").await;
    let (_, it_token) = app.it_operator("assign_op").await;

    let response = app
        .post(
            "/api/v1/tickets",
            json!({ "subject": "Export fails", "body": "CSV export times out." }),
            &tenant.token,
        )
        .await;
    let ticket_id = parse_uuid(&response_json(response).await["data"]["id"]);

    // A tenant account is not assignable.
    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({ "assigned_to": tenant.admin_id }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        json!("Tickets can only be assigned to active IT staff")
    );

    let response = app
        .put(
            &format!("/api/v1/it/tickets/{ticket_id}"),
            json!({ "assigned_to": uuid::Uuid::new_v4() }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Assignee not found"));
}

#[tokio::test]
async fn message_threads_span_both_consoles() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Thread Cafe", "threadcafe_admin").await;
    let outsider = app.active_tenant("Other Cafe", "othercafe_admin").await;
    let (operator_id, it_token) = app.it_operator("thread_op").await;

    let response = app
        .post(
            "/api/v1/tickets",
            json!({ "subject": "Login loop", "body": "Staff get logged out instantly." }),
            &tenant.token,
        )
        .await;
    let ticket_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .post(
            &format!("/api/v1/tickets/{ticket_id}/messages"),
            json!({ "body": "It happens on the register tablet only." }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post(
            &format!("/api/v1/it/tickets/{ticket_id}/messages"),
            json!({ "body": "Rolling back the tablet build now." }),
            &it_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(parse_uuid(&body["data"]["sender_id"]), operator_id);

    // The tenant reads the whole thread, oldest first.
    let body = response_json(
        app.get(&format!("/api/v1/tickets/{ticket_id}/messages"), &tenant.token)
            .await,
    )
    .await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(parse_uuid(&messages[0]["sender_id"]), tenant.admin_id);
    assert_eq!(parse_uuid(&messages[1]["sender_id"]), operator_id);

    // Another tenant cannot even see the thread exists.
    let response = app
        .get(&format!("/api/v1/tickets/{ticket_id}/messages"), &outsider.token)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_filters_validate_the_status() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Filter Cafe", "filtercafe_admin").await;
    let (_, it_token) = app.it_operator("filter_op").await;

    for subject in ["First issue", "Second issue"] {
        app.post(
            "/api/v1/tickets",
            json!({ "subject": subject, "body": "Details inside." }),
            &tenant.token,
        )
        .await;
    }
    let body = response_json(app.get("/api/v1/tickets", &tenant.token).await).await;
    let ticket_id = parse_uuid(&body["data"]["tickets"][0]["id"]);
    app.put(
        &format!("/api/v1/it/tickets/{ticket_id}"),
        json!({ "status": "closed" }),
        &it_token,
    )
    .await;

    let body =
        response_json(app.get("/api/v1/tickets?status=open", &tenant.token).await).await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["tickets"][0]["status"], json!("open"));

    let response = app.get("/api/v1/tickets?status=reopened", &tenant.token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Unknown ticket status `reopened`"));
}
