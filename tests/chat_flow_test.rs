//! Team chat: channel visibility, membership enforcement, and message
//! history.

mod common;

use axum::http::StatusCode;
use common::{parse_uuid, response_json, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn channel_visibility_follows_membership() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Chatty Cafe", "chattycafe_admin").await;
    let (cook_id, cook_token) = app.employee(&tenant, "chatty_cook", json!({ "chat": true })).await;

    let response = app
        .post(
            "/api/v1/chat/channels",
            json!({ "name": "kitchen", "member_ids": [cook_id] }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    // Creator plus the listed member.
    assert_eq!(body["data"]["member_count"], json!(2));
    assert_eq!(body["data"]["is_default"], json!(false));

    // The cook was never added to `general`, so only `kitchen` shows.
    let body = response_json(app.get("/api/v1/chat/channels", &cook_token).await).await;
    let channels = body["data"].as_array().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["name"], json!("kitchen"));

    // Admins see every channel of the tenant regardless of membership.
    let body = response_json(app.get("/api/v1/chat/channels", &tenant.token).await).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["general", "kitchen"]);
}

#[tokio::test]
async fn posting_and_reading_require_membership() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Gated Chat", "gatedchat_admin").await;
    let (_, waiter_token) = app
        .employee(&tenant, "gated_waiter", json!({ "chat": true }))
        .await;

    let response = app
        .post("/api/v1/chat/channels", json!({ "name": "managers" }), &tenant.token)
        .await;
    let channel_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .post(
            &format!("/api/v1/chat/channels/{channel_id}/messages"),
            json!({ "body": "hello?" }),
            &waiter_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("You are not a member of this channel"));

    let response = app
        .get(&format!("/api/v1/chat/channels/{channel_id}/messages"), &waiter_token)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The creator is always a member.
    let response = app
        .post(
            &format!("/api/v1/chat/channels/{channel_id}/messages"),
            json!({ "body": "rota for next week is up" }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn message_history_comes_back_newest_first() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("History Cafe", "historycafe_admin").await;

    let body = response_json(app.get("/api/v1/chat/channels", &tenant.token).await).await;
    let general_id = parse_uuid(&body["data"][0]["id"]);

    for body_text in ["first message", "second message"] {
        let response = app
            .post(
                &format!("/api/v1/chat/channels/{general_id}/messages"),
                json!({ "body": body_text }),
                &tenant.token,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["data"]["sender_name"], json!("Owner"));
    }

    let body = response_json(
        app.get(
            &format!("/api/v1/chat/channels/{general_id}/messages?page=1&per_page=1"),
            &tenant.token,
        )
        .await,
    )
    .await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], json!("second message"));
    assert_eq!(parse_uuid(&messages[0]["sender_id"]), tenant.admin_id);
}

#[tokio::test]
async fn member_management_stays_inside_the_tenant() {
    let app = TestApp::new().await;
    let tenant = app.active_tenant("Member Cafe", "membercafe_admin").await;
    let outsider = app.active_tenant("Outside Cafe", "outsidecafe_admin").await;
    let (cook_id, _) = app
        .employee(&tenant, "member_cook", json!({ "chat": true }))
        .await;

    let body = response_json(app.get("/api/v1/chat/channels", &tenant.token).await).await;
    let general_id = parse_uuid(&body["data"][0]["id"]);

    let response = app
        .post(
            &format!("/api/v1/chat/channels/{general_id}/members"),
            json!({ "user_id": cook_id }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Joining twice is a conflict.
    let response = app
        .post(
            &format!("/api/v1/chat/channels/{general_id}/members"),
            json!({ "user_id": cook_id }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        json!("User is already a member of this channel")
    );

    // Users from another tenant do not resolve.
    let response = app
        .post(
            &format!("/api/v1/chat/channels/{general_id}/members"),
            json!({ "user_id": outsider.admin_id }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post(
            "/api/v1/chat/channels",
            json!({ "name": "mixed", "member_ids": [outsider.admin_id] }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("One or more users were not found"));

    let response = app
        .post(
            &format!("/api/v1/chat/channels/{}/members", Uuid::new_v4()),
            json!({ "user_id": cook_id }),
            &tenant.token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
