//! Team chat endpoints. Channel membership is the visibility boundary:
//! admins see every channel, everyone else only the channels they were
//! added to, and posting requires membership outright.

use axum::{
    extract::{Json, Path, Query, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::chat::{
    ChannelResponse, ChatMessageResponse, CreateChannelRequest, SendMessageRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MessageListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/channels", post(create_channel).get(list_channels))
        .route("/chat/channels/:id/members", post(add_member))
        .route(
            "/chat/channels/:id/messages",
            post(send_message).get(list_messages),
        )
        .with_feature(keys::CHAT)
}

/// Channels visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/chat/channels",
    summary = "List channels",
    responses(
        (status = 200, description = "Channels with member counts", body = ApiResponse<Vec<ChannelResponse>>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_channels(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<ChannelResponse>> {
    let restaurant_id = user.tenant_id()?;
    let channels = state
        .services
        .chat
        .list_channels(restaurant_id, &user)
        .await?;
    Ok(Json(ApiResponse::success(channels)))
}

/// Open a channel
#[utoipa::path(
    post,
    path = "/api/v1/chat/channels",
    summary = "Create channel",
    description = "The creator becomes a member automatically; listed members must belong to the tenant",
    request_body = CreateChannelRequest,
    responses(
        (status = 200, description = "Channel created", body = ApiResponse<ChannelResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "A listed member does not exist", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_channel(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateChannelRequest>,
) -> ApiResult<ChannelResponse> {
    let restaurant_id = user.tenant_id()?;
    let channel = state
        .services
        .chat
        .create_channel(restaurant_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(channel)))
}

/// Add a member to a channel
#[utoipa::path(
    post,
    path = "/api/v1/chat/channels/{id}/members",
    summary = "Add channel member",
    params(("id" = Uuid, Path, description = "Channel id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Member added", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Channel or user not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already a member", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<serde_json::Value> {
    let restaurant_id = user.tenant_id()?;
    state
        .services
        .chat
        .add_member(restaurant_id, id, request.user_id)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Member added"
    }))))
}

/// Post to a channel
#[utoipa::path(
    post,
    path = "/api/v1/chat/channels/{id}/messages",
    summary = "Send message",
    params(("id" = Uuid, Path, description = "Channel id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message stored and fanned out to members", body = ApiResponse<ChatMessageResponse>),
        (status = 403, description = "Caller is not a member", body = crate::errors::ErrorResponse),
        (status = 404, description = "Channel not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<ChatMessageResponse> {
    let restaurant_id = user.tenant_id()?;
    let message = state
        .services
        .chat
        .send_message(restaurant_id, id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(message)))
}

/// Channel history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/chat/channels/{id}/messages",
    summary = "List messages",
    params(("id" = Uuid, Path, description = "Channel id"), MessageListQuery),
    responses(
        (status = 200, description = "Paginated messages", body = ApiResponse<Vec<ChatMessageResponse>>),
        (status = 403, description = "Caller is not a member", body = crate::errors::ErrorResponse),
        (status = 404, description = "Channel not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> ApiResult<Vec<ChatMessageResponse>> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let messages = state
        .services
        .chat
        .list_messages(restaurant_id, id, &user, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(messages)))
}
