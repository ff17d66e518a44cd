//! Support ticket endpoints, split across the two consoles: tenants raise
//! and follow their own tickets, the operator console works the global
//! queue. Both sides share the service; scoping happens there.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::tickets::{
    CreateTicketRequest, TicketListResponse, TicketMessageRequest, TicketMessageResponse,
    TicketResponse, TicketStatus, UpdateTicketRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TicketListQuery {
    /// Restrict to one status.
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ItTicketListQuery {
    /// Restrict to one tenant.
    pub restaurant_id: Option<Uuid>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn parse_status(raw: Option<String>) -> Result<Option<TicketStatus>, crate::errors::ServiceError> {
    raw.as_deref().map(TicketStatus::parse).transpose()
}

/// Tenant-facing routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", post(create_ticket).get(list_tickets))
        .route(
            "/tickets/:id/messages",
            get(list_ticket_messages).post(add_ticket_message),
        )
        .with_feature(keys::SUPPORT)
}

/// Operator-console routes.
pub fn it_routes() -> Router<AppState> {
    Router::new()
        .route("/it/tickets", get(list_all_tickets))
        .route("/it/tickets/:id", put(update_ticket))
        .route(
            "/it/tickets/:id/messages",
            get(list_ticket_messages).post(add_ticket_message),
        )
        .with_feature(keys::IT_DASHBOARD)
}

/// Raise a support ticket
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    summary = "Create ticket",
    request_body = CreateTicketRequest,
    responses(
        (status = 200, description = "Ticket opened", body = ApiResponse<TicketResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateTicketRequest>,
) -> ApiResult<TicketResponse> {
    let restaurant_id = user.tenant_id()?;
    let ticket = state
        .services
        .tickets
        .create_ticket(restaurant_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// List the tenant's tickets
#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    summary = "List tickets",
    params(TicketListQuery),
    responses(
        (status = 200, description = "Paginated tickets, newest first", body = ApiResponse<TicketListResponse>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<TicketListQuery>,
) -> ApiResult<TicketListResponse> {
    let restaurant_id = user.tenant_id()?;
    let status = parse_status(query.status)?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let tickets = state
        .services
        .tickets
        .list_tickets(restaurant_id, status, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(tickets)))
}

/// The global ticket queue
#[utoipa::path(
    get,
    path = "/api/v1/it/tickets",
    summary = "List tickets across tenants",
    params(ItTicketListQuery),
    responses(
        (status = 200, description = "Paginated tickets with tenant names", body = ApiResponse<TicketListResponse>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
        (status = 403, description = "Requires an IT account", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_all_tickets(
    State(state): State<AppState>,
    Query(query): Query<ItTicketListQuery>,
) -> ApiResult<TicketListResponse> {
    let status = parse_status(query.status)?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let tickets = state
        .services
        .tickets
        .list_all_tickets(query.restaurant_id, status, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(tickets)))
}

/// Work a ticket: move it forward or assign it
#[utoipa::path(
    put,
    path = "/api/v1/it/tickets/{id}",
    summary = "Update ticket",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = UpdateTicketRequest,
    responses(
        (status = 200, description = "Ticket updated", body = ApiResponse<TicketResponse>),
        (status = 400, description = "Backward transition or bad assignee", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ticket not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTicketRequest>,
) -> ApiResult<TicketResponse> {
    let ticket = state.services.tickets.update_ticket(id, request).await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// Conversation on a ticket
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}/messages",
    summary = "List ticket messages",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Messages oldest first", body = ApiResponse<Vec<TicketMessageResponse>>),
        (status = 404, description = "Ticket not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_ticket_messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TicketMessageResponse>> {
    let messages = state.services.tickets.list_messages(id, &user).await?;
    Ok(Json(ApiResponse::success(messages)))
}

/// Reply on a ticket
#[utoipa::path(
    post,
    path = "/api/v1/tickets/{id}/messages",
    summary = "Add ticket message",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = TicketMessageRequest,
    responses(
        (status = 200, description = "Message recorded", body = ApiResponse<TicketMessageResponse>),
        (status = 404, description = "Ticket not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_ticket_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TicketMessageRequest>,
) -> ApiResult<TicketMessageResponse> {
    let message = state
        .services
        .tickets
        .add_message(id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(message)))
}
