//! Order endpoints for the POS screen, the order queue and the kitchen.
//!
//! The three route groups carry different feature gates: placing and paying
//! belongs to the till (`pos`), browsing and cancelling to the back office
//! (`orders`), and status changes to the kitchen display (`kitchen`).

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::orders::{
    CreateOrderRequest, OrderListResponse, OrderResponse, PayOrderRequest,
    UpdateOrderStatusRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    /// Restrict to a single order status.
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveCountResponse {
    pub active: u64,
}

pub fn routes() -> Router<AppState> {
    let pos = Router::new()
        .route("/orders", post(place_order))
        .route("/orders/:id/pay", post(pay_order))
        .with_feature(keys::POS);

    let queue = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/active-count", get(active_order_count))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .with_feature(keys::ORDERS);

    let kitchen = Router::new()
        .route("/orders/:id/status", put(update_order_status))
        .with_feature(keys::KITCHEN);

    pos.merge(queue).merge(kitchen)
}

/// Place an order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place an order",
    description = "Validates stock against the expanded recipe lines and deducts it atomically",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<OrderResponse> {
    let restaurant_id = user.tenant_id()?;
    let order = state
        .services
        .orders
        .place_order(restaurant_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Paginated orders, newest first", body = ApiResponse<OrderListResponse>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<OrderListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let orders = state
        .services
        .orders
        .list_orders(restaurant_id, query.status, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Count of orders still in flight
#[utoipa::path(
    get,
    path = "/api/v1/orders/active-count",
    summary = "Active order count",
    responses(
        (status = 200, description = "Orders not yet completed or cancelled", body = ApiResponse<ActiveCountResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn active_order_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<ActiveCountResponse> {
    let restaurant_id = user.tenant_id()?;
    let active = state.services.orders.active_order_count(restaurant_id).await?;
    Ok(Json(ApiResponse::success(ActiveCountResponse { active })))
}

/// Fetch one order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get an order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let restaurant_id = user.tenant_id()?;
    let order = state.services.orders.get_order(restaurant_id, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Move an order along the kitchen flow
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderResponse> {
    let restaurant_id = user.tenant_id()?;
    let order = state
        .services
        .orders
        .update_order_status(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel a freshly created order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel an order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let restaurant_id = user.tenant_id()?;
    let order = state.services.orders.cancel_order(restaurant_id, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Record payment for an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/pay",
    summary = "Pay an order",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PayOrderRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order cannot be paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn pay_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PayOrderRequest>,
) -> ApiResult<OrderResponse> {
    let restaurant_id = user.tenant_id()?;
    let order = state
        .services
        .orders
        .pay_order(restaurant_id, user.user_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
