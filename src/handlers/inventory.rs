//! Inventory endpoints. Stock quantities only ever move through order
//! placement and explicit receipts; the update route covers the
//! descriptive fields.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::inventory::{
    CreateInventoryItemRequest, InventoryItemResponse, InventoryListResponse,
    ReceiveStockRequest, UpdateInventoryItemRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct InventoryListQuery {
    /// Restrict to a single branch.
    pub branch_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory", post(create_item).get(list_items))
        .route("/inventory/low-stock", get(low_stock))
        .route("/inventory/:id", put(update_item))
        .route("/inventory/:id/receive", post(receive_stock))
        .with_feature(keys::INVENTORY)
}

/// Add an inventory item
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    summary = "Create inventory item",
    request_body = CreateInventoryItemRequest,
    responses(
        (status = 200, description = "Item created", body = ApiResponse<InventoryItemResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Branch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateInventoryItemRequest>,
) -> ApiResult<InventoryItemResponse> {
    let restaurant_id = user.tenant_id()?;
    let item = state
        .services
        .inventory
        .create_item(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// List inventory
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    summary = "List inventory items",
    params(InventoryListQuery),
    responses(
        (status = 200, description = "Paginated items, alphabetic", body = ApiResponse<InventoryListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<InventoryListQuery>,
) -> ApiResult<InventoryListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let items = state
        .services
        .inventory
        .list_items(restaurant_id, query.branch_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Items at or below their low-stock threshold
#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    summary = "Low stock report",
    responses(
        (status = 200, description = "Items needing a reorder", body = ApiResponse<Vec<InventoryItemResponse>>),
    ),
    security(("Bearer" = []))
)]
pub async fn low_stock(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<InventoryItemResponse>> {
    let restaurant_id = user.tenant_id()?;
    let items = state.services.inventory.low_stock_items(restaurant_id).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Update an item's descriptive fields
#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}",
    summary = "Update inventory item",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    request_body = UpdateInventoryItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<InventoryItemResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInventoryItemRequest>,
) -> ApiResult<InventoryItemResponse> {
    let restaurant_id = user.tenant_id()?;
    let item = state
        .services
        .inventory
        .update_item(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Book received stock onto an item
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/receive",
    summary = "Receive stock",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    request_body = ReceiveStockRequest,
    responses(
        (status = 200, description = "Quantity increased", body = ApiResponse<InventoryItemResponse>),
        (status = 400, description = "Quantity must be positive", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn receive_stock(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReceiveStockRequest>,
) -> ApiResult<InventoryItemResponse> {
    let restaurant_id = user.tenant_id()?;
    let item = state
        .services
        .inventory
        .receive_stock(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}
