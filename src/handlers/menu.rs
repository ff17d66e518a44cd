//! Menu endpoints. Prices are entered VAT-exclusive and stored with the
//! derived VAT amount and inclusive total; the bulk order route drives the
//! drag-to-reorder screen.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::menu::{
    CreateMenuItemRequest, MenuItemResponse, MenuListResponse, UpdateMenuItemRequest,
    UpdateMenuOrderRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct MenuListQuery {
    /// Only items currently offered for sale.
    pub available_only: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/menu", post(create_menu_item).get(list_menu_items))
        .route("/menu/order", put(update_menu_order))
        .route("/menu/:id", put(update_menu_item))
        .with_feature(keys::MENU)
}

/// Add a menu item
#[utoipa::path(
    post,
    path = "/api/v1/menu",
    summary = "Create menu item",
    description = "Takes the VAT-exclusive base price and stores the derived VAT and inclusive total",
    request_body = CreateMenuItemRequest,
    responses(
        (status = 200, description = "Item created at the end of the menu", body = ApiResponse<MenuItemResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_menu_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateMenuItemRequest>,
) -> ApiResult<MenuItemResponse> {
    let restaurant_id = user.tenant_id()?;
    let item = state
        .services
        .menu
        .create_menu_item(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// List the menu in display order
#[utoipa::path(
    get,
    path = "/api/v1/menu",
    summary = "List menu items",
    params(MenuListQuery),
    responses(
        (status = 200, description = "Paginated items by sort order", body = ApiResponse<MenuListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_menu_items(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MenuListQuery>,
) -> ApiResult<MenuListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let items = state
        .services
        .menu
        .list_menu_items(
            restaurant_id,
            query.available_only.unwrap_or(false),
            page,
            per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Reorder the whole menu in one call
#[utoipa::path(
    put,
    path = "/api/v1/menu/order",
    summary = "Update menu order",
    description = "Applies the given sort positions atomically; any unknown or duplicate id rejects the whole batch",
    request_body = UpdateMenuOrderRequest,
    responses(
        (status = 200, description = "Order applied", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Duplicate ids in the batch", body = crate::errors::ErrorResponse),
        (status = 404, description = "An id does not belong to this menu", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_menu_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateMenuOrderRequest>,
) -> ApiResult<serde_json::Value> {
    let restaurant_id = user.tenant_id()?;
    state
        .services
        .menu
        .update_menu_order(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Menu order updated"
    }))))
}

/// Update a menu item
#[utoipa::path(
    put,
    path = "/api/v1/menu/{id}",
    summary = "Update menu item",
    params(("id" = Uuid, Path, description = "Menu item id")),
    request_body = UpdateMenuItemRequest,
    responses(
        (status = 200, description = "Item updated, prices re-derived if the base price changed", body = ApiResponse<MenuItemResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_menu_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMenuItemRequest>,
) -> ApiResult<MenuItemResponse> {
    let restaurant_id = user.tenant_id()?;
    let item = state
        .services
        .menu
        .update_menu_item(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}
