//! Operator-console endpoints. Each group carries its own gate so an IT
//! account's reach matches the fixed allow-list, not a stored set.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{keys, RouterExt};
use crate::services::it::{
    DashboardResponse, PerformanceEntry, RestaurantListResponse, RestaurantSummary,
    UpdateAccountRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RestaurantListQuery {
    /// Restrict to one lifecycle status.
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PerformanceQuery {
    /// Restrict to one tenant.
    pub restaurant_id: Option<Uuid>,
    /// Trailing window in days, 1 to 365.
    #[param(minimum = 1, maximum = 365)]
    pub window_days: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    let dashboard = Router::new()
        .route("/it/dashboard", get(dashboard))
        .with_feature(keys::IT_DASHBOARD);

    let accounts = Router::new()
        .route("/it/restaurants", get(list_restaurants))
        .route("/it/restaurants/:id/account", put(update_account))
        .with_feature(keys::ACCOUNTS);

    let performance = Router::new()
        .route("/it/performance", get(performance))
        .with_feature(keys::PERFORMANCE);

    dashboard.merge(accounts).merge(performance)
}

/// Fleet overview
#[utoipa::path(
    get,
    path = "/api/v1/it/dashboard",
    summary = "Operator dashboard",
    responses(
        (status = 200, description = "Tenant counts by status, users and open tickets", body = ApiResponse<DashboardResponse>),
        (status = 403, description = "Requires an IT account", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardResponse> {
    let dashboard = state.services.it.dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

/// Browse tenants
#[utoipa::path(
    get,
    path = "/api/v1/it/restaurants",
    summary = "List restaurants",
    params(RestaurantListQuery),
    responses(
        (status = 200, description = "Paginated tenants", body = ApiResponse<RestaurantListResponse>),
        (status = 403, description = "Requires an IT account", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(query): Query<RestaurantListQuery>,
) -> ApiResult<RestaurantListResponse> {
    let (page, per_page) = crate::page_window(query.page, query.per_page, &state.config);
    let restaurants = state
        .services
        .it
        .list_restaurants(query.status, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(restaurants)))
}

/// Adjust a tenant's plan, limits or lifecycle status
#[utoipa::path(
    put,
    path = "/api/v1/it/restaurants/{id}/account",
    summary = "Update tenant account",
    params(("id" = Uuid, Path, description = "Restaurant id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<RestaurantSummary>),
        (status = 400, description = "Tenant has not completed setup", body = crate::errors::ErrorResponse),
        (status = 404, description = "Restaurant not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAccountRequest>,
) -> ApiResult<RestaurantSummary> {
    let summary = state.services.it.update_account(id, request).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Order volume and revenue per tenant
#[utoipa::path(
    get,
    path = "/api/v1/it/performance",
    summary = "Tenant performance",
    params(PerformanceQuery),
    responses(
        (status = 200, description = "Per-tenant order counts and revenue over the window", body = ApiResponse<Vec<PerformanceEntry>>),
        (status = 404, description = "Filtered restaurant not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn performance(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> ApiResult<Vec<PerformanceEntry>> {
    let window = query
        .window_days
        .unwrap_or(DEFAULT_WINDOW_DAYS)
        .clamp(1, 365);
    let entries = state
        .services
        .it
        .performance(query.restaurant_id, window)
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}
