//! Reporting endpoints. The dashboard bundles the trailing-window numbers
//! the owner screen shows on open; the remaining routes answer the same
//! questions for an arbitrary date range.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::analytics::{
    AnalyticsDashboard, InventorySnapshot, SalesSummary, TopItemEntry, DASHBOARD_TOP_ITEMS,
    DASHBOARD_WINDOW_DAYS,
};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateRangeQuery {
    /// Start of the range, RFC 3339. Defaults to 30 days ago.
    pub from: Option<DateTime<Utc>>,
    /// End of the range, RFC 3339. Defaults to now.
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopItemsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// How many items to return, newest-first by quantity sold.
    #[param(minimum = 1, maximum = 50)]
    pub limit: Option<u64>,
}

fn resolve_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> (DateTime<Utc>, DateTime<Utc>) {
    let to = to.unwrap_or_else(Utc::now);
    let from = from.unwrap_or_else(|| to - Duration::days(DASHBOARD_WINDOW_DAYS));
    (from, to)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/sales", get(sales_summary))
        .route("/analytics/top-items", get(top_items))
        .route("/analytics/inventory", get(inventory_snapshot))
        .with_feature(keys::ANALYTICS)
}

/// The owner dashboard in one call
#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    summary = "Analytics dashboard",
    description = "Sales, best sellers and stock levels over the trailing 30 days",
    responses(
        (status = 200, description = "Composed dashboard", body = ApiResponse<AnalyticsDashboard>),
    ),
    security(("Bearer" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<AnalyticsDashboard> {
    let restaurant_id = user.tenant_id()?;
    let dashboard = state.services.analytics.dashboard(restaurant_id).await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

/// Sales totals over a date range
#[utoipa::path(
    get,
    path = "/api/v1/analytics/sales",
    summary = "Sales summary",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Order counts, revenue and average ticket", body = ApiResponse<SalesSummary>),
        (status = 400, description = "`from` after `to`", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn sales_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<SalesSummary> {
    let restaurant_id = user.tenant_id()?;
    let (from, to) = resolve_range(query.from, query.to);
    let summary = state
        .services
        .analytics
        .sales_summary(restaurant_id, from, to)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Best-selling menu items over a date range
#[utoipa::path(
    get,
    path = "/api/v1/analytics/top-items",
    summary = "Top items",
    params(TopItemsQuery),
    responses(
        (status = 200, description = "Items ranked by quantity sold", body = ApiResponse<Vec<TopItemEntry>>),
        (status = 400, description = "`from` after `to`", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn top_items(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<TopItemsQuery>,
) -> ApiResult<Vec<TopItemEntry>> {
    let restaurant_id = user.tenant_id()?;
    let (from, to) = resolve_range(query.from, query.to);
    let limit = query.limit.unwrap_or(DASHBOARD_TOP_ITEMS).clamp(1, 50);
    let items = state
        .services
        .analytics
        .top_items(restaurant_id, from, to, limit)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Current stock position
#[utoipa::path(
    get,
    path = "/api/v1/analytics/inventory",
    summary = "Inventory snapshot",
    responses(
        (status = 200, description = "Totals plus low and out-of-stock counts", body = ApiResponse<InventorySnapshot>),
    ),
    security(("Bearer" = []))
)]
pub async fn inventory_snapshot(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<InventorySnapshot> {
    let restaurant_id = user.tenant_id()?;
    let snapshot = state
        .services
        .analytics
        .inventory_snapshot(restaurant_id)
        .await?;
    Ok(Json(ApiResponse::success(snapshot)))
}
