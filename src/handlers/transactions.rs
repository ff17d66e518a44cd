//! Transaction ledger endpoint. Rows are written by order payment and are
//! never edited afterwards, so the surface is read-only.

use axum::{
    extract::{Json, Query, State},
    routing::get,
    Router,
};

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::transactions::TransactionListResponse;
use crate::{ApiResponse, ApiResult, AppState, ListQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .with_feature(keys::TRANSACTIONS)
}

/// List payment transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    summary = "List transactions",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated transactions, newest first", body = ApiResponse<TransactionListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<TransactionListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = query.window(&state.config);
    let transactions = state
        .services
        .transactions
        .list_transactions(restaurant_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}
