//! Branch endpoints. The subscription plan caps how many branches a tenant
//! may open; the cap lives on the restaurant row and IT can raise it.

use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::branches::{BranchResponse, CreateBranchRequest};
use crate::{ApiResponse, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/branches", post(create_branch).get(list_branches))
        .with_feature(keys::BRANCHES)
}

/// Open a branch
#[utoipa::path(
    post,
    path = "/api/v1/branches",
    summary = "Create branch",
    request_body = CreateBranchRequest,
    responses(
        (status = 200, description = "Branch created", body = ApiResponse<BranchResponse>),
        (status = 400, description = "Branch limit reached", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_branch(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateBranchRequest>,
) -> ApiResult<BranchResponse> {
    let restaurant_id = user.tenant_id()?;
    let branch = state
        .services
        .branches
        .create_branch(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(branch)))
}

/// List branches oldest first
#[utoipa::path(
    get,
    path = "/api/v1/branches",
    summary = "List branches",
    responses(
        (status = 200, description = "All branches of the tenant", body = ApiResponse<Vec<BranchResponse>>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_branches(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<BranchResponse>> {
    let restaurant_id = user.tenant_id()?;
    let branches = state.services.branches.list_branches(restaurant_id).await?;
    Ok(Json(ApiResponse::success(branches)))
}
