//! Tenant settings endpoints. The VAT registration number set here is what
//! later lands inside every invoice QR payload.

use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::tenants::{SettingsResponse, UpdateSettingsRequest};
use crate::{ApiResponse, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .with_feature(keys::SETTINGS)
}

/// Current tenant profile
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "Get settings",
    responses(
        (status = 200, description = "Tenant profile and subscription state", body = ApiResponse<SettingsResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<SettingsResponse> {
    let restaurant_id = user.tenant_id()?;
    let settings = state.services.tenants.get_settings(restaurant_id).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Update the tenant profile
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    summary = "Update settings",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = ApiResponse<SettingsResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<SettingsResponse> {
    let restaurant_id = user.tenant_id()?;
    let settings = state
        .services
        .tenants
        .update_settings(restaurant_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(settings)))
}
