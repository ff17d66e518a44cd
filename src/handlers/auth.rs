//! Account endpoints: signup, setup completion, login and password reset.
//!
//! Everything except `/me` and `/setup` is reachable without a token; the
//! protected pair sits behind the auth middleware but carries no feature
//! gate, so accounts in `pending_setup` can still finish onboarding.

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthToken, CurrentUser};
use crate::errors::ServiceError;
use crate::services::tenants::{CompleteSetupRequest, SettingsResponse, SignupRequest, SignupResponse};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub auth: AuthToken,
    pub user: MeResponse,
}

/// The caller's resolved account, as the auth middleware sees it.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub account_type: String,
    pub restaurant_id: Option<Uuid>,
    pub permissions: serde_json::Value,
    pub tenant_status: Option<String>,
}

impl From<CurrentUser> for MeResponse {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            display_name: user.display_name,
            role: user.role.to_string(),
            account_type: if user.account_type == crate::auth::AccountType::It {
                "it".to_string()
            } else {
                "client".to_string()
            },
            restaurant_id: user.restaurant_id,
            permissions: user.permissions.to_stored(),
            tenant_status: user.tenant_status,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Returned directly until an email channel exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Routes that require no token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes behind the auth middleware but outside every feature gate.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/setup", post(complete_setup))
}

/// Register a restaurant and its admin account
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    summary = "Sign up",
    description = "Create a restaurant in pending_setup together with its admin account",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Tenant registered", body = ApiResponse<SignupResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse),
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<SignupResponse> {
    let response = state.services.tenants.signup(request).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Finish onboarding and activate the tenant
#[utoipa::path(
    post,
    path = "/api/v1/auth/setup",
    summary = "Complete setup",
    request_body = CompleteSetupRequest,
    responses(
        (status = 200, description = "Tenant activated", body = ApiResponse<SettingsResponse>),
        (status = 400, description = "Setup already completed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn complete_setup(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CompleteSetupRequest>,
) -> ApiResult<SettingsResponse> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Only the restaurant admin can complete setup".to_string(),
        ));
    }
    let restaurant_id = user.tenant_id()?;
    let response = state
        .services
        .tenants
        .complete_setup(restaurant_id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid username or password", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    request.validate()?;
    let (account, auth) = state
        .services
        .auth
        .authenticate(&request.username, &request.password)
        .await?;

    let user = state.services.auth.snapshot(account.id).await?;

    info!(user_id = %account.id, "login");
    Ok(Json(ApiResponse::success(LoginResponse {
        auth,
        user: user.into(),
    })))
}

/// The authenticated account
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current account",
    responses(
        (status = 200, description = "Account snapshot", body = ApiResponse<MeResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me(user: CurrentUser) -> ApiResult<MeResponse> {
    Ok(Json(ApiResponse::success(user.into())))
}

/// Request a password reset token
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    summary = "Forgot password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Uniform acknowledgement", body = ApiResponse<ForgotPasswordResponse>),
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<ForgotPasswordResponse> {
    request.validate()?;
    // The response never reveals whether the username exists.
    let reset_token = state
        .services
        .auth
        .issue_reset_token(&request.username)
        .await?;
    if reset_token.is_none() {
        warn!(username = %request.username, "reset requested for unknown username");
    }
    Ok(Json(ApiResponse::success(ForgotPasswordResponse {
        message: "If the account exists, a reset token has been issued".to_string(),
        reset_token,
    })))
}

/// Redeem a reset token for a new password
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    summary = "Reset password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Invalid or expired token", body = crate::errors::ErrorResponse),
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<serde_json::Value> {
    request.validate()?;
    state
        .services
        .auth
        .reset_password(&request.token, &request.new_password)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Password has been reset"
    }))))
}
