//! Staff account endpoints. Employees carry a per-feature permission map;
//! the admin account itself is managed through settings, not here.

use axum::{
    extract::{Json, Path, State},
    routing::{post, put},
    Router,
};
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::employees::{
    CreateEmployeeRequest, EmployeeResponse, UpdateEmployeeRequest,
};
use crate::{ApiResponse, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/employees", post(create_employee).get(list_employees))
        .route(
            "/employees/:id",
            put(update_employee).delete(deactivate_employee),
        )
        .with_feature(keys::EMPLOYEES)
}

/// Create a staff account
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    summary = "Create employee",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 200, description = "Employee created", body = ApiResponse<EmployeeResponse>),
        (status = 400, description = "Unknown permission key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateEmployeeRequest>,
) -> ApiResult<EmployeeResponse> {
    let restaurant_id = user.tenant_id()?;
    let employee = state
        .services
        .employees
        .create_employee(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(employee)))
}

/// List staff accounts
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    summary = "List employees",
    responses(
        (status = 200, description = "All accounts of the tenant, admin included", body = ApiResponse<Vec<EmployeeResponse>>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_employees(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<EmployeeResponse>> {
    let restaurant_id = user.tenant_id()?;
    let employees = state.services.employees.list_employees(restaurant_id).await?;
    Ok(Json(ApiResponse::success(employees)))
}

/// Update a staff account
#[utoipa::path(
    put,
    path = "/api/v1/employees/{id}",
    summary = "Update employee",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated", body = ApiResponse<EmployeeResponse>),
        (status = 400, description = "Target is the admin or the caller", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> ApiResult<EmployeeResponse> {
    let restaurant_id = user.tenant_id()?;
    let employee = state
        .services
        .employees
        .update_employee(restaurant_id, user.user_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(employee)))
}

/// Deactivate a staff account
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{id}",
    summary = "Deactivate employee",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Account deactivated, tokens stop resolving", body = ApiResponse<EmployeeResponse>),
        (status = 400, description = "Target is the admin or the caller", body = crate::errors::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn deactivate_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<EmployeeResponse> {
    let restaurant_id = user.tenant_id()?;
    let employee = state
        .services
        .employees
        .deactivate_employee(restaurant_id, user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(employee)))
}
