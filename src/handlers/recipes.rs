//! Recipe endpoints. A recipe maps a dish to the ingredient quantities the
//! stock validator deducts when the dish is sold.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::recipes::{
    CreateRecipeRequest, RecipeListResponse, RecipeResponse, UpdateRecipeRequest,
};
use crate::{ApiResponse, ApiResult, AppState, ListQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe).get(list_recipes))
        .route("/recipes/:id", get(get_recipe).put(update_recipe))
        .with_feature(keys::RECIPES)
}

/// Create a recipe
#[utoipa::path(
    post,
    path = "/api/v1/recipes",
    summary = "Create recipe",
    request_body = CreateRecipeRequest,
    responses(
        (status = 200, description = "Recipe created", body = ApiResponse<RecipeResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateRecipeRequest>,
) -> ApiResult<RecipeResponse> {
    let restaurant_id = user.tenant_id()?;
    let recipe = state
        .services
        .recipes
        .create_recipe(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(recipe)))
}

/// List recipes
#[utoipa::path(
    get,
    path = "/api/v1/recipes",
    summary = "List recipes",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated recipes with resolved ingredients", body = ApiResponse<RecipeListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_recipes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<RecipeListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = query.window(&state.config);
    let recipes = state
        .services
        .recipes
        .list_recipes(restaurant_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(recipes)))
}

/// Fetch one recipe
#[utoipa::path(
    get,
    path = "/api/v1/recipes/{id}",
    summary = "Get recipe",
    params(("id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe with ingredients and unit cost", body = ApiResponse<RecipeResponse>),
        (status = 404, description = "Recipe not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RecipeResponse> {
    let restaurant_id = user.tenant_id()?;
    let recipe = state.services.recipes.get_recipe(restaurant_id, id).await?;
    Ok(Json(ApiResponse::success(recipe)))
}

/// Replace a recipe's ingredient list or rename it
#[utoipa::path(
    put,
    path = "/api/v1/recipes/{id}",
    summary = "Update recipe",
    params(("id" = Uuid, Path, description = "Recipe id")),
    request_body = UpdateRecipeRequest,
    responses(
        (status = 200, description = "Recipe updated", body = ApiResponse<RecipeResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Recipe or ingredient not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_recipe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRecipeRequest>,
) -> ApiResult<RecipeResponse> {
    let restaurant_id = user.tenant_id()?;
    let recipe = state
        .services
        .recipes
        .update_recipe(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(recipe)))
}
