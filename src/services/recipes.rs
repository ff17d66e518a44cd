//! Recipes and their ordered ingredient lists. Cost is derived from the
//! referenced inventory items, never stored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{inventory_item, recipe, recipe_ingredient};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecipeIngredientInput {
    pub inventory_item_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 20, message = "Unit is required"))]
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "A recipe needs at least one ingredient"))]
    #[validate]
    pub ingredients: Vec<RecipeIngredientInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    /// Replaces the whole ingredient list when present
    #[validate]
    pub ingredients: Option<Vec<RecipeIngredientInput>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeIngredientResponse {
    pub inventory_item_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub cost: Decimal,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub name: String,
    pub ingredients: Vec<RecipeIngredientResponse>,
    /// Σ ingredient quantity × item cost per unit
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeListResponse {
    pub recipes: Vec<RecipeResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Cost of one recipe given its resolved ingredient rows.
pub fn recipe_cost(ingredients: &[RecipeIngredientResponse]) -> Decimal {
    ingredients.iter().map(|ing| ing.cost).sum()
}

#[derive(Clone)]
pub struct RecipeService {
    db: Arc<DbPool>,
}

impl RecipeService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, name = %request.name))]
    pub async fn create_recipe(
        &self,
        restaurant_id: Uuid,
        request: CreateRecipeRequest,
    ) -> Result<RecipeResponse, ServiceError> {
        request.validate()?;
        check_quantities(&request.ingredients)?;
        self.check_items_owned(restaurant_id, &request.ingredients)
            .await?;

        let now = Utc::now();
        let recipe_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        recipe::ActiveModel {
            id: Set(recipe_id),
            restaurant_id: Set(restaurant_id),
            name: Set(request.name.clone()),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        insert_ingredients(&txn, recipe_id, &request.ingredients, now).await?;
        txn.commit().await?;

        info!(%recipe_id, "recipe created");
        self.get_recipe(restaurant_id, recipe_id).await
    }

    #[instrument(skip(self), fields(%restaurant_id, %recipe_id))]
    pub async fn get_recipe(
        &self,
        restaurant_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<RecipeResponse, ServiceError> {
        let recipe = self.find_owned(restaurant_id, recipe_id).await?;
        let mut responses = self.build_responses(vec![recipe]).await?;
        responses
            .pop()
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".to_string()))
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_recipes(
        &self,
        restaurant_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<RecipeListResponse, ServiceError> {
        let paginator = recipe::Entity::find()
            .filter(recipe::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(recipe::Column::Name)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator.num_items().await?;
        let recipes = paginator.fetch_page(page.saturating_sub(1)).await?;
        let recipes = self.build_responses(recipes).await?;

        Ok(RecipeListResponse {
            recipes,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %recipe_id))]
    pub async fn update_recipe(
        &self,
        restaurant_id: Uuid,
        recipe_id: Uuid,
        request: UpdateRecipeRequest,
    ) -> Result<RecipeResponse, ServiceError> {
        request.validate()?;
        if let Some(ingredients) = &request.ingredients {
            if ingredients.is_empty() {
                return Err(ServiceError::ValidationError(
                    "A recipe needs at least one ingredient".to_string(),
                ));
            }
            check_quantities(ingredients)?;
            self.check_items_owned(restaurant_id, ingredients).await?;
        }

        let recipe = self.find_owned(restaurant_id, recipe_id).await?;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        if let Some(name) = request.name {
            let mut active: recipe::ActiveModel = recipe.into();
            active.name = Set(name);
            active.update(&txn).await?;
        }

        if let Some(ingredients) = &request.ingredients {
            recipe_ingredient::Entity::delete_many()
                .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
                .exec(&txn)
                .await?;
            insert_ingredients(&txn, recipe_id, ingredients, now).await?;
        }

        txn.commit().await?;
        self.get_recipe(restaurant_id, recipe_id).await
    }

    async fn find_owned(
        &self,
        restaurant_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<recipe::Model, ServiceError> {
        recipe::Entity::find_by_id(recipe_id)
            .filter(recipe::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".to_string()))
    }

    /// Every referenced inventory item must belong to the tenant.
    async fn check_items_owned(
        &self,
        restaurant_id: Uuid,
        ingredients: &[RecipeIngredientInput],
    ) -> Result<(), ServiceError> {
        let ids: Vec<Uuid> = ingredients.iter().map(|ing| ing.inventory_item_id).collect();
        let owned = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .filter(inventory_item::Column::Id.is_in(ids.clone()))
            .all(self.db.as_ref())
            .await?;
        let owned_ids: std::collections::HashSet<Uuid> =
            owned.into_iter().map(|item| item.id).collect();

        for id in ids {
            if !owned_ids.contains(&id) {
                return Err(ServiceError::NotFound(format!(
                    "Inventory item {id} not found"
                )));
            }
        }
        Ok(())
    }

    async fn build_responses(
        &self,
        recipes: Vec<recipe::Model>,
    ) -> Result<Vec<RecipeResponse>, ServiceError> {
        let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
        let mut rows_by_recipe: HashMap<Uuid, Vec<recipe_ingredient::Model>> = HashMap::new();
        let mut item_ids = Vec::new();
        if !recipe_ids.is_empty() {
            for row in recipe_ingredient::Entity::find()
                .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids))
                .order_by_asc(recipe_ingredient::Column::Position)
                .all(self.db.as_ref())
                .await?
            {
                item_ids.push(row.inventory_item_id);
                rows_by_recipe.entry(row.recipe_id).or_default().push(row);
            }
        }

        let items: HashMap<Uuid, inventory_item::Model> = if item_ids.is_empty() {
            HashMap::new()
        } else {
            inventory_item::Entity::find()
                .filter(inventory_item::Column::Id.is_in(item_ids))
                .all(self.db.as_ref())
                .await?
                .into_iter()
                .map(|item| (item.id, item))
                .collect()
        };

        let mut responses = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            let mut ingredients = Vec::new();
            for row in rows_by_recipe.remove(&recipe.id).unwrap_or_default() {
                let item = items.get(&row.inventory_item_id).ok_or_else(|| {
                    ServiceError::DataIntegrity(format!(
                        "recipe ingredient references missing item {}",
                        row.inventory_item_id
                    ))
                })?;
                ingredients.push(RecipeIngredientResponse {
                    inventory_item_id: row.inventory_item_id,
                    name: item.name.clone(),
                    quantity: row.quantity,
                    unit: row.unit,
                    cost: row.quantity * item.cost_per_unit,
                    position: row.position,
                });
            }
            let cost = recipe_cost(&ingredients);
            responses.push(RecipeResponse {
                id: recipe.id,
                name: recipe.name,
                ingredients,
                cost,
                created_at: recipe.created_at,
                updated_at: recipe.updated_at,
            });
        }
        Ok(responses)
    }
}

fn check_quantities(ingredients: &[RecipeIngredientInput]) -> Result<(), ServiceError> {
    for ingredient in ingredients {
        if ingredient.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Ingredient quantity must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

async fn insert_ingredients(
    txn: &sea_orm::DatabaseTransaction,
    recipe_id: Uuid,
    ingredients: &[RecipeIngredientInput],
    now: chrono::DateTime<Utc>,
) -> Result<(), ServiceError> {
    for (position, ingredient) in ingredients.iter().enumerate() {
        recipe_ingredient::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipe_id: Set(recipe_id),
            inventory_item_id: Set(ingredient.inventory_item_id),
            quantity: Set(ingredient.quantity),
            unit: Set(ingredient.unit.clone()),
            position: Set(position as i32),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ingredient(quantity: Decimal, cost: Decimal) -> RecipeIngredientResponse {
        RecipeIngredientResponse {
            inventory_item_id: Uuid::new_v4(),
            name: "beef".to_string(),
            quantity,
            unit: "kg".to_string(),
            cost: quantity * cost,
            position: 0,
        }
    }

    #[test]
    fn cost_sums_quantity_times_unit_cost() {
        let ingredients = vec![ingredient(dec!(0.2), dec!(30)), ingredient(dec!(0.05), dec!(8))];
        // 0.2 * 30 + 0.05 * 8
        assert_eq!(recipe_cost(&ingredients), dec!(6.40));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let bad = vec![RecipeIngredientInput {
            inventory_item_id: Uuid::new_v4(),
            quantity: dec!(0),
            unit: "kg".to_string(),
        }];
        assert!(matches!(
            check_quantities(&bad),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
