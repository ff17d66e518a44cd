//! Menu item management. Prices are VAT-exclusive on input; the service
//! derives the VAT amount and the inclusive total at the configured rate.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{menu_item, recipe};
use crate::errors::ServiceError;
use crate::services::stock_validator::Portion;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateMenuItemRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    pub base_price: Decimal,
    pub recipe_id: Option<Uuid>,
    #[serde(default)]
    pub portion: Portion,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMenuItemRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub base_price: Option<Decimal>,
    pub recipe_id: Option<Uuid>,
    pub portion: Option<Portion>,
    pub is_available: Option<bool>,
}

/// One entry of a bulk sort-order update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MenuSortEntry {
    pub id: Uuid,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMenuOrderRequest {
    #[validate(length(min = 1, message = "At least one entry is required"))]
    pub items: Vec<MenuSortEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuItemResponse {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub vat_amount: Decimal,
    pub total_price: Decimal,
    pub recipe_id: Option<Uuid>,
    pub portion: Portion,
    pub sort_order: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuListResponse {
    pub items: Vec<MenuItemResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// VAT-exclusive base price to (VAT amount, inclusive total).
pub fn derive_prices(base_price: Decimal, tax_rate: Decimal) -> (Decimal, Decimal) {
    let vat = (base_price * tax_rate)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (vat, base_price + vat)
}

/// Reject duplicate ids in a sort payload before anything is written.
pub fn check_unique_ids(entries: &[MenuSortEntry]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.id) {
            return Err(ServiceError::ValidationError(format!(
                "Duplicate menu item id {} in sort payload",
                entry.id
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct MenuService {
    db: Arc<DbPool>,
    tax_rate: Decimal,
}

impl MenuService {
    pub fn new(db: Arc<DbPool>, tax_rate: Decimal) -> Self {
        Self { db, tax_rate }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, name = %request.name))]
    pub async fn create_menu_item(
        &self,
        restaurant_id: Uuid,
        request: CreateMenuItemRequest,
    ) -> Result<MenuItemResponse, ServiceError> {
        request.validate()?;
        if request.base_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Base price cannot be negative".to_string(),
            ));
        }
        if let Some(recipe_id) = request.recipe_id {
            self.check_recipe(restaurant_id, recipe_id).await?;
        }

        let (vat_amount, total_price) = derive_prices(request.base_price, self.tax_rate);
        let sort_order = self.next_sort_order(restaurant_id).await?;

        let item = menu_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            name: Set(request.name),
            base_price: Set(request.base_price),
            vat_amount: Set(vat_amount),
            total_price: Set(total_price),
            recipe_id: Set(request.recipe_id),
            portion: Set(request.portion.to_string()),
            sort_order: Set(sort_order),
            is_available: Set(request.is_available),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(item_id = %item.id, "menu item created");
        build_response(item)
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_menu_items(
        &self,
        restaurant_id: Uuid,
        available_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<MenuListResponse, ServiceError> {
        let mut query = menu_item::Entity::find()
            .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(menu_item::Column::SortOrder)
            .order_by_asc(menu_item::Column::Name);
        if available_only {
            query = query.filter(menu_item::Column::IsAvailable.eq(true));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(build_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MenuListResponse {
            items,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %item_id))]
    pub async fn update_menu_item(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
        request: UpdateMenuItemRequest,
    ) -> Result<MenuItemResponse, ServiceError> {
        request.validate()?;
        if let Some(base) = request.base_price {
            if base < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Base price cannot be negative".to_string(),
                ));
            }
        }
        if let Some(recipe_id) = request.recipe_id {
            self.check_recipe(restaurant_id, recipe_id).await?;
        }

        let item = self.find_owned(restaurant_id, item_id).await?;
        let mut active: menu_item::ActiveModel = item.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(base) = request.base_price {
            let (vat, total) = derive_prices(base, self.tax_rate);
            active.base_price = Set(base);
            active.vat_amount = Set(vat);
            active.total_price = Set(total);
        }
        if let Some(recipe_id) = request.recipe_id {
            active.recipe_id = Set(Some(recipe_id));
        }
        if let Some(portion) = request.portion {
            active.portion = Set(portion.to_string());
        }
        if let Some(available) = request.is_available {
            active.is_available = Set(available);
        }

        let updated = active.update(self.db.as_ref()).await?;
        build_response(updated)
    }

    /// Apply a bulk sort-order update. Every referenced id is verified to
    /// belong to the tenant before any row changes.
    #[instrument(skip(self, request), fields(%restaurant_id, entries = request.items.len()))]
    pub async fn update_menu_order(
        &self,
        restaurant_id: Uuid,
        request: UpdateMenuOrderRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        check_unique_ids(&request.items)?;

        let ids: Vec<Uuid> = request.items.iter().map(|entry| entry.id).collect();
        let owned = menu_item::Entity::find()
            .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
            .filter(menu_item::Column::Id.is_in(ids.clone()))
            .count(self.db.as_ref())
            .await?;
        if owned != ids.len() as u64 {
            return Err(ServiceError::NotFound(
                "One or more menu items were not found".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        for entry in &request.items {
            menu_item::Entity::update_many()
                .col_expr(
                    menu_item::Column::SortOrder,
                    sea_orm::sea_query::Expr::value(entry.sort_order),
                )
                .filter(menu_item::Column::Id.eq(entry.id))
                .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        info!(%restaurant_id, entries = request.items.len(), "menu order updated");
        Ok(())
    }

    async fn find_owned(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<menu_item::Model, ServiceError> {
        menu_item::Entity::find_by_id(item_id)
            .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Menu item not found".to_string()))
    }

    async fn check_recipe(&self, restaurant_id: Uuid, recipe_id: Uuid) -> Result<(), ServiceError> {
        recipe::Entity::find_by_id(recipe_id)
            .filter(recipe::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound("Recipe not found".to_string()))
    }

    async fn next_sort_order(&self, restaurant_id: Uuid) -> Result<i32, ServiceError> {
        let max: Option<Option<i32>> = menu_item::Entity::find()
            .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
            .select_only()
            .column_as(menu_item::Column::SortOrder.max(), "max_sort_order")
            .into_tuple()
            .one(self.db.as_ref())
            .await?;
        Ok(max.flatten().unwrap_or(-1) + 1)
    }
}

fn build_response(item: menu_item::Model) -> Result<MenuItemResponse, ServiceError> {
    Ok(MenuItemResponse {
        id: item.id,
        name: item.name,
        base_price: item.base_price,
        vat_amount: item.vat_amount,
        total_price: item.total_price,
        recipe_id: item.recipe_id,
        portion: Portion::from_stored(&item.portion)?,
        sort_order: item.sort_order,
        is_available: item.is_available,
        created_at: item.created_at,
        updated_at: item.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn prices_derive_vat_and_inclusive_total() {
        let (vat, total) = derive_prices(dec!(100), dec!(0.15));
        assert_eq!(vat, dec!(15.00));
        assert_eq!(total, dec!(115.00));

        let (vat, total) = derive_prices(dec!(9.99), dec!(0.15));
        assert_eq!(vat, dec!(1.50));
        assert_eq!(total, dec!(11.49));
    }

    #[test]
    fn zero_rate_means_no_vat() {
        let (vat, total) = derive_prices(dec!(42), Decimal::ZERO);
        assert_eq!(vat, Decimal::ZERO);
        assert_eq!(total, dec!(42));
    }

    #[test]
    fn duplicate_sort_ids_are_rejected() {
        let id = Uuid::new_v4();
        let entries = vec![
            MenuSortEntry { id, sort_order: 0 },
            MenuSortEntry {
                id: Uuid::new_v4(),
                sort_order: 1,
            },
            MenuSortEntry { id, sort_order: 2 },
        ];
        assert!(matches!(
            check_unique_ids(&entries),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
