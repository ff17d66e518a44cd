//! Inventory item management: CRUD, stock receipts and the derived
//! in-stock / low-stock status. Deduction happens in the order
//! orchestrator, never here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{branch, inventory_item};
use crate::errors::ServiceError;

/// Derived stock status; nothing is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
}

impl StockStatus {
    pub fn of(item: &inventory_item::Model) -> Self {
        if item.is_low_stock() {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 20, message = "Unit is required"))]
    pub unit: String,
    #[serde(default)]
    pub cost_per_unit: Decimal,
    #[serde(default)]
    pub low_stock_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateInventoryItemRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    /// Manual stock correction; receipts go through `receive`
    pub quantity: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub low_stock_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReceiveStockRequest {
    pub quantity: Decimal,
    /// New cost per unit when the receipt re-prices the item
    pub cost_per_unit: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InventoryItemResponse {
    pub id: Uuid,
    pub branch_id: Option<Uuid>,
    pub name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub cost_per_unit: Decimal,
    pub low_stock_threshold: Decimal,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<inventory_item::Model> for InventoryItemResponse {
    fn from(item: inventory_item::Model) -> Self {
        let status = StockStatus::of(&item);
        Self {
            id: item.id,
            branch_id: item.branch_id,
            name: item.name,
            quantity: item.quantity,
            unit: item.unit,
            cost_per_unit: item.cost_per_unit,
            low_stock_threshold: item.low_stock_threshold,
            status,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InventoryListResponse {
    pub items: Vec<InventoryItemResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, name = %request.name))]
    pub async fn create_item(
        &self,
        restaurant_id: Uuid,
        request: CreateInventoryItemRequest,
    ) -> Result<InventoryItemResponse, ServiceError> {
        request.validate()?;
        check_non_negative("quantity", request.quantity)?;
        check_non_negative("cost_per_unit", request.cost_per_unit)?;
        check_non_negative("low_stock_threshold", request.low_stock_threshold)?;

        if let Some(branch_id) = request.branch_id {
            self.check_branch(restaurant_id, branch_id).await?;
        }

        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            branch_id: Set(request.branch_id),
            name: Set(request.name),
            quantity: Set(request.quantity),
            unit: Set(request.unit),
            cost_per_unit: Set(request.cost_per_unit),
            low_stock_threshold: Set(request.low_stock_threshold),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(item_id = %item.id, "inventory item created");
        Ok(item.into())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_items(
        &self,
        restaurant_id: Uuid,
        branch_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<InventoryListResponse, ServiceError> {
        let mut query = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(inventory_item::Column::Name);
        if let Some(branch_id) = branch_id {
            query = query.filter(inventory_item::Column::BranchId.eq(branch_id));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(InventoryItemResponse::from)
            .collect();

        Ok(InventoryListResponse {
            items,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %item_id))]
    pub async fn update_item(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
        request: UpdateInventoryItemRequest,
    ) -> Result<InventoryItemResponse, ServiceError> {
        request.validate()?;
        for (field, value) in [
            ("quantity", request.quantity),
            ("cost_per_unit", request.cost_per_unit),
            ("low_stock_threshold", request.low_stock_threshold),
        ] {
            if let Some(value) = value {
                check_non_negative(field, value)?;
            }
        }

        let item = self.find_owned(restaurant_id, item_id).await?;
        let mut active: inventory_item::ActiveModel = item.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(cost) = request.cost_per_unit {
            active.cost_per_unit = Set(cost);
        }
        if let Some(threshold) = request.low_stock_threshold {
            active.low_stock_threshold = Set(threshold);
        }

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    /// Record a stock receipt: an atomic increment, so concurrent receipts
    /// and order deductions never lose an update.
    #[instrument(skip(self, request), fields(%restaurant_id, %item_id, quantity = %request.quantity))]
    pub async fn receive_stock(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
        request: ReceiveStockRequest,
    ) -> Result<InventoryItemResponse, ServiceError> {
        request.validate()?;
        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Received quantity must be positive".to_string(),
            ));
        }
        if let Some(cost) = request.cost_per_unit {
            check_non_negative("cost_per_unit", cost)?;
        }

        let result = inventory_item::Entity::update_many()
            .col_expr(
                inventory_item::Column::Quantity,
                Expr::col(inventory_item::Column::Quantity).add(request.quantity),
            )
            .filter(inventory_item::Column::Id.eq(item_id))
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Inventory item not found".to_string()));
        }

        let item = self.find_owned(restaurant_id, item_id).await?;
        let item = if let Some(cost) = request.cost_per_unit {
            let mut active: inventory_item::ActiveModel = item.into();
            active.cost_per_unit = Set(cost);
            active.update(self.db.as_ref()).await?
        } else {
            item
        };

        info!(item_id = %item.id, quantity = %item.quantity, "stock received");
        Ok(item.into())
    }

    /// Items at or below their low-stock threshold, for the analytics
    /// report and dashboard warnings.
    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn low_stock_items(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<InventoryItemResponse>, ServiceError> {
        let items = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .filter(
                Expr::col(inventory_item::Column::Quantity)
                    .lte(Expr::col(inventory_item::Column::LowStockThreshold)),
            )
            .order_by_asc(inventory_item::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(items.into_iter().map(InventoryItemResponse::from).collect())
    }

    async fn find_owned(
        &self,
        restaurant_id: Uuid,
        item_id: Uuid,
    ) -> Result<inventory_item::Model, ServiceError> {
        inventory_item::Entity::find_by_id(item_id)
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Inventory item not found".to_string()))
    }

    async fn check_branch(&self, restaurant_id: Uuid, branch_id: Uuid) -> Result<(), ServiceError> {
        branch::Entity::find_by_id(branch_id)
            .filter(branch::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound("Branch not found".to_string()))
    }
}

fn check_non_negative(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{field} cannot be negative"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Decimal, threshold: Decimal) -> inventory_item::Model {
        inventory_item::Model {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            branch_id: None,
            name: "beef".to_string(),
            quantity,
            unit: "kg".to_string(),
            cost_per_unit: dec!(30),
            low_stock_threshold: threshold,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn status_is_low_at_or_below_the_threshold() {
        assert_eq!(StockStatus::of(&item(dec!(10), dec!(2))), StockStatus::InStock);
        assert_eq!(StockStatus::of(&item(dec!(2), dec!(2))), StockStatus::LowStock);
        assert_eq!(StockStatus::of(&item(dec!(0), dec!(2))), StockStatus::LowStock);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(check_non_negative("quantity", dec!(0)).is_ok());
        assert!(matches!(
            check_non_negative("quantity", dec!(-0.5)),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
