//! Tenant-scoped sales and inventory analytics.
//!
//! Revenue only counts orders that reached `paid` or `completed`;
//! cancelled orders are excluded everywhere. All money values come from
//! the totals stored on the order rows, so reports match what was charged
//! even after menu prices change.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::{Expr, JoinType};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{inventory_item, order, order_item};
use crate::errors::ServiceError;
use crate::services::orders::OrderStatus;

pub const DASHBOARD_WINDOW_DAYS: i64 = 30;
pub const DASHBOARD_TOP_ITEMS: u64 = 5;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Orders placed in the window, cancelled ones excluded.
    pub orders: u64,
    /// Orders that reached `paid` or `completed`.
    pub paid_orders: u64,
    pub revenue: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopItemEntry {
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InventorySnapshot {
    pub total_items: u64,
    pub low_stock_items: u64,
    pub out_of_stock_items: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsDashboard {
    pub sales: SalesSummary,
    pub top_items: Vec<TopItemEntry>,
    pub inventory: InventorySnapshot,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DbPool>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Everything the tenant dashboard shows, over the trailing 30 days.
    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn dashboard(&self, restaurant_id: Uuid) -> Result<AnalyticsDashboard, ServiceError> {
        let to = Utc::now();
        let from = to - Duration::days(DASHBOARD_WINDOW_DAYS);

        let sales = self.sales_summary(restaurant_id, from, to).await?;
        let top_items = self
            .top_items(restaurant_id, from, to, DASHBOARD_TOP_ITEMS)
            .await?;
        let inventory = self.inventory_snapshot(restaurant_id).await?;

        Ok(AnalyticsDashboard {
            sales,
            top_items,
            inventory,
            generated_at: to,
        })
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn sales_summary(
        &self,
        restaurant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SalesSummary, ServiceError> {
        if from > to {
            return Err(ServiceError::ValidationError(
                "`from` must not be after `to`".to_string(),
            ));
        }

        let orders = order::Entity::find()
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled.to_string()))
            .count(self.db.as_ref())
            .await?;

        let paid_orders = order::Entity::find()
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .filter(order::Column::Status.is_in(revenue_statuses()))
            .count(self.db.as_ref())
            .await?;

        let revenue: Option<Option<Decimal>> = order::Entity::find()
            .select_only()
            .column_as(order::Column::Total.sum(), "revenue")
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .filter(order::Column::Status.is_in(revenue_statuses()))
            .into_tuple()
            .one(self.db.as_ref())
            .await?;
        let revenue = revenue.flatten().unwrap_or(Decimal::ZERO);

        let average_order_value = if paid_orders > 0 {
            (revenue / Decimal::from(paid_orders))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };

        Ok(SalesSummary {
            from,
            to,
            orders,
            paid_orders,
            revenue,
            average_order_value,
        })
    }

    /// Best sellers by quantity across the window, line totals summed from
    /// the order-time snapshots.
    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn top_items(
        &self,
        restaurant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<TopItemEntry>, ServiceError> {
        let rows: Vec<(String, Option<i64>, Option<Decimal>)> = order_item::Entity::find()
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .select_only()
            .column(order_item::Column::Name)
            .column_as(order_item::Column::Quantity.sum(), "quantity")
            .column_as(order_item::Column::TotalPrice.sum(), "revenue")
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .filter(order::Column::CreatedAt.gte(from))
            .filter(order::Column::CreatedAt.lte(to))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled.to_string()))
            .group_by(order_item::Column::Name)
            .order_by_desc(Expr::cust("quantity"))
            .limit(limit)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, quantity, revenue)| TopItemEntry {
                name,
                quantity: quantity.unwrap_or(0),
                revenue: revenue.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn inventory_snapshot(
        &self,
        restaurant_id: Uuid,
    ) -> Result<InventorySnapshot, ServiceError> {
        let total_items = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .count(self.db.as_ref())
            .await?;

        let out_of_stock_items = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .filter(inventory_item::Column::Quantity.lte(Decimal::ZERO))
            .count(self.db.as_ref())
            .await?;

        let low_stock_items = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .filter(inventory_item::Column::Quantity.gt(Decimal::ZERO))
            .filter(
                Expr::col(inventory_item::Column::Quantity)
                    .lte(Expr::col(inventory_item::Column::LowStockThreshold)),
            )
            .count(self.db.as_ref())
            .await?;

        Ok(InventorySnapshot {
            total_items,
            low_stock_items,
            out_of_stock_items,
        })
    }
}

fn revenue_statuses() -> [String; 2] {
    [
        OrderStatus::Paid.to_string(),
        OrderStatus::Completed.to_string(),
    ]
}
