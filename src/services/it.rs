//! Cross-tenant operator tooling: the IT dashboard, per-tenant activity,
//! and subscription management. Everything here is reachable only through
//! IT-gated routes, so queries deliberately run without a tenant filter.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{order, restaurant, support_ticket, user};
use crate::errors::ServiceError;
use crate::services::orders::OrderStatus;
use crate::services::tenants::{STATUS_ACTIVE, STATUS_PENDING_SETUP, STATUS_SUSPENDED};
use crate::services::tickets::TicketStatus;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub total_restaurants: u64,
    pub active_restaurants: u64,
    pub pending_restaurants: u64,
    pub suspended_restaurants: u64,
    pub total_users: u64,
    pub open_tickets: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestaurantSummary {
    pub id: Uuid,
    pub name: String,
    pub business_type: String,
    pub status: String,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub branch_limit: i32,
    pub created_at: DateTime<Utc>,
}

impl From<restaurant::Model> for RestaurantSummary {
    fn from(model: restaurant::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            business_type: model.business_type,
            status: model.status,
            subscription_plan: model.subscription_plan,
            subscription_status: model.subscription_status,
            branch_limit: model.branch_limit,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestaurantListResponse {
    pub restaurants: Vec<RestaurantSummary>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// A tenant's activity over the trailing window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceEntry {
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub status: String,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 40))]
    pub subscription_plan: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub subscription_status: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Branch limit must be between 1 and 1000"))]
    pub branch_limit: Option<i32>,
    /// "active" or "suspended"
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct ItService {
    db: Arc<DbPool>,
}

impl ItService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardResponse, ServiceError> {
        let total_restaurants = restaurant::Entity::find().count(self.db.as_ref()).await?;
        let active_restaurants = self.count_by_status(STATUS_ACTIVE).await?;
        let pending_restaurants = self.count_by_status(STATUS_PENDING_SETUP).await?;
        let suspended_restaurants = self.count_by_status(STATUS_SUSPENDED).await?;
        let total_users = user::Entity::find().count(self.db.as_ref()).await?;
        let open_tickets = support_ticket::Entity::find()
            .filter(
                support_ticket::Column::Status
                    .is_in([TicketStatus::Open.to_string(), TicketStatus::InProgress.to_string()]),
            )
            .count(self.db.as_ref())
            .await?;

        Ok(DashboardResponse {
            total_restaurants,
            active_restaurants,
            pending_restaurants,
            suspended_restaurants,
            total_users,
            open_tickets,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_restaurants(
        &self,
        status: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<RestaurantListResponse, ServiceError> {
        let mut query = restaurant::Entity::find().order_by_desc(restaurant::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(restaurant::Column::Status.eq(status));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let restaurants = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(RestaurantSummary::from)
            .collect();

        Ok(RestaurantListResponse {
            restaurants,
            total,
            page,
            per_page,
        })
    }

    /// Orders and paid revenue per tenant over the last `window_days`,
    /// optionally narrowed to one tenant.
    #[instrument(skip(self))]
    pub async fn performance(
        &self,
        restaurant_id: Option<Uuid>,
        window_days: i64,
    ) -> Result<Vec<PerformanceEntry>, ServiceError> {
        let cutoff = Utc::now() - Duration::days(window_days);

        let mut tenants = restaurant::Entity::find().order_by_asc(restaurant::Column::Name);
        if let Some(id) = restaurant_id {
            tenants = tenants.filter(restaurant::Column::Id.eq(id));
        }
        let tenants = tenants.all(self.db.as_ref()).await?;
        if restaurant_id.is_some() && tenants.is_empty() {
            return Err(ServiceError::NotFound("Restaurant not found".to_string()));
        }

        let mut orders = order::Entity::find()
            .select_only()
            .column(order::Column::RestaurantId)
            .column_as(order::Column::Id.count(), "orders")
            .column_as(order::Column::Total.sum(), "revenue")
            .filter(order::Column::CreatedAt.gte(cutoff))
            .filter(order::Column::Status.is_in(
                [OrderStatus::Paid.to_string(), OrderStatus::Completed.to_string()],
            ))
            .group_by(order::Column::RestaurantId);
        if let Some(id) = restaurant_id {
            orders = orders.filter(order::Column::RestaurantId.eq(id));
        }
        let rows: Vec<(Uuid, i64, Option<Decimal>)> =
            orders.into_tuple().all(self.db.as_ref()).await?;

        Ok(tenants
            .into_iter()
            .map(|tenant| {
                let (orders, revenue) = rows
                    .iter()
                    .find(|(id, _, _)| *id == tenant.id)
                    .map(|(_, count, revenue)| {
                        (*count as u64, revenue.unwrap_or(Decimal::ZERO))
                    })
                    .unwrap_or((0, Decimal::ZERO));
                PerformanceEntry {
                    restaurant_id: tenant.id,
                    restaurant_name: tenant.name,
                    status: tenant.status,
                    orders,
                    revenue,
                }
            })
            .collect())
    }

    /// Subscription and lifecycle management. Activating a tenant that has
    /// not finished setup is rejected; it would skip default provisioning.
    #[instrument(skip(self, request), fields(%restaurant_id))]
    pub async fn update_account(
        &self,
        restaurant_id: Uuid,
        request: UpdateAccountRequest,
    ) -> Result<RestaurantSummary, ServiceError> {
        request.validate()?;

        let tenant = restaurant::Entity::find_by_id(restaurant_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Restaurant not found".to_string()))?;

        if let Some(status) = &request.status {
            match status.as_str() {
                STATUS_SUSPENDED => {}
                STATUS_ACTIVE => {
                    if tenant.status == STATUS_PENDING_SETUP {
                        return Err(ServiceError::InvalidOperation(
                            "This restaurant has not completed setup".to_string(),
                        ));
                    }
                }
                other => {
                    return Err(ServiceError::ValidationError(format!(
                        "Status must be `active` or `suspended`, got `{other}`"
                    )))
                }
            }
        }

        let mut active: restaurant::ActiveModel = tenant.into();
        if let Some(plan) = request.subscription_plan {
            active.subscription_plan = Set(plan);
        }
        if let Some(subscription_status) = request.subscription_status {
            active.subscription_status = Set(subscription_status);
        }
        if let Some(limit) = request.branch_limit {
            active.branch_limit = Set(limit);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        let updated = active.update(self.db.as_ref()).await?;

        info!(%restaurant_id, status = %updated.status, plan = %updated.subscription_plan, "account updated");
        Ok(updated.into())
    }

    async fn count_by_status(&self, status: &str) -> Result<u64, ServiceError> {
        Ok(restaurant::Entity::find()
            .filter(restaurant::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await?)
    }
}
