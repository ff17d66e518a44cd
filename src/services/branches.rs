//! Branch management. Branch creation is capped by the tenant's
//! subscription `branch_limit`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{branch, restaurant};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BranchResponse {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<branch::Model> for BranchResponse {
    fn from(model: branch::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            location: model.location,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone)]
pub struct BranchService {
    db: Arc<DbPool>,
}

impl BranchService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, name = %request.name))]
    pub async fn create_branch(
        &self,
        restaurant_id: Uuid,
        request: CreateBranchRequest,
    ) -> Result<BranchResponse, ServiceError> {
        request.validate()?;

        let tenant = restaurant::Entity::find_by_id(restaurant_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Restaurant not found".to_string()))?;

        let existing = branch::Entity::find()
            .filter(branch::Column::RestaurantId.eq(restaurant_id))
            .count(self.db.as_ref())
            .await?;
        if existing >= tenant.branch_limit as u64 {
            return Err(ServiceError::InvalidOperation(format!(
                "Branch limit reached: the current plan allows {} branches",
                tenant.branch_limit
            )));
        }

        let created = branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            name: Set(request.name),
            location: Set(request.location),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(branch_id = %created.id, "branch created");
        Ok(created.into())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_branches(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<BranchResponse>, ServiceError> {
        let branches = branch::Entity::find()
            .filter(branch::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(branch::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(branches.into_iter().map(BranchResponse::from).collect())
    }
}
