//! Employee accounts and their per-feature permission maps.
//!
//! Permission maps are normalized on every write through the strict
//! request-side parser, so stored rows only ever contain known feature
//! keys. Edits take effect on the target's next request because access is
//! checked against the database, not the token.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{permissions, AuthService, PermissionSet, PermissionValue, UserRole};
use crate::db::DbPool;
use crate::entities::user;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
    /// Feature key to grant, either a legacy boolean or a granular record.
    #[serde(default)]
    pub permissions: HashMap<String, PermissionValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmployeeRequest {
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub permissions: Option<HashMap<String, PermissionValue>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub permissions: serde_json::Value,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for EmployeeResponse {
    fn from(model: user::Model) -> Self {
        // Normalize on the way out so clients never see legacy shapes.
        let permissions = PermissionSet::from_stored(&model.permissions).to_stored();
        Self {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            role: model.role,
            permissions,
            is_active: model.is_active,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
        }
    }
}

/// Operator-console features are never assignable to tenant staff.
fn check_staff_scope<'a>(
    mut keys: impl Iterator<Item = &'a String>,
) -> Result<(), ServiceError> {
    if let Some(key) = keys.find(|key| permissions::is_it_feature(key)) {
        return Err(ServiceError::ValidationError(format!(
            "Feature `{key}` cannot be granted to restaurant staff"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DbPool>,
    auth: AuthService,
}

impl EmployeeService {
    pub fn new(db: Arc<DbPool>, auth: AuthService) -> Self {
        Self { db, auth }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, username = %request.username))]
    pub async fn create_employee(
        &self,
        restaurant_id: Uuid,
        request: CreateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request.validate()?;
        check_staff_scope(request.permissions.keys())?;
        let permissions = PermissionSet::from_request(&request.permissions)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(request.username.clone()))
            .count(self.db.as_ref())
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(
                "Username is already taken".to_string(),
            ));
        }

        let password_hash = self.auth.hash_password(&request.password)?;
        let employee = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            password_hash: Set(password_hash),
            display_name: Set(request.display_name),
            role: Set(UserRole::Employee.to_string()),
            permissions: Set(permissions.to_stored()),
            restaurant_id: Set(Some(restaurant_id)),
            is_active: Set(true),
            last_login_at: Set(None),
            reset_token_digest: Set(None),
            reset_token_expires_at: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        info!(employee_id = %employee.id, "employee created");
        Ok(employee.into())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_employees(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<EmployeeResponse>, ServiceError> {
        let users = user::Entity::find()
            .filter(user::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(users.into_iter().map(EmployeeResponse::from).collect())
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %employee_id, %actor_id))]
    pub async fn update_employee(
        &self,
        restaurant_id: Uuid,
        actor_id: Uuid,
        employee_id: Uuid,
        request: UpdateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request.validate()?;
        let target = self.find_employee(restaurant_id, employee_id).await?;

        if request.is_active == Some(false) && employee_id == actor_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let mut active: user::ActiveModel = target.into();
        if let Some(display_name) = request.display_name {
            active.display_name = Set(Some(display_name));
        }
        if let Some(password) = request.password {
            active.password_hash = Set(self.auth.hash_password(&password)?);
        }
        if let Some(raw) = request.permissions {
            check_staff_scope(raw.keys())?;
            let permissions = PermissionSet::from_request(&raw)
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            active.permissions = Set(permissions.to_stored());
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    /// Disable the account. Takes effect on the target's next request; the
    /// caller cannot lock themselves out.
    #[instrument(skip(self), fields(%restaurant_id, %employee_id, %actor_id))]
    pub async fn deactivate_employee(
        &self,
        restaurant_id: Uuid,
        actor_id: Uuid,
        employee_id: Uuid,
    ) -> Result<EmployeeResponse, ServiceError> {
        if employee_id == actor_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        let target = self.find_employee(restaurant_id, employee_id).await?;
        let mut active: user::ActiveModel = target.into();
        active.is_active = Set(false);
        let updated = active.update(self.db.as_ref()).await?;

        info!(employee_id = %updated.id, "employee deactivated");
        Ok(updated.into())
    }

    /// Resolve the target inside the tenant. Admin accounts are managed
    /// through settings, not the employee endpoints.
    async fn find_employee(
        &self,
        restaurant_id: Uuid,
        employee_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        let target = user::Entity::find_by_id(employee_id)
            .filter(user::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Employee not found".to_string()))?;
        if UserRole::parse(&target.role) == UserRole::Admin {
            return Err(ServiceError::InvalidOperation(
                "Admin accounts cannot be modified through employee management".to_string(),
            ));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_normalizes_legacy_permissions() {
        let model = user::Model {
            id: Uuid::new_v4(),
            username: "cashier1".to_string(),
            password_hash: "x".to_string(),
            display_name: None,
            role: "employee".to_string(),
            permissions: json!({"pos": true, "bogus_key": true}),
            restaurant_id: Some(Uuid::new_v4()),
            is_active: true,
            last_login_at: None,
            reset_token_digest: None,
            reset_token_expires_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let response = EmployeeResponse::from(model);
        let map = response.permissions.as_object().unwrap();
        assert!(map.contains_key("pos"));
        assert!(!map.contains_key("bogus_key"));
    }

    #[test]
    fn it_features_are_not_grantable_to_staff() {
        let keys = ["pos".to_string(), "it_dashboard".to_string()];
        let err = check_staff_scope(keys.iter()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let keys = ["pos".to_string(), "chat".to_string()];
        assert!(check_staff_scope(keys.iter()).is_ok());
    }
}
