//! Tenant lifecycle: two-phase signup, settings.
//!
//! Signup creates the restaurant in `pending_setup` together with its admin
//! account; `complete_setup` provisions the defaults (first branch, the
//! `general` chat channel) and only then activates the tenant, so a failed
//! provisioning run can be retried while the account is still gated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthService, AuthToken, PermissionSet, UserRole};
use crate::db::DbPool;
use crate::entities::{branch, restaurant, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::chat::seed_default_channel;

pub const STATUS_PENDING_SETUP: &str = "pending_setup";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_SUSPENDED: &str = "suspended";

/// What kind of business the tenant runs. Factories get the same feature
/// set; the distinction drives front-end labeling only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BusinessType {
    #[default]
    Restaurant,
    Factory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 120, message = "Restaurant name is required"))]
    pub restaurant_name: String,
    #[serde(default)]
    pub business_type: BusinessType,
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CompleteSetupRequest {
    #[validate(length(min = 1, max = 120))]
    pub branch_name: Option<String>,
    #[validate(length(max = 255))]
    pub branch_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub vat_registration_number: Option<String>,
    pub business_type: Option<BusinessType>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub id: Uuid,
    pub name: String,
    pub business_type: String,
    pub vat_registration_number: Option<String>,
    pub status: String,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub branch_limit: i32,
    pub created_at: DateTime<Utc>,
}

impl From<restaurant::Model> for SettingsResponse {
    fn from(model: restaurant::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            business_type: model.business_type,
            vat_registration_number: model.vat_registration_number,
            status: model.status,
            subscription_plan: model.subscription_plan,
            subscription_status: model.subscription_status,
            branch_limit: model.branch_limit,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignupResponse {
    pub restaurant: SettingsResponse,
    pub user: SignupAccount,
    pub auth: AuthToken,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignupAccount {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
}

#[derive(Clone)]
pub struct TenantService {
    db: Arc<DbPool>,
    auth: AuthService,
    events: Option<EventSender>,
}

impl TenantService {
    pub fn new(db: Arc<DbPool>, auth: AuthService, events: Option<EventSender>) -> Self {
        Self { db, auth, events }
    }

    /// Register a tenant and its admin account in one transaction. The
    /// tenant starts in `pending_setup`; feature routes stay closed until
    /// [`complete_setup`](Self::complete_setup) runs.
    #[instrument(skip(self, request), fields(restaurant_name = %request.restaurant_name, username = %request.username))]
    pub async fn signup(&self, request: SignupRequest) -> Result<SignupResponse, ServiceError> {
        request.validate()?;

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

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin signup transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let tenant = restaurant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.restaurant_name),
            business_type: Set(request.business_type.to_string()),
            vat_registration_number: Set(None),
            status: Set(STATUS_PENDING_SETUP.to_string()),
            subscription_plan: Set("basic".to_string()),
            subscription_status: Set(STATUS_ACTIVE.to_string()),
            branch_limit: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let admin = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            password_hash: Set(password_hash),
            display_name: Set(request.display_name),
            role: Set(UserRole::Admin.to_string()),
            permissions: Set(PermissionSet::all_client_features().to_stored()),
            restaurant_id: Set(Some(tenant.id)),
            is_active: Set(true),
            last_login_at: Set(None),
            reset_token_digest: Set(None),
            reset_token_expires_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit signup transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let auth = self.auth.generate_token(&admin)?;
        info!(restaurant_id = %tenant.id, user_id = %admin.id, "tenant signed up");

        Ok(SignupResponse {
            restaurant: tenant.into(),
            user: SignupAccount {
                id: admin.id,
                username: admin.username,
                display_name: admin.display_name,
                role: admin.role,
            },
            auth,
        })
    }

    /// Provision defaults and activate the tenant. The branch and the
    /// `general` channel are created before the status flips, inside one
    /// transaction, so a tenant is never active without its defaults.
    #[instrument(skip(self, request), fields(%restaurant_id, %admin_id))]
    pub async fn complete_setup(
        &self,
        restaurant_id: Uuid,
        admin_id: Uuid,
        request: CompleteSetupRequest,
    ) -> Result<SettingsResponse, ServiceError> {
        request.validate()?;

        let tenant = self.find_tenant(restaurant_id).await?;
        match tenant.status.as_str() {
            STATUS_PENDING_SETUP => {}
            STATUS_ACTIVE => {
                return Err(ServiceError::InvalidOperation(
                    "Setup has already been completed".to_string(),
                ))
            }
            _ => {
                return Err(ServiceError::InvalidOperation(
                    "This restaurant account is suspended".to_string(),
                ))
            }
        }

        let txn = self.db.begin().await?;

        if let Some(branch_name) = request.branch_name {
            branch::ActiveModel {
                id: Set(Uuid::new_v4()),
                restaurant_id: Set(restaurant_id),
                name: Set(branch_name),
                location: Set(request.branch_location),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        seed_default_channel(&txn, restaurant_id, admin_id).await?;

        let mut active: restaurant::ActiveModel = tenant.into();
        active.status = Set(STATUS_ACTIVE.to_string());
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit setup transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(%restaurant_id, "tenant setup completed");
        Ok(updated.into())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn get_settings(&self, restaurant_id: Uuid) -> Result<SettingsResponse, ServiceError> {
        Ok(self.find_tenant(restaurant_id).await?.into())
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %updated_by))]
    pub async fn update_settings(
        &self,
        restaurant_id: Uuid,
        updated_by: Uuid,
        request: UpdateSettingsRequest,
    ) -> Result<SettingsResponse, ServiceError> {
        request.validate()?;

        let tenant = self.find_tenant(restaurant_id).await?;
        let mut active: restaurant::ActiveModel = tenant.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(vat_number) = request.vat_registration_number {
            active.vat_registration_number = Set(Some(vat_number));
        }
        if let Some(business_type) = request.business_type {
            active.business_type = Set(business_type.to_string());
        }
        let updated = active.update(self.db.as_ref()).await?;

        if let Some(events) = &self.events {
            events
                .publish(Event::SettingsUpdated {
                    restaurant_id,
                    updated_by,
                })
                .await;
        }

        Ok(updated.into())
    }

    async fn find_tenant(&self, restaurant_id: Uuid) -> Result<restaurant::Model, ServiceError> {
        restaurant::Entity::find_by_id(restaurant_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Restaurant not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_type_round_trips_through_storage() {
        assert_eq!(BusinessType::Restaurant.to_string(), "restaurant");
        assert_eq!(BusinessType::Factory.to_string(), "factory");
        assert_eq!(
            "factory".parse::<BusinessType>().ok(),
            Some(BusinessType::Factory)
        );
    }

    #[test]
    fn signup_request_rejects_short_password() {
        let request = SignupRequest {
            restaurant_name: "Al Baik".to_string(),
            business_type: BusinessType::Restaurant,
            username: "owner".to_string(),
            password: "short".to_string(),
            display_name: None,
        };
        assert!(request.validate().is_err());
    }
}
