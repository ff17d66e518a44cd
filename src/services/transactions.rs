//! Financial transaction records. Rows are written by order payment and
//! read here; there is no edit path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::transaction;
use crate::errors::ServiceError;

/// Accepted payment instruments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub total: Decimal,
    pub tax: Decimal,
    pub payment_method: String,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct TransactionService {
    db: Arc<DbPool>,
}

impl TransactionService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_transactions(
        &self,
        restaurant_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<TransactionListResponse, ServiceError> {
        let paginator = transaction::Entity::find()
            .filter(transaction::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator.num_items().await?;
        let transactions = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(|row| TransactionResponse {
                id: row.id,
                order_id: row.order_id,
                total: row.total,
                tax: row.tax,
                payment_method: row.payment_method,
                recorded_by: row.recorded_by,
                created_at: row.created_at,
            })
            .collect();

        Ok(TransactionListResponse {
            transactions,
            total,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_methods_round_trip_through_strings() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Card,
            PaymentMethod::Transfer,
        ] {
            let parsed: PaymentMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
        assert!("crypto".parse::<PaymentMethod>().is_err());
    }
}
