//! ZATCA phase-1 invoicing. One invoice per order, issued from the order's
//! stored totals with the seller details snapshotted at issue time. The QR
//! payload and hash are computed once and never recomputed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{invoice, order, restaurant};
use crate::errors::ServiceError;
use crate::zatca::{self, QrInvoiceData};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct IssueInvoiceRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BackfillPdfRequest {
    #[validate(length(min = 1, max = 512, message = "PDF path is required"))]
    pub pdf_path: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub invoice_number: String,
    pub seller_name: String,
    pub vat_number: String,
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub qr_payload: String,
    pub invoice_hash: String,
    pub pdf_path: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl From<invoice::Model> for InvoiceResponse {
    fn from(model: invoice::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            invoice_number: model.invoice_number,
            seller_name: model.seller_name,
            vat_number: model.vat_number,
            subtotal: model.subtotal,
            vat_amount: model.vat_amount,
            total: model.total,
            qr_payload: model.qr_payload,
            invoice_hash: model.invoice_hash,
            pdf_path: model.pdf_path,
            issued_at: model.issued_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Invoice numbers derive from the per-tenant order sequence, so they are
/// unique without a second counter.
pub fn invoice_number_for(order_number: i64) -> String {
    format!("INV-{:06}", order_number)
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DbPool>,
}

impl InvoiceService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(%restaurant_id, order_id = %request.order_id))]
    pub async fn issue_invoice(
        &self,
        restaurant_id: Uuid,
        request: IssueInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let order = order::Entity::find_by_id(request.order_id)
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let tenant = restaurant::Entity::find_by_id(restaurant_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Restaurant not found".to_string()))?;
        let vat_number = tenant.vat_registration_number.ok_or_else(|| {
            ServiceError::ValidationError(
                "Set the VAT registration number in settings before issuing invoices".to_string(),
            )
        })?;

        let existing = invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(order.id))
            .count(self.db.as_ref())
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(
                "An invoice has already been issued for this order".to_string(),
            ));
        }

        let issued_at = Utc::now();
        let invoice_number = invoice_number_for(order.order_number);
        let qr_data = QrInvoiceData {
            seller_name: &tenant.name,
            vat_number: &vat_number,
            issued_at,
            total_with_vat: order.total,
            vat_amount: order.tax,
        };
        let qr_payload = zatca::qr_payload(&qr_data)?;
        let invoice_hash = zatca::invoice_hash(&invoice_number, &qr_data);

        let issued = invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            order_id: Set(order.id),
            invoice_number: Set(invoice_number),
            seller_name: Set(tenant.name),
            vat_number: Set(vat_number),
            subtotal: Set(order.subtotal),
            vat_amount: Set(order.tax),
            total: Set(order.total),
            qr_payload: Set(qr_payload),
            invoice_hash: Set(invoice_hash),
            pdf_path: Set(None),
            issued_at: Set(issued_at),
            created_at: Set(issued_at),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(invoice_id = %issued.id, invoice_number = %issued.invoice_number, "invoice issued");
        Ok(issued.into())
    }

    #[instrument(skip(self), fields(%restaurant_id, %invoice_id))]
    pub async fn get_invoice(
        &self,
        restaurant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceResponse, ServiceError> {
        Ok(self.find_owned(restaurant_id, invoice_id).await?.into())
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_invoices(
        &self,
        restaurant_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<InvoiceListResponse, ServiceError> {
        let paginator = invoice::Entity::find()
            .filter(invoice::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(invoice::Column::IssuedAt)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator.num_items().await?;
        let invoices = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(InvoiceResponse::from)
            .collect();

        Ok(InvoiceListResponse {
            invoices,
            total,
            page,
            per_page,
        })
    }

    /// Attach the rendered PDF. The only mutable field after issue.
    #[instrument(skip(self, request), fields(%restaurant_id, %invoice_id))]
    pub async fn backfill_pdf(
        &self,
        restaurant_id: Uuid,
        invoice_id: Uuid,
        request: BackfillPdfRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_owned(restaurant_id, invoice_id).await?;
        let mut active: invoice::ActiveModel = existing.into();
        active.pdf_path = Set(Some(request.pdf_path));
        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    async fn find_owned(
        &self,
        restaurant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<invoice::Model, ServiceError> {
        invoice::Entity::find_by_id(invoice_id)
            .filter(invoice::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))
    }
}
