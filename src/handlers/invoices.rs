//! Invoice endpoints. Issuing computes the phase-1 QR payload and the
//! invoice hash at write time; the stored row never changes afterwards
//! except for the rendered PDF reference.

use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use crate::auth::{keys, CurrentUser, RouterExt};
use crate::services::invoices::{
    BackfillPdfRequest, InvoiceListResponse, InvoiceResponse, IssueInvoiceRequest,
};
use crate::{ApiResponse, ApiResult, AppState, ListQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", post(issue_invoice).get(list_invoices))
        .route("/invoices/:id", get(get_invoice))
        .route("/invoices/:id/pdf", put(backfill_pdf))
        .with_feature(keys::INVOICES)
}

/// Issue a tax invoice for an order
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    summary = "Issue invoice",
    description = "Snapshots the order totals into a new invoice with its ZATCA QR payload and hash",
    request_body = IssueInvoiceRequest,
    responses(
        (status = 200, description = "Invoice issued", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "VAT number missing from settings", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already invoiced", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn issue_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<IssueInvoiceRequest>,
) -> ApiResult<InvoiceResponse> {
    let restaurant_id = user.tenant_id()?;
    let invoice = state
        .services
        .invoices
        .issue_invoice(restaurant_id, request)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// List invoices newest first
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    summary = "List invoices",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated invoices", body = ApiResponse<InvoiceListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<InvoiceListResponse> {
    let restaurant_id = user.tenant_id()?;
    let (page, per_page) = query.window(&state.config);
    let invoices = state
        .services
        .invoices
        .list_invoices(restaurant_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(invoices)))
}

/// Fetch one invoice
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    summary = "Get invoice",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with QR payload", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<InvoiceResponse> {
    let restaurant_id = user.tenant_id()?;
    let invoice = state.services.invoices.get_invoice(restaurant_id, id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// Attach the rendered PDF reference
#[utoipa::path(
    put,
    path = "/api/v1/invoices/{id}/pdf",
    summary = "Record invoice PDF",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = BackfillPdfRequest,
    responses(
        (status = 200, description = "PDF reference stored", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn backfill_pdf(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<BackfillPdfRequest>,
) -> ApiResult<InvoiceResponse> {
    let restaurant_id = user.tenant_id()?;
    let invoice = state
        .services
        .invoices
        .backfill_pdf(restaurant_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}
