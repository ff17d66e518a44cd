use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Body shape shared by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "message": "Insufficient stock for: beef",
    "details": { "insufficientItems": [ { "name": "beef", "required": "0.4", "available": "0.3" } ] },
    "request_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "timestamp": "2026-01-15T09:21:00+00:00"
}))]
pub struct ErrorResponse {
    /// Canonical reason of the HTTP status
    #[schema(example = "Conflict")]
    pub error: String,
    /// What went wrong, worded for the caller
    pub message: String,
    /// Structured detail where the failure carries one (field errors,
    /// itemized stock shortfalls)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Matches the x-request-id response header
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "7c9e6679-7425-40de-944b-e07fc1f90ae7")]
    pub request_id: Option<String>,
    /// RFC 3339 time of the failure
    pub timestamp: String,
}

/// One under-stocked ingredient in an order rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InsufficientItem {
    /// Inventory item name
    #[schema(example = "beef")]
    pub name: String,
    /// Quantity the order requires
    pub required: Decimal,
    /// Quantity currently on hand
    pub available: Decimal,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<InsufficientItem>),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// The one place a variant maps to a status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::InvalidStatus(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) | Self::Unauthorized(_) | Self::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) | Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::DataIntegrity(_)
            | Self::EventError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::InternalServerError
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the response body. 500-class variants collapse to a
    /// generic line so internals never reach a caller.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::DataIntegrity(_)
            | Self::EventError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            Self::InternalServerError => "Internal server error".to_string(),
            Self::InsufficientStock(items) => {
                let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
                format!("Insufficient stock for: {}", names.join(", "))
            }
            Self::JwtError(_) => "Authentication error: invalid token".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured detail for the body, where the variant carries one.
    pub fn response_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientStock(items) => Some(json!({ "insufficientItems": items })),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.response_details(),
            request_id: crate::observability::current_request_id()
                .map(|rid| rid.as_str().to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};
    use rust_decimal_macros::dec;

    fn shortfall() -> Vec<InsufficientItem> {
        vec![InsufficientItem {
            name: "beef".into(),
            required: dec!(0.4),
            available: dec!(0.3),
        }]
    }

    #[tokio::test]
    async fn body_carries_the_scoped_request_id() {
        let response = crate::observability::scope_request_id(
            crate::observability::RequestId::new("req-123"),
            async { ServiceError::NotFound("missing".into()).into_response() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[tokio::test]
    async fn insufficient_stock_maps_to_conflict_with_itemized_detail() {
        let response = ServiceError::InsufficientStock(shortfall()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.expect("detail payload");
        let items = details["insufficientItems"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "beef");
        // Decimal serializes through serde as a string
        assert_eq!(items[0]["required"], "0.4");
        assert_eq!(items[0]["available"], "0.3");
    }

    #[test]
    fn every_variant_lands_on_its_status() {
        assert_eq!(
            ServiceError::NotFound("no such order".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("quantity".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidStatus("completed -> pending".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("menu".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("username taken".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InsufficientStock(shortfall()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DataIntegrity("bad recipe row".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::InternalServerError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_variants_collapse_to_a_generic_message() {
        assert_eq!(
            ServiceError::HashError("argon2 params".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DataIntegrity("recipe 42 has qty -1".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::JwtError("signature mismatch".into()).response_message(),
            "Authentication error: invalid token"
        );

        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
        assert_eq!(
            ServiceError::InsufficientStock(shortfall()).response_message(),
            "Insufficient stock for: beef"
        );
    }
}
