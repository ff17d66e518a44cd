//! Sufra API Library
//!
//! Multi-tenant backend for restaurant and factory operations: POS orders
//! with recipe-based stock validation, inventory, menus, ZATCA phase-1
//! invoicing, staff permissions, support tickets, team chat and a live
//! event stream. Every business row carries a `restaurant_id` and every
//! query is scoped to it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod observability;
pub mod openapi;
pub mod services;
pub mod zatca;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{auth_middleware, AuthService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub hub: Arc<events::NotificationHub>,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        events: Option<events::EventSender>,
        hub: Arc<events::NotificationHub>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config, events);
        Self {
            db,
            config,
            services,
            hub,
        }
    }
}

/// Pagination shared by list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<u64>,
    /// Page size, capped at the configured maximum.
    pub per_page: Option<u64>,
}

impl ListQuery {
    pub fn window(&self, config: &config::AppConfig) -> (u64, u64) {
        page_window(self.page, self.per_page, config)
    }
}

/// Normalizes raw pagination input against the configured defaults and cap.
pub fn page_window(
    page: Option<u64>,
    per_page: Option<u64>,
    config: &config::AppConfig,
) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(config.api_default_page_size as u64)
        .clamp(1, config.api_max_page_size as u64);
    (page, per_page)
}

/// Uniform success envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: observability::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard result type for JSON endpoints.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// The versioned API surface.
///
/// Signup, login and password reset stay outside the auth middleware; the
/// `/auth/me` and `/auth/setup` pair sits behind it but outside every
/// feature gate so a `pending_setup` tenant can finish onboarding. Each
/// remaining group carries its own feature gate.
pub fn api_v1_routes(auth: AuthService) -> Router<AppState> {
    let protected = Router::new()
        .merge(handlers::auth::session_routes())
        .merge(handlers::events::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::inventory::routes())
        .merge(handlers::recipes::routes())
        .merge(handlers::menu::routes())
        .merge(handlers::branches::routes())
        .merge(handlers::employees::routes())
        .merge(handlers::transactions::routes())
        .merge(handlers::invoices::routes())
        .merge(handlers::analytics::routes())
        .merge(handlers::settings::routes())
        .merge(handlers::tickets::routes())
        .merge(handlers::tickets::it_routes())
        .merge(handlers::chat::routes())
        .merge(handlers::it::routes())
        .layer(axum::middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(handlers::auth::public_routes())
        .merge(protected)
}

/// The complete application: versioned API, API docs and the outer
/// middleware stack. This is what both `main` and the integration tests
/// serve.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/api/v1", api_v1_routes(state.services.auth.clone()))
        .merge(openapi::swagger_ui())
        .layer(observability::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            observability::request_id_middleware,
        ))
        .layer(cors)
        .layer(CompressionLayer::new())
        .with_state(state)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::permissive();
    }

    let mut layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if let Some(raw) = config.cors_allowed_origins.as_deref() {
        let origins: Vec<HeaderValue> = raw
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        layer = layer.allow_origin(origins);
    }
    if config.cors_allow_credentials {
        layer = layer.allow_credentials(true);
    }
    layer
}

async fn api_status() -> ApiResult<Value> {
    let status = json!({
        "status": "ok",
        "service": "sufra-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let database = match state.db.ping().await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health = json!({
        "status": if database == "healthy" { "healthy" } else { "unhealthy" },
        "checks": { "database": database },
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health)))
}
