use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sufra_api::{
    config::AppConfig,
    db,
    events::{self, EventSender, NotificationHub},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// At least 64 characters with mixed classes, matching production secret rules
/// even though `AppConfig::new` does not enforce them.
const TEST_JWT_SECRET: &str =
    "sufra_integration_test_secret_Z9_X8_W7_V6_U5_T4_S3_R2_Q1_P0_okmijnuhb";

/// Harness around the full application router, backed by a throwaway SQLite
/// file so every test gets an isolated database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub hub: Arc<NotificationHub>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

/// A signed-up tenant with its admin session.
pub struct Tenant {
    pub restaurant_id: Uuid,
    pub admin_id: Uuid,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_path = db_dir.path().join("sufra_test.db");
        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // A single connection keeps SQLite writes serialized under test load.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("open test database");
        db::run_migrations(&pool)
            .await
            .expect("run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_sender = EventSender::new(event_tx);
        let hub = Arc::new(NotificationHub::new(cfg.notification_buffer));
        let event_task = tokio::spawn(events::process_events(event_rx, hub.clone()));

        let state = AppState::new(db_arc, cfg, Some(event_sender), hub.clone());
        let router = sufra_api::app(state.clone());

        Self {
            router,
            state,
            hub,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.request(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: &str) -> Response {
        self.request(Method::POST, uri, Some(body), Some(token))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value, token: &str) -> Response {
        self.request(Method::PUT, uri, Some(body), Some(token))
            .await
    }

    /// Sign up a tenant and complete onboarding, returning the admin session.
    /// Most suites start from an active tenant; signup-flow tests exercise the
    /// pending state through `signup` directly.
    pub async fn active_tenant(&self, restaurant_name: &str, username: &str) -> Tenant {
        let tenant = self.signup(restaurant_name, username).await;
        let response = self
            .post(
                "/api/v1/auth/setup",
                json!({ "branch_name": "Main", "branch_location": "Riyadh" }),
                &tenant.token,
            )
            .await;
        assert!(
            response.status().is_success(),
            "setup failed with {}",
            response.status()
        );
        tenant
    }

    /// Sign up a tenant without completing setup. The account starts in
    /// `pending_setup`.
    pub async fn signup(&self, restaurant_name: &str, username: &str) -> Tenant {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/signup",
                Some(json!({
                    "restaurant_name": restaurant_name,
                    "business_type": "restaurant",
                    "username": username,
                    "password": "hunter2hunter2",
                    "display_name": "Owner",
                })),
                None,
            )
            .await;
        assert!(
            response.status().is_success(),
            "signup failed with {}",
            response.status()
        );
        let body = response_json(response).await;
        Tenant {
            restaurant_id: parse_uuid(&body["data"]["restaurant"]["id"]),
            admin_id: parse_uuid(&body["data"]["user"]["id"]),
            token: body["data"]["auth"]["access_token"]
                .as_str()
                .expect("signup returns an access token")
                .to_string(),
        }
    }

    /// Create an employee under the tenant and log them in.
    pub async fn employee(
        &self,
        tenant: &Tenant,
        username: &str,
        permissions: Value,
    ) -> (Uuid, String) {
        let response = self
            .post(
                "/api/v1/employees",
                json!({
                    "username": username,
                    "password": "hunter2hunter2",
                    "display_name": "Staff",
                    "permissions": permissions,
                }),
                &tenant.token,
            )
            .await;
        assert!(
            response.status().is_success(),
            "employee creation failed with {}",
            response.status()
        );
        let body = response_json(response).await;
        let id = parse_uuid(&body["data"]["id"]);
        (id, self.login(username).await)
    }

    /// Insert a cross-tenant IT operator directly. These accounts are
    /// provisioned out of band in production, so there is no API for it.
    #[allow(dead_code)]
    pub async fn it_operator(&self, username: &str) -> (Uuid, String) {
        use sea_orm::{ActiveModelTrait, Set};

        let auth = &self.state.services.auth;
        let hash = auth
            .hash_password("hunter2hunter2")
            .expect("hash test password");
        let account = sufra_api::entities::user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            password_hash: Set(hash),
            display_name: Set(Some("Operator".to_string())),
            role: Set("employee".to_string()),
            permissions: Set(json!({})),
            restaurant_id: Set(None),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("insert it operator");

        (account.id, self.login(username).await)
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "username": username, "password": "hunter2hunter2" })),
                None,
            )
            .await;
        assert!(
            response.status().is_success(),
            "login failed with {}",
            response.status()
        );
        let body = response_json(response).await;
        body["data"]["auth"]["access_token"]
            .as_str()
            .expect("login returns an access token")
            .to_string()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}

pub fn parse_uuid(value: &Value) -> Uuid {
    value
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .expect("value is a uuid string")
}

/// Parse a decimal out of a JSON field. SQLite stores decimals as REAL, so
/// amounts can come back with a different scale than they went in with;
/// comparing `Decimal` values instead of strings keeps assertions exact.
#[allow(dead_code)]
pub fn dec_of(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => raw.parse().expect("decimal string"),
        Value::Number(num) => num
            .to_string()
            .parse()
            .expect("decimal number"),
        other => panic!("expected a decimal field, got {other}"),
    }
}

/// Seed an inventory item, a recipe consuming it, and a menu item carrying the
/// recipe. Returns (inventory item id, recipe id, menu item id).
#[allow(dead_code)]
pub async fn seed_menu_with_recipe(
    app: &TestApp,
    token: &str,
    ingredient_name: &str,
    stock: &str,
    per_unit: &str,
    price: &str,
) -> (Uuid, Uuid, Uuid) {
    let response = app
        .post(
            "/api/v1/inventory",
            json!({
                "name": ingredient_name,
                "quantity": stock,
                "unit": "kg",
                "cost_per_unit": "30.00",
                "low_stock_threshold": "1.0",
            }),
            token,
        )
        .await;
    assert!(response.status().is_success(), "seed inventory item");
    let item_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .post(
            "/api/v1/recipes",
            json!({
                "name": format!("{} recipe", ingredient_name),
                "ingredients": [
                    { "inventory_item_id": item_id, "quantity": per_unit, "unit": "kg" }
                ],
            }),
            token,
        )
        .await;
    assert!(response.status().is_success(), "seed recipe");
    let recipe_id = parse_uuid(&response_json(response).await["data"]["id"]);

    let response = app
        .post(
            "/api/v1/menu",
            json!({
                "name": format!("{} plate", ingredient_name),
                "base_price": price,
                "recipe_id": recipe_id,
            }),
            token,
        )
        .await;
    assert!(response.status().is_success(), "seed menu item");
    let menu_item_id = parse_uuid(&response_json(response).await["data"]["id"]);

    (item_id, recipe_id, menu_item_id)
}
