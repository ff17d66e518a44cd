pub mod analytics;
pub mod auth;
pub mod branches;
pub mod chat;
pub mod employees;
pub mod events;
pub mod inventory;
pub mod invoices;
pub mod it;
pub mod menu;
pub mod orders;
pub mod recipes;
pub mod settings;
pub mod tickets;
pub mod transactions;

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::auth::{AuthConfig, AuthService};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Business-logic layer shared by the HTTP handlers. Every service is
/// cheap to clone; they all share the one database pool.
#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub tenants: services::tenants::TenantService,
    pub employees: services::employees::EmployeeService,
    pub branches: services::branches::BranchService,
    pub inventory: services::inventory::InventoryService,
    pub recipes: services::recipes::RecipeService,
    pub menu: services::menu::MenuService,
    pub orders: services::orders::OrderService,
    pub transactions: services::transactions::TransactionService,
    pub invoices: services::invoices::InvoiceService,
    pub analytics: services::analytics::AnalyticsService,
    pub tickets: services::tickets::TicketService,
    pub chat: services::chat::ChatService,
    pub it: services::it::ItService,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, config: &AppConfig, events: Option<EventSender>) -> Self {
        let tax_rate = Decimal::from_f64_retain(config.default_tax_rate)
            .unwrap_or_else(|| Decimal::new(15, 2));

        let auth = AuthService::new(AuthConfig::from_app_config(config), db.clone());
        let tenants =
            services::tenants::TenantService::new(db.clone(), auth.clone(), events.clone());
        let employees = services::employees::EmployeeService::new(db.clone(), auth.clone());
        let branches = services::branches::BranchService::new(db.clone());
        let inventory = services::inventory::InventoryService::new(db.clone());
        let recipes = services::recipes::RecipeService::new(db.clone());
        let menu = services::menu::MenuService::new(db.clone(), tax_rate);
        let validator = services::stock_validator::StockValidator::new(db.clone());
        let orders =
            services::orders::OrderService::new(db.clone(), validator, events.clone(), tax_rate);
        let transactions = services::transactions::TransactionService::new(db.clone());
        let invoices = services::invoices::InvoiceService::new(db.clone());
        let analytics = services::analytics::AnalyticsService::new(db.clone());
        let tickets = services::tickets::TicketService::new(db.clone(), events.clone());
        let chat = services::chat::ChatService::new(db.clone(), events);
        let it = services::it::ItService::new(db);

        Self {
            auth,
            tenants,
            employees,
            branches,
            inventory,
            recipes,
            menu,
            orders,
            transactions,
            invoices,
            analytics,
            tickets,
            chat,
            it,
        }
    }
}
