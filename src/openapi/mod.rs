use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sufra API",
        version = "1.0.0",
        description = r#"
# Sufra Restaurant & Factory Operations API

Multi-tenant backend for point-of-sale orders, inventory, menus, ZATCA
phase-1 invoicing, staff permissions, support tickets and team chat.

## Authentication

Sign up to receive a JWT, then pass it on every request:

```
Authorization: Bearer <your-jwt-token>
```

The token carries identity only. Permissions, account standing and tenant
status are read from the database on every request, so permission edits
and suspensions take effect immediately.

## Tenancy

Every business object belongs to one restaurant. Requests are always
scoped to the caller's restaurant; objects of other tenants answer 404.

## Feature gates

Each route group is gated by a feature key (`pos`, `orders`, `inventory`,
...). Admin accounts hold every client feature implicitly; employee
accounts need an explicit grant with the right action (view/add/edit/
delete, mapped from the HTTP method). IT routes require an IT account.

## Errors

Errors share one envelope:

```json
{
  "error": "Conflict",
  "message": "Insufficient stock for: beef",
  "details": { "insufficientItems": [ ... ] },
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (1-based) and `per_page` (capped at the
configured maximum, 100 by default).
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Signup, login and password reset"),
        (name = "Orders", description = "POS orders, the queue and the kitchen"),
        (name = "Inventory", description = "Stock items and receipts"),
        (name = "Recipes", description = "Dish ingredient lists"),
        (name = "Menu", description = "Menu items and display order"),
        (name = "Branches", description = "Branch management"),
        (name = "Employees", description = "Staff accounts and permissions"),
        (name = "Transactions", description = "Payment ledger"),
        (name = "Invoices", description = "ZATCA phase-1 tax invoices"),
        (name = "Analytics", description = "Sales and inventory reporting"),
        (name = "Settings", description = "Tenant profile"),
        (name = "Tickets", description = "Support tickets"),
        (name = "Chat", description = "Team chat channels"),
        (name = "IT", description = "Cross-tenant operator console"),
        (name = "Events", description = "Realtime event stream")
    ),
    paths(
        // Auth
        crate::handlers::auth::signup,
        crate::handlers::auth::complete_setup,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,

        // Orders
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::active_order_count,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::pay_order,

        // Inventory
        crate::handlers::inventory::create_item,
        crate::handlers::inventory::list_items,
        crate::handlers::inventory::low_stock,
        crate::handlers::inventory::update_item,
        crate::handlers::inventory::receive_stock,

        // Recipes
        crate::handlers::recipes::create_recipe,
        crate::handlers::recipes::list_recipes,
        crate::handlers::recipes::get_recipe,
        crate::handlers::recipes::update_recipe,

        // Menu
        crate::handlers::menu::create_menu_item,
        crate::handlers::menu::list_menu_items,
        crate::handlers::menu::update_menu_order,
        crate::handlers::menu::update_menu_item,

        // Branches
        crate::handlers::branches::create_branch,
        crate::handlers::branches::list_branches,

        // Employees
        crate::handlers::employees::create_employee,
        crate::handlers::employees::list_employees,
        crate::handlers::employees::update_employee,
        crate::handlers::employees::deactivate_employee,

        // Transactions
        crate::handlers::transactions::list_transactions,

        // Invoices
        crate::handlers::invoices::issue_invoice,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::backfill_pdf,

        // Analytics
        crate::handlers::analytics::dashboard,
        crate::handlers::analytics::sales_summary,
        crate::handlers::analytics::top_items,
        crate::handlers::analytics::inventory_snapshot,

        // Settings
        crate::handlers::settings::get_settings,
        crate::handlers::settings::update_settings,

        // Tickets
        crate::handlers::tickets::create_ticket,
        crate::handlers::tickets::list_tickets,
        crate::handlers::tickets::list_all_tickets,
        crate::handlers::tickets::update_ticket,
        crate::handlers::tickets::list_ticket_messages,
        crate::handlers::tickets::add_ticket_message,

        // Chat
        crate::handlers::chat::list_channels,
        crate::handlers::chat::create_channel,
        crate::handlers::chat::add_member,
        crate::handlers::chat::send_message,
        crate::handlers::chat::list_messages,

        // IT
        crate::handlers::it::dashboard,
        crate::handlers::it::list_restaurants,
        crate::handlers::it::update_account,
        crate::handlers::it::performance,

        // Events
        crate::handlers::events::subscribe,
    ),
    components(
        schemas(
            // Envelope and errors
            crate::ApiResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::errors::InsufficientItem,

            // Auth
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::MeResponse,
            crate::handlers::auth::ForgotPasswordRequest,
            crate::handlers::auth::ForgotPasswordResponse,
            crate::handlers::auth::ResetPasswordRequest,
            crate::auth::AuthToken,

            // Tenants
            crate::services::tenants::SignupRequest,
            crate::services::tenants::SignupResponse,
            crate::services::tenants::SignupAccount,
            crate::services::tenants::CompleteSetupRequest,
            crate::services::tenants::UpdateSettingsRequest,
            crate::services::tenants::SettingsResponse,
            crate::services::tenants::BusinessType,

            // Orders
            crate::services::orders::OrderStatus,
            crate::services::orders::OrderItemDraft,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::PayOrderRequest,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderListResponse,
            crate::services::stock_validator::Portion,
            crate::services::stock_validator::AddonInput,
            crate::services::stock_validator::AddonIngredientInput,
            crate::handlers::orders::ActiveCountResponse,

            // Inventory
            crate::services::inventory::StockStatus,
            crate::services::inventory::CreateInventoryItemRequest,
            crate::services::inventory::UpdateInventoryItemRequest,
            crate::services::inventory::ReceiveStockRequest,
            crate::services::inventory::InventoryItemResponse,
            crate::services::inventory::InventoryListResponse,

            // Recipes
            crate::services::recipes::RecipeIngredientInput,
            crate::services::recipes::CreateRecipeRequest,
            crate::services::recipes::UpdateRecipeRequest,
            crate::services::recipes::RecipeIngredientResponse,
            crate::services::recipes::RecipeResponse,
            crate::services::recipes::RecipeListResponse,

            // Menu
            crate::services::menu::CreateMenuItemRequest,
            crate::services::menu::UpdateMenuItemRequest,
            crate::services::menu::MenuSortEntry,
            crate::services::menu::UpdateMenuOrderRequest,
            crate::services::menu::MenuItemResponse,
            crate::services::menu::MenuListResponse,

            // Branches and employees
            crate::services::branches::CreateBranchRequest,
            crate::services::branches::BranchResponse,
            crate::services::employees::CreateEmployeeRequest,
            crate::services::employees::UpdateEmployeeRequest,
            crate::services::employees::EmployeeResponse,

            // Transactions and invoices
            crate::services::transactions::PaymentMethod,
            crate::services::transactions::TransactionResponse,
            crate::services::transactions::TransactionListResponse,
            crate::services::invoices::IssueInvoiceRequest,
            crate::services::invoices::BackfillPdfRequest,
            crate::services::invoices::InvoiceResponse,
            crate::services::invoices::InvoiceListResponse,

            // Analytics
            crate::services::analytics::SalesSummary,
            crate::services::analytics::TopItemEntry,
            crate::services::analytics::InventorySnapshot,
            crate::services::analytics::AnalyticsDashboard,

            // Tickets
            crate::services::tickets::TicketStatus,
            crate::services::tickets::TicketPriority,
            crate::services::tickets::CreateTicketRequest,
            crate::services::tickets::UpdateTicketRequest,
            crate::services::tickets::TicketMessageRequest,
            crate::services::tickets::TicketResponse,
            crate::services::tickets::TicketListResponse,
            crate::services::tickets::TicketMessageResponse,

            // Chat
            crate::services::chat::CreateChannelRequest,
            crate::services::chat::SendMessageRequest,
            crate::services::chat::ChannelResponse,
            crate::services::chat::ChatMessageResponse,
            crate::handlers::chat::AddMemberRequest,

            // IT
            crate::services::it::DashboardResponse,
            crate::services::it::RestaurantSummary,
            crate::services::it::RestaurantListResponse,
            crate::services::it::PerformanceEntry,
            crate::services::it::UpdateAccountRequest,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
