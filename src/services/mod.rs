// POS core
pub mod inventory;
pub mod menu;
pub mod orders;
pub mod recipes;
pub mod stock_validator;
pub mod transactions;

// Tenant lifecycle and accounts
pub mod branches;
pub mod employees;
pub mod tenants;

// Invoicing and reporting
pub mod analytics;
pub mod invoices;

// Support and collaboration
pub mod chat;
pub mod tickets;

// Cross-tenant operator tooling
pub mod it;
