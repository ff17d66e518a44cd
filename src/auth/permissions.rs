/*!
 * # Permissions Module
 *
 * Feature-keyed access control. Every account carries a permission set
 * mapping feature keys to either a legacy boolean or a granular
 * `{view, add, edit, delete}` record. The set is normalized once, at the
 * auth boundary; everything downstream only ever sees granular grants.
 */

use axum::http::Method;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::Display;
use thiserror::Error;
use utoipa::ToSchema;

/// Which side of the product a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureScope {
    /// Tenant-facing features, gated by the account's permission set.
    Client,
    /// Operator console features, reachable only by IT accounts.
    It,
}

/// Feature definition
#[derive(Debug, Clone)]
pub struct Feature {
    pub key: &'static str,
    pub description: &'static str,
    pub scope: FeatureScope,
}

/// Fixed feature keys. Permission sets may only reference these; anything
/// else is dropped on read and rejected on write.
pub mod keys {
    pub const POS: &str = "pos";
    pub const ORDERS: &str = "orders";
    pub const KITCHEN: &str = "kitchen";
    pub const MENU: &str = "menu";
    pub const RECIPES: &str = "recipes";
    pub const INVENTORY: &str = "inventory";
    pub const PURCHASES: &str = "purchases";
    pub const SUPPLIERS: &str = "suppliers";
    pub const EMPLOYEES: &str = "employees";
    pub const ANALYTICS: &str = "analytics";
    pub const TRANSACTIONS: &str = "transactions";
    pub const INVOICES: &str = "invoices";
    pub const BRANCHES: &str = "branches";
    pub const SETTINGS: &str = "settings";
    pub const SUPPORT: &str = "support";
    pub const CHAT: &str = "chat";
    pub const IT_DASHBOARD: &str = "it_dashboard";
    pub const PERFORMANCE: &str = "performance";
    pub const ACCOUNTS: &str = "accounts";
}

/// The IT allow-list. IT accounts reach exactly these features; client
/// accounts never do, admin or not.
pub const IT_FEATURES: [&str; 3] = [keys::IT_DASHBOARD, keys::PERFORMANCE, keys::ACCOUNTS];

lazy_static! {
    /// Registry of every known feature, keyed by its wire string.
    pub static ref FEATURES: HashMap<&'static str, Feature> = {
        let mut features = HashMap::new();

        let mut client = |key: &'static str, description: &'static str| {
            features.insert(
                key,
                Feature {
                    key,
                    description,
                    scope: FeatureScope::Client,
                },
            );
        };

        client(keys::POS, "Point of sale");
        client(keys::ORDERS, "Order management");
        client(keys::KITCHEN, "Kitchen display");
        client(keys::MENU, "Menu management");
        client(keys::RECIPES, "Recipe management");
        client(keys::INVENTORY, "Inventory and stock levels");
        client(keys::PURCHASES, "Purchasing and stock receipts");
        client(keys::SUPPLIERS, "Supplier directory");
        client(keys::EMPLOYEES, "Employee accounts and permissions");
        client(keys::ANALYTICS, "Sales analytics and reports");
        client(keys::TRANSACTIONS, "Financial transactions");
        client(keys::INVOICES, "Tax invoices");
        client(keys::BRANCHES, "Branch management");
        client(keys::SETTINGS, "Business settings");
        client(keys::SUPPORT, "Support tickets");
        client(keys::CHAT, "Team chat");
        drop(client);

        for (key, description) in [
            (keys::IT_DASHBOARD, "Operator dashboard and ticket queue"),
            (keys::PERFORMANCE, "Per-tenant activity and performance"),
            (keys::ACCOUNTS, "Account and subscription management"),
        ] {
            features.insert(
                key,
                Feature {
                    key,
                    description,
                    scope: FeatureScope::It,
                },
            );
        }

        features
    };
}

/// Is this one of the fixed feature keys?
pub fn is_known_feature(key: &str) -> bool {
    FEATURES.contains_key(key)
}

/// Is this an operator-console feature?
pub fn is_it_feature(key: &str) -> bool {
    FEATURES
        .get(key)
        .map_or(false, |f| f.scope == FeatureScope::It)
}

/// Keys assignable to tenant staff.
pub fn client_feature_keys() -> impl Iterator<Item = &'static str> {
    FEATURES
        .values()
        .filter(|f| f.scope == FeatureScope::Client)
        .map(|f| f.key)
}

/// Account classification, derived solely from whether the user row carries
/// a `restaurant_id`. Never stored, never taken from client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Client,
    It,
}

/// Role on a client account. Unknown stored values fall back to `Employee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    Employee,
}

impl UserRole {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => UserRole::Admin,
            _ => UserRole::Employee,
        }
    }
}

/// The four gate actions. Route wiring derives one from the HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    View,
    Add,
    Edit,
    Delete,
}

impl Action {
    /// GET/HEAD read, POST creates, PUT/PATCH mutate, DELETE removes.
    /// Anything exotic requires the strongest grant.
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::GET | Method::HEAD => Action::View,
            Method::POST => Action::Add,
            Method::PUT | Method::PATCH => Action::Edit,
            Method::DELETE => Action::Delete,
            _ => Action::Delete,
        }
    }
}

/// One stored permission value: accounts created before the granular matrix
/// carry plain booleans, newer ones carry full records. Serde's untagged
/// union covers both without a data migration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PermissionValue {
    Legacy(bool),
    Granular(FeatureGrant),
}

/// Canonical granular grant for one feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FeatureGrant {
    pub view: bool,
    pub add: bool,
    pub edit: bool,
    pub delete: bool,
}

impl FeatureGrant {
    pub const fn full() -> Self {
        Self {
            view: true,
            add: true,
            edit: true,
            delete: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            view: false,
            add: false,
            edit: false,
            delete: false,
        }
    }

    /// Enforce the grant invariant: holding any of add/edit/delete implies
    /// view.
    pub fn normalized(self) -> Self {
        Self {
            view: self.view || self.add || self.edit || self.delete,
            ..self
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Add => self.add,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }
}

impl From<bool> for FeatureGrant {
    fn from(enabled: bool) -> Self {
        if enabled {
            FeatureGrant::full()
        } else {
            FeatureGrant::none()
        }
    }
}

impl From<PermissionValue> for FeatureGrant {
    fn from(value: PermissionValue) -> Self {
        match value {
            PermissionValue::Legacy(enabled) => enabled.into(),
            PermissionValue::Granular(grant) => grant.normalized(),
        }
    }
}

/// A write-path permission map referenced an unrecognized feature.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown permission feature `{0}`")]
pub struct UnknownFeature(pub String);

/// A fully-normalized permission set. Construct through [`from_stored`]
/// (lenient, for JSON already on a user row) or [`from_request`] (strict,
/// for inbound writes); direct deserialization is deliberately not offered
/// so un-normalized data cannot leak in.
///
/// [`from_stored`]: PermissionSet::from_stored
/// [`from_request`]: PermissionSet::from_request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet {
    features: HashMap<String, FeatureGrant>,
}

impl PermissionSet {
    /// Lenient read of the JSON stored on a user row. Unknown keys and
    /// malformed values are dropped; an absent grant means no access, so
    /// dropping fails closed.
    pub fn from_stored(value: &serde_json::Value) -> Self {
        let mut features = HashMap::new();
        if let Some(map) = value.as_object() {
            for (key, raw) in map {
                if !is_known_feature(key) {
                    continue;
                }
                if let Ok(value) = serde_json::from_value::<PermissionValue>(raw.clone()) {
                    features.insert(key.clone(), FeatureGrant::from(value));
                }
            }
        }
        Self { features }
    }

    /// Strict construction from an inbound write. Unknown keys are an
    /// error, not a silent drop.
    pub fn from_request(raw: &HashMap<String, PermissionValue>) -> Result<Self, UnknownFeature> {
        let mut features = HashMap::new();
        for (key, value) in raw {
            if !is_known_feature(key) {
                return Err(UnknownFeature(key.clone()));
            }
            features.insert(key.clone(), FeatureGrant::from(value.clone()));
        }
        Ok(Self { features })
    }

    /// Every client feature fully granted. Seeds tenant admin accounts,
    /// whose stored set is informational (the role bypasses the gate).
    pub fn all_client_features() -> Self {
        let features = client_feature_keys()
            .map(|key| (key.to_string(), FeatureGrant::full()))
            .collect();
        Self { features }
    }

    pub fn grant(&self, feature: &str) -> FeatureGrant {
        self.features.get(feature).copied().unwrap_or_default()
    }

    pub fn allows(&self, feature: &str, action: Action) -> bool {
        self.grant(feature).allows(action)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialize for storage on the user row.
    pub fn to_stored(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// Why the gate said no. Mapped to a 403 at the HTTP boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("This action requires a restaurant account")]
    RestaurantAccountRequired,
    #[error("This action requires an IT account")]
    ItAccountRequired,
    #[error("You do not have {action} access to {feature}")]
    MissingPermission { feature: String, action: Action },
}

/// The permission gate. Pure: a function of the account snapshot, the
/// feature key and the requested action, nothing else.
///
/// - IT accounts reach exactly the [`IT_FEATURES`] allow-list, whatever
///   their stored permission set says.
/// - Client admins bypass feature checks, but never onto IT features.
/// - Everyone else needs the matching granular grant.
pub fn check_access(
    account_type: AccountType,
    role: UserRole,
    permissions: &PermissionSet,
    feature: &str,
    action: Action,
) -> Result<(), AccessDenied> {
    match account_type {
        AccountType::It => {
            if is_it_feature(feature) {
                Ok(())
            } else {
                Err(AccessDenied::RestaurantAccountRequired)
            }
        }
        AccountType::Client => {
            if is_it_feature(feature) {
                return Err(AccessDenied::ItAccountRequired);
            }
            if role == UserRole::Admin {
                return Ok(());
            }
            if permissions.allows(feature, action) {
                Ok(())
            } else {
                Err(AccessDenied::MissingPermission {
                    feature: feature.to_string(),
                    action,
                })
            }
        }
    }
}
