//! Stock validation for order drafts.
//!
//! Expands each ordered menu item into its recipe's ingredient
//! requirements, scaled by ordered quantity and portion size, folds in
//! add-on deltas, and compares the aggregate against on-hand stock. The
//! aggregation/comparison core is pure; [`StockValidator::validate`] is the
//! database-backed shell around it.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{inventory_item, menu_item, recipe_ingredient};
use crate::errors::{InsufficientItem, ServiceError};

/// Portion a menu item is sold in. Scales the linked recipe's ingredient
/// quantities.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Portion {
    Quarter,
    Half,
    ThreeQuarters,
    #[default]
    Full,
}

impl Portion {
    pub fn multiplier(self) -> Decimal {
        match self {
            Portion::Quarter => dec!(0.25),
            Portion::Half => dec!(0.5),
            Portion::ThreeQuarters => dec!(0.75),
            Portion::Full => dec!(1),
        }
    }

    /// Parse the column value stored on a menu item row.
    pub fn from_stored(raw: &str) -> Result<Self, ServiceError> {
        raw.parse().map_err(|_| {
            ServiceError::DataIntegrity(format!("menu item carries unknown portion `{raw}`"))
        })
    }
}

/// One line of an order draft.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderLineInput {
    pub menu_item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[serde(default)]
    #[validate]
    pub addons: Vec<AddonInput>,
}

/// An add-on selected for a line, with the extra stock it consumes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddonInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub ingredients: Vec<AddonIngredientInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddonIngredientInput {
    pub inventory_item_id: Uuid,
    pub quantity: Decimal,
}

/// A draft line after menu items and recipes have been resolved. Input to
/// the pure aggregation step.
#[derive(Debug, Clone)]
pub struct ExpandedLine {
    pub menu_item_name: String,
    pub ordered_quantity: i32,
    pub portion: Portion,
    /// Per-portion ingredient quantities from the linked recipe; empty when
    /// the menu item has no recipe.
    pub ingredients: Vec<(Uuid, Decimal)>,
    /// Add-on deltas, per ordered unit.
    pub addon_ingredients: Vec<(Uuid, Decimal)>,
}

/// On-hand stock for one inventory item, as seen by the comparison step.
#[derive(Debug, Clone)]
pub struct StockLevel {
    pub name: String,
    pub available: Decimal,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockValidation {
    pub is_valid: bool,
    /// Aggregate requirement per inventory item id
    #[schema(value_type = Object)]
    pub requirements: HashMap<Uuid, Decimal>,
    pub insufficient: Vec<InsufficientItem>,
    pub message: Option<String>,
}

/// Fold expanded lines into one requirement per inventory item.
///
/// Recipe rows with non-positive quantities are corrupt data; add-on deltas
/// that are not positive are bad client input. Both are rejected rather
/// than clamped.
pub fn aggregate_requirements(
    lines: &[ExpandedLine],
) -> Result<HashMap<Uuid, Decimal>, ServiceError> {
    let mut requirements: HashMap<Uuid, Decimal> = HashMap::new();

    for line in lines {
        let ordered = Decimal::from(line.ordered_quantity);
        let scale = ordered * line.portion.multiplier();

        for (item_id, per_portion) in &line.ingredients {
            if *per_portion <= Decimal::ZERO {
                return Err(ServiceError::DataIntegrity(format!(
                    "recipe ingredient for `{}` has non-positive quantity {per_portion}",
                    line.menu_item_name
                )));
            }
            *requirements.entry(*item_id).or_default() += *per_portion * scale;
        }

        for (item_id, delta) in &line.addon_ingredients {
            if *delta <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "add-on ingredient quantity must be positive, got {delta}"
                )));
            }
            *requirements.entry(*item_id).or_default() += *delta * ordered;
        }
    }

    Ok(requirements)
}

/// Compare aggregated requirements against stock. Every required item must
/// be present in `stock`; a missing row is corrupt data, not a shortage.
pub fn compare_requirements(
    requirements: &HashMap<Uuid, Decimal>,
    stock: &HashMap<Uuid, StockLevel>,
) -> Result<StockValidation, ServiceError> {
    let mut insufficient = Vec::new();

    for (item_id, required) in requirements {
        let level = stock.get(item_id).ok_or_else(|| {
            ServiceError::DataIntegrity(format!("inventory item {item_id} missing for requirement"))
        })?;
        if level.available < *required {
            insufficient.push(InsufficientItem {
                name: level.name.clone(),
                required: *required,
                available: level.available,
            });
        }
    }

    insufficient.sort_by(|a, b| a.name.cmp(&b.name));

    let message = if insufficient.is_empty() {
        None
    } else {
        let names: Vec<&str> = insufficient.iter().map(|item| item.name.as_str()).collect();
        Some(format!("Insufficient stock for: {}", names.join(", ")))
    };

    Ok(StockValidation {
        is_valid: insufficient.is_empty(),
        requirements: requirements.clone(),
        insufficient,
        message,
    })
}

/// Database-backed validator. Shared by the pre-pass at order creation and
/// the standalone validation endpoint.
#[derive(Clone)]
pub struct StockValidator {
    db: Arc<DbPool>,
}

impl StockValidator {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, lines), fields(%restaurant_id, line_count = lines.len()))]
    pub async fn validate(
        &self,
        restaurant_id: Uuid,
        branch_id: Option<Uuid>,
        lines: &[OrderLineInput],
    ) -> Result<StockValidation, ServiceError> {
        self.validate_on(self.db.as_ref(), restaurant_id, branch_id, lines)
            .await
    }

    /// Same as [`validate`](Self::validate) but over an explicit connection,
    /// so the order orchestrator can re-use it inside a transaction.
    pub async fn validate_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        restaurant_id: Uuid,
        branch_id: Option<Uuid>,
        lines: &[OrderLineInput],
    ) -> Result<StockValidation, ServiceError> {
        let expanded = self
            .expand_lines(conn, restaurant_id, lines)
            .await?;
        let requirements = aggregate_requirements(&expanded)?;
        let stock = self
            .load_stock(conn, restaurant_id, branch_id, &requirements)
            .await?;
        compare_requirements(&requirements, &stock)
    }

    /// Resolve menu items and their recipes for a draft. Unknown or
    /// foreign-tenant menu item ids fail with 404.
    async fn expand_lines<C: ConnectionTrait>(
        &self,
        conn: &C,
        restaurant_id: Uuid,
        lines: &[OrderLineInput],
    ) -> Result<Vec<ExpandedLine>, ServiceError> {
        let menu_ids: Vec<Uuid> = lines.iter().map(|line| line.menu_item_id).collect();
        let menu_items: HashMap<Uuid, menu_item::Model> = menu_item::Entity::find()
            .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
            .filter(menu_item::Column::Id.is_in(menu_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let recipe_ids: Vec<Uuid> = menu_items
            .values()
            .filter_map(|item| item.recipe_id)
            .collect();
        let mut ingredients_by_recipe: HashMap<Uuid, Vec<(Uuid, Decimal)>> = HashMap::new();
        if !recipe_ids.is_empty() {
            for row in recipe_ingredient::Entity::find()
                .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids))
                .all(conn)
                .await?
            {
                ingredients_by_recipe
                    .entry(row.recipe_id)
                    .or_default()
                    .push((row.inventory_item_id, row.quantity));
            }
        }

        let mut expanded = Vec::with_capacity(lines.len());
        for line in lines {
            let item = menu_items.get(&line.menu_item_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Menu item {} not found", line.menu_item_id))
            })?;
            if !item.is_available {
                return Err(ServiceError::ValidationError(format!(
                    "Menu item `{}` is currently unavailable",
                    item.name
                )));
            }

            let ingredients = item
                .recipe_id
                .and_then(|recipe_id| ingredients_by_recipe.get(&recipe_id).cloned())
                .unwrap_or_default();

            let addon_ingredients = line
                .addons
                .iter()
                .flat_map(|addon| addon.ingredients.iter())
                .map(|ing| (ing.inventory_item_id, ing.quantity))
                .collect();

            expanded.push(ExpandedLine {
                menu_item_name: item.name.clone(),
                ordered_quantity: line.quantity,
                portion: Portion::from_stored(&item.portion)?,
                ingredients,
                addon_ingredients,
            });
        }

        Ok(expanded)
    }

    /// Load stock levels for every required item. A branch-scoped item only
    /// counts for orders placed against that branch (or against no branch).
    async fn load_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        restaurant_id: Uuid,
        branch_id: Option<Uuid>,
        requirements: &HashMap<Uuid, Decimal>,
    ) -> Result<HashMap<Uuid, StockLevel>, ServiceError> {
        if requirements.is_empty() {
            return Ok(HashMap::new());
        }

        let item_ids: Vec<Uuid> = requirements.keys().copied().collect();
        let rows = inventory_item::Entity::find()
            .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
            .filter(inventory_item::Column::Id.is_in(item_ids))
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let available = match (row.branch_id, branch_id) {
                    (Some(item_branch), Some(order_branch)) if item_branch != order_branch => {
                        Decimal::ZERO
                    }
                    _ => row.quantity,
                };
                (
                    row.id,
                    StockLevel {
                        name: row.name,
                        available,
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn burger_line(quantity: i32, beef_id: Uuid, per_portion: Decimal) -> ExpandedLine {
        ExpandedLine {
            menu_item_name: "Burger".to_string(),
            ordered_quantity: quantity,
            portion: Portion::Full,
            ingredients: vec![(beef_id, per_portion)],
            addon_ingredients: vec![],
        }
    }

    fn stock_of(entries: &[(Uuid, &str, Decimal)]) -> HashMap<Uuid, StockLevel> {
        entries
            .iter()
            .map(|(id, name, available)| {
                (
                    *id,
                    StockLevel {
                        name: name.to_string(),
                        available: *available,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn two_burgers_need_double_the_beef() {
        let beef = Uuid::new_v4();
        let requirements =
            aggregate_requirements(&[burger_line(2, beef, dec!(0.2))]).unwrap();
        assert_eq!(requirements[&beef], dec!(0.4));

        let result =
            compare_requirements(&requirements, &stock_of(&[(beef, "beef", dec!(10))])).unwrap();
        assert!(result.is_valid);
        assert!(result.insufficient.is_empty());
        assert!(result.message.is_none());
    }

    #[test]
    fn shortage_reports_name_required_and_available() {
        let beef = Uuid::new_v4();
        let requirements =
            aggregate_requirements(&[burger_line(2, beef, dec!(0.2))]).unwrap();
        let result =
            compare_requirements(&requirements, &stock_of(&[(beef, "beef", dec!(0.3))])).unwrap();

        assert!(!result.is_valid);
        assert_eq!(
            result.insufficient,
            vec![InsufficientItem {
                name: "beef".to_string(),
                required: dec!(0.4),
                available: dec!(0.3),
            }]
        );
        assert_eq!(
            result.message.as_deref(),
            Some("Insufficient stock for: beef")
        );
    }

    #[test]
    fn portion_scales_the_recipe() {
        let beef = Uuid::new_v4();
        let mut line = burger_line(2, beef, dec!(0.2));
        line.portion = Portion::Half;
        let requirements = aggregate_requirements(&[line]).unwrap();
        assert_eq!(requirements[&beef], dec!(0.2));
    }

    #[test]
    fn addons_fold_into_the_same_item() {
        let cheese = Uuid::new_v4();
        let line = ExpandedLine {
            menu_item_name: "Burger".to_string(),
            ordered_quantity: 3,
            portion: Portion::Full,
            ingredients: vec![(cheese, dec!(0.05))],
            addon_ingredients: vec![(cheese, dec!(0.02))],
        };
        let requirements = aggregate_requirements(&[line]).unwrap();
        // 3 * 0.05 from the recipe + 3 * 0.02 from the add-on.
        assert_eq!(requirements[&cheese], dec!(0.21));
    }

    #[test]
    fn lines_without_a_recipe_require_nothing() {
        let line = ExpandedLine {
            menu_item_name: "Water".to_string(),
            ordered_quantity: 5,
            portion: Portion::Full,
            ingredients: vec![],
            addon_ingredients: vec![],
        };
        let requirements = aggregate_requirements(&[line]).unwrap();
        assert!(requirements.is_empty());

        let result = compare_requirements(&requirements, &HashMap::new()).unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn non_positive_addon_delta_is_client_error() {
        let item = Uuid::new_v4();
        let mut line = burger_line(1, item, dec!(0.2));
        line.addon_ingredients = vec![(Uuid::new_v4(), dec!(0))];

        assert!(matches!(
            aggregate_requirements(&[line]),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn non_positive_recipe_row_is_corrupt_data() {
        let line = burger_line(1, Uuid::new_v4(), dec!(-0.1));
        assert!(matches!(
            aggregate_requirements(&[line]),
            Err(ServiceError::DataIntegrity(_))
        ));
    }

    #[test]
    fn missing_stock_row_is_corrupt_data() {
        let beef = Uuid::new_v4();
        let requirements =
            aggregate_requirements(&[burger_line(1, beef, dec!(0.2))]).unwrap();
        assert!(matches!(
            compare_requirements(&requirements, &HashMap::new()),
            Err(ServiceError::DataIntegrity(_))
        ));
    }

    #[test]
    fn shortages_are_sorted_by_item_name() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let line = ExpandedLine {
            menu_item_name: "Mixed Grill".to_string(),
            ordered_quantity: 1,
            portion: Portion::Full,
            ingredients: vec![(b, dec!(1)), (a, dec!(1))],
            addon_ingredients: vec![],
        };
        let requirements = aggregate_requirements(&[line]).unwrap();
        let result = compare_requirements(
            &requirements,
            &stock_of(&[(b, "zucchini", dec!(0)), (a, "aubergine", dec!(0))]),
        )
        .unwrap();

        let names: Vec<&str> = result
            .insufficient
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        assert_eq!(names, vec!["aubergine", "zucchini"]);
    }

    proptest! {
        /// Requirements scale linearly with the ordered quantity.
        #[test]
        fn requirements_scale_linearly(qty in 1i32..50, factor in 1i32..5, per_portion in 1u32..1000) {
            let beef = Uuid::new_v4();
            let per_portion = Decimal::from(per_portion) / dec!(100);

            let base = aggregate_requirements(&[burger_line(qty, beef, per_portion)]).unwrap();
            let scaled = aggregate_requirements(&[burger_line(qty * factor, beef, per_portion)]).unwrap();

            prop_assert_eq!(scaled[&beef], base[&beef] * Decimal::from(factor));
        }

        /// Splitting an order across lines never changes the aggregate.
        #[test]
        fn aggregation_is_additive(a in 1i32..25, b in 1i32..25) {
            let beef = Uuid::new_v4();
            let split = aggregate_requirements(&[
                burger_line(a, beef, dec!(0.2)),
                burger_line(b, beef, dec!(0.2)),
            ]).unwrap();
            let merged = aggregate_requirements(&[burger_line(a + b, beef, dec!(0.2))]).unwrap();

            prop_assert_eq!(split[&beef], merged[&beef]);
        }
    }
}
