//! Order lifecycle: creation with stock deduction, the status machine,
//! payment, and listings.
//!
//! Creation is validate-then-commit: a stock pre-pass produces the
//! itemized 409 before anything is written, and the deductions inside the
//! transaction are guarded decrements, so an order row and its inventory
//! effect land atomically even when two orders race for the same stock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{branch, inventory_item, menu_item, order, order_item, transaction};
use crate::errors::{InsufficientItem, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::stock_validator::{AddonInput, OrderLineInput, StockValidator};
use crate::services::transactions::PaymentMethod;

/// Order lifecycle states.
///
/// `created → processing → ready → completed` is the kitchen path,
/// `created → paid → completed` the counter path, `created → cancelled`
/// the abort. `completed` and `cancelled` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Processing,
    Ready,
    Completed,
    Cancelled,
    Paid,
}

impl OrderStatus {
    /// Parse client input; unknown statuses are a 400.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        raw.parse()
            .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status `{raw}`")))
    }

    /// Parse a stored column value; unknown statuses are corrupt data.
    pub fn from_stored(raw: &str) -> Result<Self, ServiceError> {
        raw.parse().map_err(|_| {
            ServiceError::DataIntegrity(format!("order row carries unknown status `{raw}`"))
        })
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, Processing)
                | (Created, Cancelled)
                | (Created, Paid)
                | (Processing, Ready)
                | (Ready, Completed)
                | (Paid, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses counted as active on the dashboard.
    pub fn active_statuses() -> [&'static str; 4] {
        ["created", "processing", "ready", "paid"]
    }
}

/// One line of an order draft as the POS client sends it. Prices are
/// VAT-inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderItemDraft {
    pub menu_item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate]
    pub addons: Vec<AddonInput>,
}

impl OrderItemDraft {
    fn stock_line(&self) -> OrderLineInput {
        OrderLineInput {
            menu_item_id: self.menu_item_id,
            quantity: self.quantity,
            addons: self.addons.clone(),
        }
    }

    fn line_total(&self) -> Decimal {
        let addons: Decimal = self.addons.iter().map(|addon| addon.price).sum();
        (self.unit_price + addons) * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub branch_id: Option<Uuid>,
    #[validate(length(min = 1, message = "An order needs at least one item"))]
    #[validate]
    pub items: Vec<OrderItemDraft>,
    #[validate(length(max = 120))]
    pub customer_name: Option<String>,
    #[validate(length(max = 40))]
    pub customer_phone: Option<String>,
}

impl CreateOrderRequest {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        for item in &self.items {
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Unit price cannot be negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PayOrderRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub menu_item_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub addons: serde_json::Value,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: i64,
    pub branch_id: Option<Uuid>,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub created_by: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// VAT-inclusive totals: tax is extracted from the gross amount at the
/// configured rate, so `subtotal + tax == total` after rounding.
pub fn compute_totals(items: &[OrderItemDraft], tax_rate: Decimal) -> (Decimal, Decimal, Decimal) {
    let total: Decimal = items.iter().map(OrderItemDraft::line_total).sum();
    let tax = (total * tax_rate / (Decimal::ONE + tax_rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (total - tax, tax, total)
}

/// First three item names, with an ellipsis when the order has more.
pub fn summarize_items(names: &[String]) -> String {
    let mut summary = names
        .iter()
        .take(3)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > 3 {
        summary.push('…');
    }
    summary
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    validator: StockValidator,
    events: Option<EventSender>,
    tax_rate: Decimal,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        validator: StockValidator,
        events: Option<EventSender>,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            db,
            validator,
            events,
            tax_rate,
        }
    }

    /// Place an order: stock pre-pass, then one transaction covering the
    /// order row, its items and the guarded stock deductions.
    #[instrument(skip(self, request), fields(%restaurant_id, item_count = request.items.len()))]
    pub async fn place_order(
        &self,
        restaurant_id: Uuid,
        created_by: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.check()?;

        if let Some(branch_id) = request.branch_id {
            let owned = branch::Entity::find_by_id(branch_id)
                .filter(branch::Column::RestaurantId.eq(restaurant_id))
                .one(self.db.as_ref())
                .await?;
            if owned.is_none() {
                return Err(ServiceError::NotFound("Branch not found".to_string()));
            }
        }

        let stock_lines: Vec<OrderLineInput> = request
            .items
            .iter()
            .map(OrderItemDraft::stock_line)
            .collect();
        let validation = self
            .validator
            .validate(restaurant_id, request.branch_id, &stock_lines)
            .await?;
        if !validation.is_valid {
            return Err(ServiceError::InsufficientStock(validation.insufficient));
        }

        let (subtotal, tax, total) = compute_totals(&request.items, self.tax_rate);
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await.map_err(|err| {
            error!(%err, "failed to open order transaction");
            ServiceError::DatabaseError(err)
        })?;

        let order_number = next_order_number(&txn, restaurant_id).await?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            restaurant_id: Set(restaurant_id),
            branch_id: Set(request.branch_id),
            order_number: Set(order_number),
            status: Set(OrderStatus::Created.to_string()),
            subtotal: Set(subtotal),
            tax: Set(tax),
            total: Set(total),
            customer_name: Set(request.customer_name.clone()),
            customer_phone: Set(request.customer_phone.clone()),
            created_by: Set(created_by),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let names = snapshot_menu_names(&txn, restaurant_id, &request.items).await?;
        let mut item_models = Vec::with_capacity(request.items.len());
        for (position, draft) in request.items.iter().enumerate() {
            let name = names
                .get(&draft.menu_item_id)
                .cloned()
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Menu item {} not found", draft.menu_item_id))
                })?;
            let addons = serde_json::to_value(&draft.addons)
                .map_err(|err| ServiceError::InternalError(err.to_string()))?;

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                menu_item_id: Set(Some(draft.menu_item_id)),
                name: Set(name),
                quantity: Set(draft.quantity),
                unit_price: Set(draft.unit_price),
                total_price: Set(draft.line_total()),
                addons: Set(addons),
                position: Set(position as i32),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            item_models.push(item);
        }

        // Guarded decrements. A miss means stock moved since the pre-pass;
        // the whole transaction rolls back and the caller sees the same
        // itemized 409 as a validation failure.
        let mut deductions: Vec<(Uuid, Decimal)> = validation
            .requirements
            .iter()
            .map(|(id, qty)| (*id, *qty))
            .collect();
        deductions.sort_by_key(|(item_id, _)| *item_id);

        for (item_id, required) in deductions {
            let result = inventory_item::Entity::update_many()
                .col_expr(
                    inventory_item::Column::Quantity,
                    Expr::col(inventory_item::Column::Quantity).sub(required),
                )
                .filter(inventory_item::Column::Id.eq(item_id))
                .filter(inventory_item::Column::RestaurantId.eq(restaurant_id))
                .filter(inventory_item::Column::Quantity.gte(required))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                let current = inventory_item::Entity::find_by_id(item_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::DataIntegrity(format!(
                            "inventory item {item_id} vanished during deduction"
                        ))
                    })?;
                warn!(
                    %restaurant_id,
                    item = %current.name,
                    %required,
                    available = %current.quantity,
                    "stock changed between validation and deduction"
                );
                txn.rollback().await?;
                return Err(ServiceError::InsufficientStock(vec![InsufficientItem {
                    name: current.name,
                    required,
                    available: current.quantity,
                }]));
            }
        }

        txn.commit().await.map_err(|err| {
            error!(%err, %order_id, "failed to commit order transaction");
            ServiceError::DatabaseError(err)
        })?;

        info!(%order_id, order_number, %restaurant_id, "order placed");

        if let Some(events) = &self.events {
            let names: Vec<String> = item_models.iter().map(|item| item.name.clone()).collect();
            events
                .publish(Event::OrderCreated {
                    restaurant_id,
                    order_id,
                    order_number,
                    status: OrderStatus::Created.to_string(),
                    total,
                    branch_id: request.branch_id,
                    items_summary: summarize_items(&names),
                    created_at: now,
                })
                .await;
        }

        Ok(build_response(order_model, item_models))
    }

    #[instrument(skip(self), fields(%restaurant_id, %order_id))]
    pub async fn get_order(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.find_owned(restaurant_id, order_id).await?;
        let items = self.items_of(order_id).await?;
        Ok(build_response(order, items))
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_orders(
        &self,
        restaurant_id: Uuid,
        status: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find()
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(order::Column::CreatedAt)
            // Orders placed in the same instant still list newest first.
            .order_by_desc(order::Column::OrderNumber);

        if let Some(raw) = status {
            let parsed = OrderStatus::parse(&raw)?;
            query = query.filter(order::Column::Status.eq(parsed.to_string()));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        if !order_ids.is_empty() {
            for item in order_item::Entity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .order_by_asc(order_item::Column::Position)
                .all(self.db.as_ref())
                .await?
            {
                items_by_order.entry(item.order_id).or_default().push(item);
            }
        }

        let orders = orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                build_response(order, items)
            })
            .collect();

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Orders still moving through the kitchen or awaiting completion.
    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn active_order_count(&self, restaurant_id: Uuid) -> Result<u64, ServiceError> {
        let count = order::Entity::find()
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .filter(order::Column::Status.is_in(OrderStatus::active_statuses()))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    /// Move an order along the status machine. No inventory side effects;
    /// deduction happens only at creation.
    #[instrument(skip(self, request), fields(%restaurant_id, %order_id, status = %request.status))]
    pub async fn update_order_status(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let next = OrderStatus::parse(&request.status)?;

        let order = self.find_owned(restaurant_id, order_id).await?;
        let current = OrderStatus::from_stored(&order.status)?;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot move order from `{current}` to `{next}`"
            )));
        }

        let order_number = order.order_number;
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(next.to_string());
        active.version = Set(version + 1);
        let updated = active.update(self.db.as_ref()).await?;

        info!(%order_id, from = %current, to = %next, "order status updated");
        self.emit_status_update(restaurant_id, order_id, order_number, current, next)
            .await;

        let items = self.items_of(order_id).await?;
        Ok(build_response(updated, items))
    }

    /// Cancel a `created` order.
    pub async fn cancel_order(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        self.update_order_status(
            restaurant_id,
            order_id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Cancelled.to_string(),
            },
        )
        .await
    }

    /// Take payment for a `created` order: marks it `paid` and records the
    /// financial transaction in the same database transaction.
    #[instrument(skip(self, request), fields(%restaurant_id, %order_id))]
    pub async fn pay_order(
        &self,
        restaurant_id: Uuid,
        recorded_by: Uuid,
        order_id: Uuid,
        request: PayOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.find_owned(restaurant_id, order_id).await?;
        let current = OrderStatus::from_stored(&order.status)?;
        if !current.can_transition_to(OrderStatus::Paid) {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot take payment for an order in `{current}`"
            )));
        }

        let order_number = order.order_number;
        let total = order.total;
        let tax = order.tax;
        let version = order.version;

        let txn = self.db.begin().await?;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Paid.to_string());
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            order_id: Set(Some(order_id)),
            total: Set(total),
            tax: Set(tax),
            payment_method: Set(request.payment_method.to_string()),
            recorded_by: Set(recorded_by),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(%order_id, method = %request.payment_method, "order paid");
        self.emit_status_update(
            restaurant_id,
            order_id,
            order_number,
            current,
            OrderStatus::Paid,
        )
        .await;

        let items = self.items_of(order_id).await?;
        Ok(build_response(updated, items))
    }

    async fn find_owned(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    async fn items_of(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Position)
            .all(self.db.as_ref())
            .await?)
    }

    async fn emit_status_update(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
        order_number: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) {
        if let Some(events) = &self.events {
            events
                .publish(Event::OrderStatusUpdated {
                    restaurant_id,
                    order_id,
                    order_number,
                    old_status: from.to_string(),
                    new_status: to.to_string(),
                })
                .await;
        }
    }
}

async fn next_order_number(
    txn: &sea_orm::DatabaseTransaction,
    restaurant_id: Uuid,
) -> Result<i64, ServiceError> {
    let max: Option<Option<i64>> = order::Entity::find()
        .filter(order::Column::RestaurantId.eq(restaurant_id))
        .select_only()
        .column_as(order::Column::OrderNumber.max(), "max_order_number")
        .into_tuple()
        .one(txn)
        .await?;
    Ok(max.flatten().unwrap_or(0) + 1)
}

async fn snapshot_menu_names(
    txn: &sea_orm::DatabaseTransaction,
    restaurant_id: Uuid,
    items: &[OrderItemDraft],
) -> Result<HashMap<Uuid, String>, ServiceError> {
    let ids: Vec<Uuid> = items.iter().map(|item| item.menu_item_id).collect();
    Ok(menu_item::Entity::find()
        .filter(menu_item::Column::RestaurantId.eq(restaurant_id))
        .filter(menu_item::Column::Id.is_in(ids))
        .all(txn)
        .await?
        .into_iter()
        .map(|item| (item.id, item.name))
        .collect())
}

fn build_response(order: order::Model, items: Vec<order_item::Model>) -> OrderResponse {
    let status = OrderStatus::from_stored(&order.status).unwrap_or(OrderStatus::Created);
    OrderResponse {
        id: order.id,
        order_number: order.order_number,
        branch_id: order.branch_id,
        status,
        subtotal: order.subtotal,
        tax: order.tax,
        total: order.total,
        customer_name: order.customer_name,
        customer_phone: order.customer_phone,
        created_by: order.created_by,
        version: order.version,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                menu_item_id: item.menu_item_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
                addons: item.addons,
                position: item.position,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(OrderStatus::Created, OrderStatus::Processing, true; "created to processing")]
    #[test_case(OrderStatus::Created, OrderStatus::Cancelled, true; "created to cancelled")]
    #[test_case(OrderStatus::Created, OrderStatus::Paid, true; "created to paid")]
    #[test_case(OrderStatus::Processing, OrderStatus::Ready, true; "processing to ready")]
    #[test_case(OrderStatus::Ready, OrderStatus::Completed, true; "ready to completed")]
    #[test_case(OrderStatus::Paid, OrderStatus::Completed, true; "paid to completed")]
    #[test_case(OrderStatus::Created, OrderStatus::Completed, false; "no shortcut to completed")]
    #[test_case(OrderStatus::Processing, OrderStatus::Cancelled, false; "no cancel after kitchen starts")]
    #[test_case(OrderStatus::Completed, OrderStatus::Processing, false; "completed is terminal")]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Paid, false; "cancelled is terminal")]
    #[test_case(OrderStatus::Paid, OrderStatus::Cancelled, false; "paid cannot cancel")]
    fn transition_matrix(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_are_excluded_from_active() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        for status in OrderStatus::active_statuses() {
            assert!(!OrderStatus::parse(status).unwrap().is_terminal());
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Processing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Paid,
        ] {
            assert_eq!(OrderStatus::parse(&status.to_string()).unwrap(), status);
        }
        assert!(OrderStatus::parse("shipped").is_err());
    }

    fn draft(quantity: i32, unit_price: Decimal, addon_price: Option<Decimal>) -> OrderItemDraft {
        OrderItemDraft {
            menu_item_id: Uuid::new_v4(),
            quantity,
            unit_price,
            addons: addon_price
                .map(|price| {
                    vec![AddonInput {
                        name: "extra cheese".to_string(),
                        price,
                        ingredients: vec![],
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn totals_extract_vat_from_gross() {
        let items = vec![draft(2, dec!(10.00), Some(dec!(2.00)))];
        let (subtotal, tax, total) = compute_totals(&items, dec!(0.15));

        // 2 * (10 + 2) = 24 gross; VAT portion = 24 * 0.15/1.15.
        assert_eq!(total, dec!(24.00));
        assert_eq!(tax, dec!(3.13));
        assert_eq!(subtotal, dec!(20.87));
        assert_eq!(subtotal + tax, total);
    }

    #[test]
    fn totals_with_zero_rate_have_no_tax() {
        let items = vec![draft(3, dec!(7.50), None)];
        let (subtotal, tax, total) = compute_totals(&items, Decimal::ZERO);
        assert_eq!(total, dec!(22.50));
        assert_eq!(tax, Decimal::ZERO);
        assert_eq!(subtotal, total);
    }

    #[test]
    fn negative_unit_price_is_rejected() {
        let request = CreateOrderRequest {
            branch_id: None,
            items: vec![draft(1, dec!(-1.00), None)],
            customer_name: None,
            customer_phone: None,
        };
        assert!(matches!(
            request.check(),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn item_summary_truncates_after_three() {
        let names: Vec<String> = ["Burger", "Fries", "Cola"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(summarize_items(&names), "Burger, Fries, Cola");

        let names: Vec<String> = ["Burger", "Fries", "Cola", "Shake"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(summarize_items(&names), "Burger, Fries, Cola…");
    }
}
