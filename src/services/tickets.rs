//! Support tickets. Tenants raise and follow their own tickets; IT staff
//! work the queue across all tenants. Status only ever moves forward
//! through open, in_progress, resolved, closed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AccountType, CurrentUser};
use crate::db::DbPool;
use crate::entities::{restaurant, support_ticket, ticket_message, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        raw.parse()
            .map_err(|_| ServiceError::InvalidStatus(format!("Unknown ticket status `{raw}`")))
    }

    pub fn from_stored(raw: &str) -> Result<Self, ServiceError> {
        raw.parse().map_err(|_| {
            ServiceError::DataIntegrity(format!("stored ticket status `{raw}` is not recognized"))
        })
    }

    fn rank(self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::Resolved => 2,
            TicketStatus::Closed => 3,
        }
    }

    /// Forward-only: skipping a stage is allowed, reopening is not.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, max = 4000, message = "Body is required"))]
    pub body: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateTicketRequest {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TicketMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message body is required"))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    /// Present on cross-tenant listings only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketMessageResponse {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl From<ticket_message::Model> for TicketMessageResponse {
    fn from(model: ticket_message::Model) -> Self {
        Self {
            id: model.id,
            ticket_id: model.ticket_id,
            sender_id: model.sender_id,
            body: model.body,
            sent_at: model.created_at,
        }
    }
}

#[derive(Clone)]
pub struct TicketService {
    db: Arc<DbPool>,
    events: Option<EventSender>,
}

impl TicketService {
    pub fn new(db: Arc<DbPool>, events: Option<EventSender>) -> Self {
        Self { db, events }
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %created_by, subject = %request.subject))]
    pub async fn create_ticket(
        &self,
        restaurant_id: Uuid,
        created_by: Uuid,
        request: CreateTicketRequest,
    ) -> Result<TicketResponse, ServiceError> {
        request.validate()?;

        let ticket = support_ticket::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            subject: Set(request.subject),
            body: Set(request.body),
            status: Set(TicketStatus::Open.to_string()),
            priority: Set(request.priority.to_string()),
            created_by: Set(created_by),
            assigned_to: Set(None),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        if let Some(events) = &self.events {
            events
                .publish(Event::TicketCreated {
                    restaurant_id,
                    ticket_id: ticket.id,
                    subject: ticket.subject.clone(),
                    status: ticket.status.clone(),
                })
                .await;
        }

        info!(ticket_id = %ticket.id, "support ticket created");
        build_response(ticket, None)
    }

    #[instrument(skip(self), fields(%restaurant_id))]
    pub async fn list_tickets(
        &self,
        restaurant_id: Uuid,
        status: Option<TicketStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<TicketListResponse, ServiceError> {
        let mut query = support_ticket::Entity::find()
            .filter(support_ticket::Column::RestaurantId.eq(restaurant_id))
            .order_by_desc(support_ticket::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(support_ticket::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let tickets = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(|ticket| build_response(ticket, None))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TicketListResponse {
            tickets,
            total,
            page,
            per_page,
        })
    }

    /// Cross-tenant ticket queue for IT staff, newest first, with the
    /// tenant name resolved for display.
    #[instrument(skip(self))]
    pub async fn list_all_tickets(
        &self,
        restaurant_id: Option<Uuid>,
        status: Option<TicketStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<TicketListResponse, ServiceError> {
        let mut query = support_ticket::Entity::find()
            .order_by_desc(support_ticket::Column::CreatedAt);
        if let Some(restaurant_id) = restaurant_id {
            query = query.filter(support_ticket::Column::RestaurantId.eq(restaurant_id));
        }
        if let Some(status) = status {
            query = query.filter(support_ticket::Column::Status.eq(status.to_string()));
        }

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let tickets = paginator.fetch_page(page.saturating_sub(1)).await?;

        let tenant_ids: Vec<Uuid> = tickets.iter().map(|t| t.restaurant_id).collect();
        let tenants = restaurant::Entity::find()
            .filter(restaurant::Column::Id.is_in(tenant_ids))
            .all(self.db.as_ref())
            .await?;

        let tickets = tickets
            .into_iter()
            .map(|ticket| {
                let name = tenants
                    .iter()
                    .find(|t| t.id == ticket.restaurant_id)
                    .map(|t| t.name.clone());
                build_response(ticket, name)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TicketListResponse {
            tickets,
            total,
            page,
            per_page,
        })
    }

    /// Work a ticket: advance the status, adjust priority, assign an IT
    /// operator. Assignment is restricted to IT accounts.
    #[instrument(skip(self, request), fields(%ticket_id))]
    pub async fn update_ticket(
        &self,
        ticket_id: Uuid,
        request: UpdateTicketRequest,
    ) -> Result<TicketResponse, ServiceError> {
        let ticket = support_ticket::Entity::find_by_id(ticket_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Ticket not found".to_string()))?;
        let current = TicketStatus::from_stored(&ticket.status)?;

        if let Some(next) = request.status {
            if !current.can_transition_to(next) {
                return Err(ServiceError::InvalidOperation(format!(
                    "Cannot move ticket from `{current}` to `{next}`"
                )));
            }
        }
        if let Some(assignee) = request.assigned_to {
            let operator = user::Entity::find_by_id(assignee)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| ServiceError::NotFound("Assignee not found".to_string()))?;
            if operator.restaurant_id.is_some() || !operator.is_active {
                return Err(ServiceError::ValidationError(
                    "Tickets can only be assigned to active IT staff".to_string(),
                ));
            }
        }

        let restaurant_id = ticket.restaurant_id;
        let mut active: support_ticket::ActiveModel = ticket.into();
        if let Some(next) = request.status {
            active.status = Set(next.to_string());
        }
        if let Some(priority) = request.priority {
            active.priority = Set(priority.to_string());
        }
        if let Some(assignee) = request.assigned_to {
            active.assigned_to = Set(Some(assignee));
        }
        let updated = active.update(self.db.as_ref()).await?;

        if let Some(events) = &self.events {
            events
                .publish(Event::TicketUpdated {
                    restaurant_id,
                    ticket_id: updated.id,
                    status: updated.status.clone(),
                })
                .await;
        }

        build_response(updated, None)
    }

    #[instrument(skip(self, current, request), fields(%ticket_id, sender_id = %current.user_id))]
    pub async fn add_message(
        &self,
        ticket_id: Uuid,
        current: &CurrentUser,
        request: TicketMessageRequest,
    ) -> Result<TicketMessageResponse, ServiceError> {
        request.validate()?;
        let ticket = self.find_for(current, ticket_id).await?;

        let message = ticket_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket.id),
            sender_id: Set(current.user_id),
            body: Set(request.body),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        if let Some(events) = &self.events {
            events
                .publish(Event::TicketMessage {
                    restaurant_id: ticket.restaurant_id,
                    ticket_id: ticket.id,
                    message_id: message.id,
                    sender_id: message.sender_id,
                    body: message.body.clone(),
                    sent_at: message.created_at,
                })
                .await;
        }

        Ok(message.into())
    }

    #[instrument(skip(self, current), fields(%ticket_id))]
    pub async fn list_messages(
        &self,
        ticket_id: Uuid,
        current: &CurrentUser,
    ) -> Result<Vec<TicketMessageResponse>, ServiceError> {
        let ticket = self.find_for(current, ticket_id).await?;
        let messages = ticket_message::Entity::find()
            .filter(ticket_message::Column::TicketId.eq(ticket.id))
            .order_by_asc(ticket_message::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(messages.into_iter().map(TicketMessageResponse::from).collect())
    }

    /// IT accounts reach any ticket; client accounts only their tenant's.
    async fn find_for(
        &self,
        current: &CurrentUser,
        ticket_id: Uuid,
    ) -> Result<support_ticket::Model, ServiceError> {
        let mut query = support_ticket::Entity::find_by_id(ticket_id);
        if current.account_type == AccountType::Client {
            query = query.filter(support_ticket::Column::RestaurantId.eq(current.tenant_id()?));
        }
        query
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Ticket not found".to_string()))
    }
}

fn build_response(
    ticket: support_ticket::Model,
    restaurant_name: Option<String>,
) -> Result<TicketResponse, ServiceError> {
    Ok(TicketResponse {
        id: ticket.id,
        restaurant_id: ticket.restaurant_id,
        restaurant_name,
        subject: ticket.subject,
        body: ticket.body,
        status: TicketStatus::from_stored(&ticket.status)?,
        priority: ticket.priority.parse().unwrap_or_default(),
        created_by: ticket.created_by,
        assigned_to: ticket.assigned_to,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
    })
}
