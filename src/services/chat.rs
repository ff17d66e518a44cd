//! Team chat. Channels belong to a tenant and delivery is member-only:
//! posting and reading require membership, and the realtime event carries
//! the member ids so the hub fans out to exactly those sockets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::db::DbPool;
use crate::entities::{chat_channel, chat_member, chat_message, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

pub const DEFAULT_CHANNEL_NAME: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, max = 80, message = "Channel name is required"))]
    pub name: String,
    /// Additional members; the creator always joins.
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message body is required"))]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelResponse {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub member_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Create the tenant's default `general` channel with the admin as its
/// first member. Runs inside the setup transaction.
pub async fn seed_default_channel<C: ConnectionTrait>(
    conn: &C,
    restaurant_id: Uuid,
    admin_id: Uuid,
) -> Result<chat_channel::Model, ServiceError> {
    let channel = chat_channel::ActiveModel {
        id: Set(Uuid::new_v4()),
        restaurant_id: Set(restaurant_id),
        name: Set(DEFAULT_CHANNEL_NAME.to_string()),
        is_default: Set(true),
        created_by: Set(admin_id),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    chat_member::ActiveModel {
        channel_id: Set(channel.id),
        user_id: Set(admin_id),
        joined_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(channel)
}

#[derive(Clone)]
pub struct ChatService {
    db: Arc<DbPool>,
    events: Option<EventSender>,
}

impl ChatService {
    pub fn new(db: Arc<DbPool>, events: Option<EventSender>) -> Self {
        Self { db, events }
    }

    /// Channels visible to the caller: admins see every channel of the
    /// tenant, employees only the ones they are a member of.
    #[instrument(skip(self, current), fields(%restaurant_id, user_id = %current.user_id))]
    pub async fn list_channels(
        &self,
        restaurant_id: Uuid,
        current: &CurrentUser,
    ) -> Result<Vec<ChannelResponse>, ServiceError> {
        let channels = chat_channel::Entity::find()
            .filter(chat_channel::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(chat_channel::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        let mut visible = Vec::with_capacity(channels.len());
        for channel in channels {
            let members = chat_member::Entity::find()
                .filter(chat_member::Column::ChannelId.eq(channel.id))
                .all(self.db.as_ref())
                .await?;
            let is_member = members.iter().any(|m| m.user_id == current.user_id);
            if !current.is_admin() && !is_member {
                continue;
            }
            visible.push(ChannelResponse {
                id: channel.id,
                name: channel.name,
                is_default: channel.is_default,
                member_count: members.len() as u64,
                created_at: channel.created_at,
            });
        }
        Ok(visible)
    }

    #[instrument(skip(self, request), fields(%restaurant_id, %created_by, name = %request.name))]
    pub async fn create_channel(
        &self,
        restaurant_id: Uuid,
        created_by: Uuid,
        request: CreateChannelRequest,
    ) -> Result<ChannelResponse, ServiceError> {
        request.validate()?;
        self.check_users_owned(restaurant_id, &request.member_ids)
            .await?;

        let txn = self.db.begin().await?;
        let channel = chat_channel::ActiveModel {
            id: Set(Uuid::new_v4()),
            restaurant_id: Set(restaurant_id),
            name: Set(request.name),
            is_default: Set(false),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let mut member_ids = request.member_ids;
        if !member_ids.contains(&created_by) {
            member_ids.push(created_by);
        }
        for user_id in &member_ids {
            chat_member::ActiveModel {
                channel_id: Set(channel.id),
                user_id: Set(*user_id),
                joined_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        info!(channel_id = %channel.id, members = member_ids.len(), "chat channel created");
        Ok(ChannelResponse {
            id: channel.id,
            name: channel.name,
            is_default: channel.is_default,
            member_count: member_ids.len() as u64,
            created_at: channel.created_at,
        })
    }

    #[instrument(skip(self), fields(%restaurant_id, %channel_id, %user_id))]
    pub async fn add_member(
        &self,
        restaurant_id: Uuid,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.find_channel(restaurant_id, channel_id).await?;
        self.check_users_owned(restaurant_id, &[user_id]).await?;

        let already = chat_member::Entity::find()
            .filter(chat_member::Column::ChannelId.eq(channel_id))
            .filter(chat_member::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await?;
        if already > 0 {
            return Err(ServiceError::Conflict(
                "User is already a member of this channel".to_string(),
            ));
        }

        chat_member::ActiveModel {
            channel_id: Set(channel_id),
            user_id: Set(user_id),
            joined_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Post a message. Membership is required; the emitted event lists the
    /// channel members so only their subscriptions receive it.
    #[instrument(skip(self, current, request), fields(%restaurant_id, %channel_id, sender_id = %current.user_id))]
    pub async fn send_message(
        &self,
        restaurant_id: Uuid,
        channel_id: Uuid,
        current: &CurrentUser,
        request: SendMessageRequest,
    ) -> Result<ChatMessageResponse, ServiceError> {
        request.validate()?;
        self.find_channel(restaurant_id, channel_id).await?;
        let members = self.member_ids(channel_id).await?;
        if !members.contains(&current.user_id) {
            return Err(ServiceError::Forbidden(
                "You are not a member of this channel".to_string(),
            ));
        }

        let message = chat_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            channel_id: Set(channel_id),
            sender_id: Set(current.user_id),
            body: Set(request.body),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;

        let sender_name = current
            .display_name
            .clone()
            .unwrap_or_else(|| current.username.clone());

        if let Some(events) = &self.events {
            events
                .publish(Event::ChatMessage {
                    restaurant_id,
                    channel_id,
                    message_id: message.id,
                    sender_id: message.sender_id,
                    sender_name: sender_name.clone(),
                    body: message.body.clone(),
                    sent_at: message.created_at,
                    recipients: members,
                })
                .await;
        }

        Ok(ChatMessageResponse {
            id: message.id,
            channel_id: message.channel_id,
            sender_id: message.sender_id,
            sender_name,
            body: message.body,
            sent_at: message.created_at,
        })
    }

    #[instrument(skip(self, current), fields(%restaurant_id, %channel_id))]
    pub async fn list_messages(
        &self,
        restaurant_id: Uuid,
        channel_id: Uuid,
        current: &CurrentUser,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<ChatMessageResponse>, ServiceError> {
        self.find_channel(restaurant_id, channel_id).await?;
        let members = self.member_ids(channel_id).await?;
        if !members.contains(&current.user_id) {
            return Err(ServiceError::Forbidden(
                "You are not a member of this channel".to_string(),
            ));
        }

        let messages = chat_message::Entity::find()
            .filter(chat_message::Column::ChannelId.eq(channel_id))
            .order_by_desc(chat_message::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page)
            .fetch_page(page.saturating_sub(1))
            .await?;

        let sender_ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
        let senders = user::Entity::find()
            .filter(user::Column::Id.is_in(sender_ids))
            .all(self.db.as_ref())
            .await?;

        Ok(messages
            .into_iter()
            .map(|message| {
                let sender_name = senders
                    .iter()
                    .find(|u| u.id == message.sender_id)
                    .map(|u| u.display_name.clone().unwrap_or_else(|| u.username.clone()))
                    .unwrap_or_else(|| "Deleted user".to_string());
                ChatMessageResponse {
                    id: message.id,
                    channel_id: message.channel_id,
                    sender_id: message.sender_id,
                    sender_name,
                    body: message.body,
                    sent_at: message.created_at,
                }
            })
            .collect())
    }

    async fn find_channel(
        &self,
        restaurant_id: Uuid,
        channel_id: Uuid,
    ) -> Result<chat_channel::Model, ServiceError> {
        chat_channel::Entity::find_by_id(channel_id)
            .filter(chat_channel::Column::RestaurantId.eq(restaurant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Channel not found".to_string()))
    }

    async fn member_ids(&self, channel_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let members = chat_member::Entity::find()
            .filter(chat_member::Column::ChannelId.eq(channel_id))
            .all(self.db.as_ref())
            .await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    async fn check_users_owned(
        &self,
        restaurant_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let owned = user::Entity::find()
            .filter(user::Column::RestaurantId.eq(restaurant_id))
            .filter(user::Column::Id.is_in(user_ids.to_vec()))
            .count(self.db.as_ref())
            .await?;
        if owned != user_ids.len() as u64 {
            return Err(ServiceError::NotFound(
                "One or more users were not found".to_string(),
            ));
        }
        Ok(())
    }
}
