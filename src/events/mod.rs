//! Domain events and their fan-out to live dashboard subscribers.
//!
//! Services publish events after their database transaction commits. A
//! single processing loop drains the channel and hands each event to the
//! [`NotificationHub`], which pushes it to the tenant's connected
//! subscribers. Delivery is best-effort: a slow subscriber loses events,
//! and no delivery failure ever fails the originating request.

pub mod hub;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

pub use hub::NotificationHub;

/// Everything the system announces to connected dashboards. The wire shape
/// is `{"type": "<tag>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    #[serde(rename = "order:created")]
    OrderCreated {
        restaurant_id: Uuid,
        order_id: Uuid,
        order_number: i64,
        status: String,
        total: Decimal,
        branch_id: Option<Uuid>,
        /// First few item names, for list previews
        items_summary: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "order:statusUpdated")]
    OrderStatusUpdated {
        restaurant_id: Uuid,
        order_id: Uuid,
        order_number: i64,
        old_status: String,
        new_status: String,
    },

    /// Delivered to channel members only, never the whole tenant.
    #[serde(rename = "chat:message")]
    ChatMessage {
        restaurant_id: Uuid,
        channel_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        body: String,
        sent_at: DateTime<Utc>,
        /// Routing metadata, not part of the payload
        #[serde(skip)]
        recipients: Vec<Uuid>,
    },

    #[serde(rename = "ticket:created")]
    TicketCreated {
        restaurant_id: Uuid,
        ticket_id: Uuid,
        subject: String,
        status: String,
    },

    #[serde(rename = "ticket:updated")]
    TicketUpdated {
        restaurant_id: Uuid,
        ticket_id: Uuid,
        status: String,
    },

    #[serde(rename = "ticket:message")]
    TicketMessage {
        restaurant_id: Uuid,
        ticket_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        body: String,
        sent_at: DateTime<Utc>,
    },

    #[serde(rename = "settings:updated")]
    SettingsUpdated {
        restaurant_id: Uuid,
        updated_by: Uuid,
    },
}

impl Event {
    /// Tenant the event belongs to; fan-out never crosses this boundary.
    pub fn restaurant_id(&self) -> Uuid {
        match self {
            Event::OrderCreated { restaurant_id, .. }
            | Event::OrderStatusUpdated { restaurant_id, .. }
            | Event::ChatMessage { restaurant_id, .. }
            | Event::TicketCreated { restaurant_id, .. }
            | Event::TicketUpdated { restaurant_id, .. }
            | Event::TicketMessage { restaurant_id, .. }
            | Event::SettingsUpdated { restaurant_id, .. } => *restaurant_id,
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order:created",
            Event::OrderStatusUpdated { .. } => "order:statusUpdated",
            Event::ChatMessage { .. } => "chat:message",
            Event::TicketCreated { .. } => "ticket:created",
            Event::TicketUpdated { .. } => "ticket:updated",
            Event::TicketMessage { .. } => "ticket:message",
            Event::SettingsUpdated { .. } => "settings:updated",
        }
    }
}

/// Handle services publish through. Publishing never propagates an error:
/// by the time an event exists its transaction has committed, so the only
/// honest reaction to a dead channel is a log line.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn publish(&self, event: Event) {
        let kind = event.kind();
        if self.sender.send(event).await.is_err() {
            error!(kind, "event channel closed; event dropped");
        }
    }
}

/// Drains the event channel and fans each event out to the owning tenant's
/// subscribers. Chat messages go to channel members only.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, hub: Arc<NotificationHub>) {
    info!("event fan-out loop started");

    while let Some(event) = rx.recv().await {
        let restaurant_id = event.restaurant_id();
        let delivered = match &event {
            Event::ChatMessage { recipients, .. } => {
                hub.publish_to_users(restaurant_id, recipients, &event)
            }
            _ => hub.publish(restaurant_id, &event),
        };
        debug!(
            kind = event.kind(),
            %restaurant_id,
            delivered,
            "event fanned out"
        );
    }

    info!("event channel closed; fan-out loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_created_uses_the_expected_wire_shape() {
        let event = Event::OrderCreated {
            restaurant_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            order_number: 12,
            status: "created".to_string(),
            total: dec!(95.45),
            branch_id: None,
            items_summary: "Burger, Fries".to_string(),
            created_at: Utc::now(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order:created");
        assert_eq!(json["data"]["order_number"], 12);
        assert_eq!(json["data"]["status"], "created");
        assert_eq!(json["data"]["items_summary"], "Burger, Fries");
    }

    #[test]
    fn chat_recipients_stay_off_the_wire() {
        let event = Event::ChatMessage {
            restaurant_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            sender_name: "Sami".to_string(),
            body: "shift starts at 4".to_string(),
            sent_at: Utc::now(),
            recipients: vec![Uuid::new_v4(), Uuid::new_v4()],
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chat:message");
        assert!(json["data"].get("recipients").is_none());
        assert_eq!(json["data"]["body"], "shift starts at 4");
    }

    #[test]
    fn every_variant_reports_its_tag() {
        let restaurant_id = Uuid::new_v4();
        let event = Event::SettingsUpdated {
            restaurant_id,
            updated_by: Uuid::new_v4(),
        };
        assert_eq!(event.kind(), "settings:updated");
        assert_eq!(event.restaurant_id(), restaurant_id);
    }

    #[tokio::test]
    async fn publish_swallows_a_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out.
        sender
            .publish(Event::SettingsUpdated {
                restaurant_id: Uuid::new_v4(),
                updated_by: Uuid::new_v4(),
            })
            .await;
    }
}
