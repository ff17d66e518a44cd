//! In-process notification hub. Subscriptions are keyed by tenant, so a
//! subscriber only ever sees its own restaurant's events.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, warn};
use uuid::Uuid;

struct Subscription {
    user_id: Uuid,
    sender: mpsc::Sender<String>,
}

/// Fan-out point between the event loop and connected dashboards.
///
/// Buffers are bounded: when a subscriber falls behind, newer events are
/// dropped for that subscriber instead of blocking the loop. Closed
/// subscriptions are pruned on the next publish to their tenant.
pub struct NotificationHub {
    buffer: usize,
    subscribers: DashMap<Uuid, Vec<Subscription>>,
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber for one tenant. The subscription ends when the
    /// returned receiver is dropped.
    pub fn subscribe(&self, restaurant_id: Uuid, user_id: Uuid) -> mpsc::Receiver<String> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers
            .entry(restaurant_id)
            .or_default()
            .push(Subscription { user_id, sender });
        receiver
    }

    /// Push an event to every subscriber of the tenant. Returns how many
    /// subscribers it was delivered to.
    pub fn publish(&self, restaurant_id: Uuid, event: &super::Event) -> usize {
        self.fan_out(restaurant_id, event, None)
    }

    /// Push an event to a subset of the tenant's subscribers, identified by
    /// user id. Used for chat, where only channel members may see a message.
    pub fn publish_to_users(
        &self,
        restaurant_id: Uuid,
        recipients: &[Uuid],
        event: &super::Event,
    ) -> usize {
        self.fan_out(restaurant_id, event, Some(recipients))
    }

    pub fn subscriber_count(&self, restaurant_id: Uuid) -> usize {
        self.subscribers
            .get(&restaurant_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    fn fan_out(
        &self,
        restaurant_id: Uuid,
        event: &super::Event,
        recipients: Option<&[Uuid]>,
    ) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(kind = event.kind(), %err, "failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        let emptied = {
            let Some(mut subs) = self.subscribers.get_mut(&restaurant_id) else {
                return 0;
            };
            subs.retain(|sub| !sub.sender.is_closed());

            for sub in subs.iter() {
                if let Some(allowed) = recipients {
                    if !allowed.contains(&sub.user_id) {
                        continue;
                    }
                }
                match sub.sender.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            %restaurant_id,
                            user_id = %sub.user_id,
                            kind = event.kind(),
                            "subscriber buffer full; dropping event"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
            subs.is_empty()
        };

        if emptied {
            self.subscribers
                .remove_if(&restaurant_id, |_, subs| subs.is_empty());
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::super::Event;
    use super::*;

    fn settings_event(restaurant_id: Uuid) -> Event {
        Event::SettingsUpdated {
            restaurant_id,
            updated_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn delivers_serialized_events_to_tenant_subscribers() {
        let hub = NotificationHub::new(8);
        let restaurant_id = Uuid::new_v4();
        let mut rx = hub.subscribe(restaurant_id, Uuid::new_v4());

        let delivered = hub.publish(restaurant_id, &settings_event(restaurant_id));
        assert_eq!(delivered, 1);

        let payload = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["type"], "settings:updated");
    }

    #[tokio::test]
    async fn never_crosses_tenants() {
        let hub = NotificationHub::new(8);
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let mut rx_b = hub.subscribe(tenant_b, Uuid::new_v4());

        let delivered = hub.publish(tenant_a, &settings_event(tenant_a));
        assert_eq!(delivered, 0);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_loses_events_but_stays_subscribed() {
        let hub = NotificationHub::new(1);
        let restaurant_id = Uuid::new_v4();
        let mut rx = hub.subscribe(restaurant_id, Uuid::new_v4());

        assert_eq!(hub.publish(restaurant_id, &settings_event(restaurant_id)), 1);
        // Buffer is full; this one is dropped for the subscriber.
        assert_eq!(hub.publish(restaurant_id, &settings_event(restaurant_id)), 0);

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());

        // Draining frees the buffer; delivery resumes.
        assert_eq!(hub.publish(restaurant_id, &settings_event(restaurant_id)), 1);
        assert_eq!(hub.subscriber_count(restaurant_id), 1);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let hub = NotificationHub::new(8);
        let restaurant_id = Uuid::new_v4();
        let rx = hub.subscribe(restaurant_id, Uuid::new_v4());
        drop(rx);

        assert_eq!(hub.publish(restaurant_id, &settings_event(restaurant_id)), 0);
        assert_eq!(hub.subscriber_count(restaurant_id), 0);
    }

    #[tokio::test]
    async fn recipient_filter_reaches_members_only() {
        let hub = NotificationHub::new(8);
        let restaurant_id = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let mut member_rx = hub.subscribe(restaurant_id, member);
        let mut outsider_rx = hub.subscribe(restaurant_id, outsider);

        let event = Event::ChatMessage {
            restaurant_id,
            channel_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            sender_id: member,
            sender_name: "Sami".to_string(),
            body: "hello".to_string(),
            sent_at: chrono::Utc::now(),
            recipients: vec![member],
        };

        let delivered = hub.publish_to_users(restaurant_id, &[member], &event);
        assert_eq!(delivered, 1);
        assert!(member_rx.recv().await.is_some());
        assert!(outsider_rx.try_recv().is_err());
    }
}
