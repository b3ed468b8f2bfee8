use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::{ActorRole, OrderStatus};
use crate::notifications::{NotificationBuilder, NotificationService};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        customer_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled {
        order_id: Uuid,
        customer_id: Uuid,
        cancelled_by: ActorRole,
    },
    CourierAssigned {
        order_id: Uuid,
        customer_id: Uuid,
        courier_id: Uuid,
    },
}

// Drains the event channel and fans events out to customer notifications.
// Notification failures are logged and swallowed; order processing never
// depends on delivery.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    notifications: Option<Arc<dyn NotificationService>>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::OrderCreated {
                order_id,
                customer_id,
            } => {
                info!(%order_id, %customer_id, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                customer_id,
                old_status,
                new_status,
            } => {
                info!(%order_id, %old_status, %new_status, "Order status changed");
                if let Some(service) = &notifications {
                    let notification = NotificationBuilder::order_status(
                        customer_id,
                        order_id,
                        &new_status.to_string(),
                    );
                    if let Err(e) = service.send(notification).await {
                        error!(%order_id, error = %e, "Failed to send status notification");
                    }
                }
            }
            Event::OrderCancelled {
                order_id,
                customer_id,
                cancelled_by,
            } => {
                info!(%order_id, cancelled_by = cancelled_by.as_str(), "Order cancelled");
                if let Some(service) = &notifications {
                    let notification = NotificationBuilder::order_cancelled(
                        customer_id,
                        order_id,
                        cancelled_by.as_str(),
                    );
                    if let Err(e) = service.send(notification).await {
                        error!(%order_id, error = %e, "Failed to send cancellation notification");
                    }
                }
            }
            Event::CourierAssigned {
                order_id,
                customer_id,
                courier_id,
            } => {
                info!(%order_id, %courier_id, "Courier assigned");
                if let Some(service) = &notifications {
                    let notification =
                        NotificationBuilder::courier_assigned(customer_id, order_id);
                    if let Err(e) = service.send(notification).await {
                        error!(%order_id, error = %e, "Failed to send assignment notification");
                    }
                }
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_the_loop() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        sender
            .send(Event::OrderCreated {
                order_id,
                customer_id,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated {
                order_id: got_order,
                customer_id: got_customer,
            }) => {
                assert_eq!(got_order, order_id);
                assert_eq!(got_customer, customer_id);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sender = EventSender::new(tx);
        let result = sender
            .send(Event::OrderCreated {
                order_id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn loop_exits_when_channel_closes() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        // Must return rather than hang once every sender is dropped.
        process_events(rx, None).await;
    }
}
