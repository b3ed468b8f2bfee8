use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

/// Represents a notification
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Types of notifications
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum NotificationType {
    OrderStatus,
    OrderCancelled,
    CourierAssigned,
    SystemMessage,
}

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Notification not found: {0}")]
    NotFound(Uuid),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for notification service operations
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError>;
    async fn get_notification(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, NotificationError>;
    async fn mark_as_read(&self, notification_id: Uuid) -> Result<(), NotificationError>;
}

/// Redis-based notification service implementation
#[derive(Clone)]
pub struct RedisNotificationService {
    redis: Arc<Client>,
}

impl RedisNotificationService {
    pub fn new(redis: Arc<Client>) -> Self {
        Self { redis }
    }

    pub fn from_url(redis_url: &str) -> Result<Self, NotificationError> {
        let redis = Client::open(redis_url).map_err(NotificationError::Redis)?;
        Ok(Self {
            redis: Arc::new(redis),
        })
    }

    fn user_key(user_id: Uuid) -> String {
        format!("notifications:user:{}", user_id)
    }

    fn notification_key(id: Uuid) -> String {
        format!("notification:{}", id)
    }
}

#[async_trait]
impl NotificationService for RedisNotificationService {
    #[instrument(skip(self, notification), fields(id = %notification.id, user_id = %notification.user_id))]
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json = serde_json::to_string(&notification)?;

        let notification_key = Self::notification_key(notification.id);

        // Keyed copy for point lookups plus a per-user sorted set, scored by
        // timestamp so reads come back newest first.
        redis::pipe()
            .atomic()
            .set(&notification_key, &json)
            .zadd(
                Self::user_key(notification.user_id),
                &json,
                notification.created_at.timestamp(),
            )
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!(
            notification_type = ?notification.notification_type,
            "Notification sent"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let user_key = Self::user_key(user_id);

        let notifications_json: Vec<String> =
            conn.zrevrange(user_key, 0, limit as isize - 1).await?;

        let notifications: Vec<Notification> = notifications_json
            .into_iter()
            .map(|json| serde_json::from_str(&json))
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = notifications.len(), "Retrieved user notifications");
        Ok(notifications)
    }

    #[instrument(skip(self))]
    async fn get_notification(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<Notification>, NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let json: Option<String> = conn.get(Self::notification_key(notification_id)).await?;
        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    #[instrument(skip(self))]
    async fn mark_as_read(&self, notification_id: Uuid) -> Result<(), NotificationError> {
        let mut conn = self.redis.get_async_connection().await?;
        let notification_key = Self::notification_key(notification_id);

        let json: Option<String> = conn.get(&notification_key).await?;
        let stored: Option<Notification> = json.map(|j| serde_json::from_str(&j)).transpose()?;
        let mut notification = stored.ok_or(NotificationError::NotFound(notification_id))?;

        if !notification.read {
            // The user list stores the serialized payload itself, so the old
            // member has to go before the updated one is re-added.
            let old_json = serde_json::to_string(&notification)?;
            notification.read = true;
            let updated_json = serde_json::to_string(&notification)?;

            let user_key = Self::user_key(notification.user_id);
            redis::pipe()
                .atomic()
                .set(&notification_key, &updated_json)
                .zrem(&user_key, &old_json)
                .zadd(
                    &user_key,
                    &updated_json,
                    notification.created_at.timestamp(),
                )
                .query_async::<_, ()>(&mut conn)
                .await?;

            info!("Notification marked as read");
        }

        Ok(())
    }
}

/// Notification creation helpers
pub struct NotificationBuilder;

impl NotificationBuilder {
    pub fn order_status(user_id: Uuid, order_id: Uuid, status: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            message: format!("Order {} status updated to: {}", order_id, status),
            notification_type: NotificationType::OrderStatus,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn order_cancelled(user_id: Uuid, order_id: Uuid, cancelled_by: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            message: format!("Order {} was cancelled by {}", order_id, cancelled_by),
            notification_type: NotificationType::OrderCancelled,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn courier_assigned(user_id: Uuid, order_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            message: format!("A courier has been assigned to order {}", order_id),
            notification_type: NotificationType::CourierAssigned,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_messages_name_the_order() {
        let user_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();

        let n = NotificationBuilder::order_status(user_id, order_id, "EN_ROUTE");
        assert!(n.message.contains(&order_id.to_string()));
        assert!(n.message.contains("EN_ROUTE"));
        assert!(!n.read);

        let n = NotificationBuilder::order_cancelled(user_id, order_id, "customer");
        assert!(n.message.contains("cancelled by customer"));
    }

    #[test]
    fn notification_type_uses_wire_field_name() {
        let n = NotificationBuilder::courier_assigned(Uuid::new_v4(), Uuid::new_v4());
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("\"type\":\"CourierAssigned\""));
    }
}
