use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    entities::{ActorRole, OrderStatus, OrderType},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// The identity performing a transition, as resolved from the access token.
#[derive(Debug, Clone, Copy)]
pub struct TransitionActor {
    pub user_id: Uuid,
    pub role: ActorRole,
}

impl TransitionActor {
    pub fn new(user_id: Uuid, role: ActorRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

/// Commission amounts recorded when an order is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub platform_fee: Decimal,
    pub courier_payout: Decimal,
    pub supplier_payout: Option<Decimal>,
}

/// Which roles may drive a given edge of the status graph. Structural
/// reachability is checked separately via `OrderStatus::can_transition_to`.
pub fn edge_allows_role(from: OrderStatus, to: OrderStatus, role: ActorRole) -> bool {
    use OrderStatus::*;

    if role == ActorRole::Admin {
        return true;
    }

    match (from, to) {
        (Confirmed, Preparing) => role == ActorRole::Supplier,
        (Confirmed, EnRoute) | (Preparing, EnRoute) => role == ActorRole::Courier,
        (EnRoute, Delivered) => role == ActorRole::Courier,
        (_, Cancelled) => true,
        _ => false,
    }
}

/// Whether a user participates in an order under a given role. Admins
/// participate in everything.
pub fn is_participant(order: &OrderModel, user_id: Uuid, role: ActorRole) -> bool {
    match role {
        ActorRole::Customer => order.customer_id == user_id,
        ActorRole::Supplier => order.supplier_id == Some(user_id),
        ActorRole::Courier => order.courier_id == Some(user_id),
        ActorRole::Admin => true,
    }
}

/// Splits the order total between the platform and the fulfilling parties.
///
/// The platform fee and the courier share are rounded to cents; the supplier
/// payout absorbs the remainder so the three parts always sum to the total.
pub fn compute_split(
    order_type: OrderType,
    total: Decimal,
    platform_rate: Decimal,
    courier_share: Decimal,
) -> CommissionSplit {
    let platform_fee = (total * platform_rate).round_dp(2);
    match order_type {
        OrderType::Direct => CommissionSplit {
            platform_fee,
            courier_payout: total - platform_fee,
            supplier_payout: None,
        },
        OrderType::Supplier => {
            let courier_payout = (total * courier_share).round_dp(2);
            CommissionSplit {
                platform_fee,
                courier_payout,
                supplier_payout: Some(total - platform_fee - courier_payout),
            }
        }
    }
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    platform_rate: Decimal,
    courier_share: Decimal,
}

impl OrderStatusService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        platform_rate: Decimal,
        courier_share: Decimal,
    ) -> Self {
        Self {
            db,
            event_sender,
            platform_rate,
            courier_share,
        }
    }

    /// Moves an order along the status graph on behalf of an actor.
    ///
    /// All checks and mutations happen in one transaction; the notification
    /// event is sent only after a successful commit.
    #[instrument(skip(self, actor), fields(order_id = %order_id, new_status = %new_status, actor_role = actor.role.as_str()))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: TransitionActor,
        reason: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;

        if !old_status.can_transition_to(&new_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot transition from {} to {}",
                old_status, new_status
            )));
        }

        // Only merchant-fulfilled orders pass through PREPARING; this holds
        // for admins too.
        if new_status == OrderStatus::Preparing && order.order_type != OrderType::Supplier {
            return Err(ServiceError::InvalidTransition(
                "DIRECT orders do not have a preparation phase".to_string(),
            ));
        }

        if matches!(new_status, OrderStatus::EnRoute | OrderStatus::Delivered)
            && order.courier_id.is_none()
        {
            return Err(ServiceError::ValidationError(format!(
                "Order cannot be {} without an assigned courier",
                new_status
            )));
        }

        if !edge_allows_role(old_status, new_status, actor.role) {
            return Err(ServiceError::Forbidden(format!(
                "Role {} cannot move an order from {} to {}",
                actor.role, old_status, new_status
            )));
        }

        self.check_participant(&order, &actor)?;

        let now = Utc::now();
        let customer_id = order.customer_id;
        let order_type = order.order_type;
        let total_amount = order.total_amount;

        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(now));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);

        match new_status {
            OrderStatus::Preparing => {
                active.prepared_at = Set(Some(now));
            }
            OrderStatus::EnRoute => {
                active.en_route_at = Set(Some(now));
            }
            OrderStatus::Delivered => {
                active.delivered_at = Set(Some(now));
                let split = compute_split(
                    order_type,
                    total_amount,
                    self.platform_rate,
                    self.courier_share,
                );
                active.platform_fee = Set(Some(split.platform_fee));
                active.courier_payout = Set(Some(split.courier_payout));
                active.supplier_payout = Set(split.supplier_payout);
            }
            OrderStatus::Cancelled => {
                active.cancelled_at = Set(Some(now));
                active.cancelled_by = Set(Some(actor.role));
                active.cancel_reason = Set(reason);
            }
            OrderStatus::Confirmed => {}
        }

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = match new_status {
                OrderStatus::Cancelled => Event::OrderCancelled {
                    order_id,
                    customer_id,
                    cancelled_by: actor.role,
                },
                _ => Event::OrderStatusChanged {
                    order_id,
                    customer_id,
                    old_status,
                    new_status,
                },
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send status changed event");
            }
        }

        Ok(updated)
    }

    /// Non-admin actors may only touch orders they participate in.
    fn check_participant(
        &self,
        order: &OrderModel,
        actor: &TransitionActor,
    ) -> Result<(), ServiceError> {
        if is_participant(order, actor.user_id, actor.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Actor is not a participant of this order".to_string(),
            ))
        }
    }
}
